/// 逐帧处理流水线 (Frame Processing Pipeline)
///
/// 每个摄像头一个处理线程:
/// - Worker:   读帧 → 过滤 → 训练闸门 → 处理策略
/// - Strategy: 五种处理模式之一,由摄像头配置决定
/// - Camera:   线程间共享的摄像头状态
pub mod annotate;
pub mod camera;
pub mod gate;
pub mod merge;
pub mod motion_only;
pub mod motion_recognise;
pub mod recognise;
pub mod track;
pub mod worker;

pub use annotate::load_font;
pub use camera::{encode_jpeg, thumbnail_jpeg, Camera, CameraStatus};
pub use gate::TrainingGate;
pub use worker::CameraWorker;

use std::fmt;
use std::sync::Arc;

use ab_glyph::FontVec;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::config::EngineSettings;
use crate::detection::{FaceDetector, MotionProvider, Recognizer};

// ========== 处理模式 ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// 只做运动检测
    #[serde(rename = "detect_motion")]
    DetectMotion,
    /// 整帧人脸检测+识别
    #[serde(rename = "detect_recognise")]
    DetectRecognise,
    /// 先等运动,再整帧识别,长时间无人脸后回到运动检测
    #[serde(rename = "motion_detect_recognise")]
    MotionDetectRecognise,
    /// 只在运动区域内识别
    #[serde(rename = "segment_detect_recognise")]
    SegmentDetectRecognise,
    /// 运动区域跟踪+识别
    #[serde(rename = "detect_recognise_track")]
    DetectRecogniseTrack,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DetectMotion => "detect_motion",
            Self::DetectRecognise => "detect_recognise",
            Self::MotionDetectRecognise => "motion_detect_recognise",
            Self::SegmentDetectRecognise => "segment_detect_recognise",
            Self::DetectRecogniseTrack => "detect_recognise_track",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== 处理策略 ==========

/// 所有摄像头共用的人脸检测/识别服务
#[derive(Clone)]
pub struct Providers {
    pub faces: Arc<dyn FaceDetector>,
    pub recognizer: Arc<dyn Recognizer>,
}

/// 策略处理一帧时可见的上下文
pub struct FrameContext<'a> {
    pub camera: &'a Camera,
    pub providers: &'a Providers,
    pub settings: &'a EngineSettings,
    pub font: Option<&'a FontVec>,
}

/// 处理策略 (每个摄像头一个实例,只在其处理线程内使用)
pub trait FrameProcessor: Send {
    fn mode(&self) -> ProcessingMode;

    /// 处理前是否需要等待训练闸门
    fn needs_gate(&self) -> bool {
        true
    }

    /// 处理一帧,结束时把 (标注后的) 画面发布到摄像头
    fn process(&mut self, frame: RgbImage, ctx: &FrameContext<'_>);
}

/// 根据模式创建处理策略
pub fn build_processor(mode: ProcessingMode, motion: Box<dyn MotionProvider>) -> Box<dyn FrameProcessor> {
    match mode {
        ProcessingMode::DetectMotion => Box::new(motion_only::MotionOnly::new(motion)),
        ProcessingMode::DetectRecognise => Box::new(recognise::FullFrame),
        ProcessingMode::MotionDetectRecognise => Box::new(motion_recognise::MotionThenRecognise::new(motion)),
        ProcessingMode::SegmentDetectRecognise => Box::new(recognise::MotionRegions::new(motion)),
        ProcessingMode::DetectRecogniseTrack => Box::new(track::TrackRecognise::new(motion)),
    }
}
