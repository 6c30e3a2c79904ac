//! 测试用的脚本化检测器/识别器/帧源

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use image::{Rgb, RgbImage};

use crate::config::{CameraConfig, EngineSettings};
use crate::detection::{Embedding, FaceDetector, MotionProvider, MotionResult, Prediction, Recognizer, Rect};
use crate::input::FrameSource;
use crate::lock;
use crate::pipeline::{Camera, FrameContext, ProcessingMode, Providers};

/// 按脚本返回运动结果: `None` 无运动, `Some(regions)` 有运动; 脚本用完后无运动
pub struct ScriptedMotion {
    script: VecDeque<Option<Vec<Rect>>>,
}

impl ScriptedMotion {
    pub fn new(script: Vec<Option<Vec<Rect>>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl MotionProvider for ScriptedMotion {
    fn detect_motion(&mut self, _frame: &RgbImage, with_regions: bool) -> Result<MotionResult> {
        Ok(match self.script.pop_front().flatten() {
            Some(regions) => MotionResult {
                motion: true,
                regions: if with_regions { regions } else { Vec::new() },
            },
            None => MotionResult::still(),
        })
    }
}

/// 每次调用都返回同一组人脸框
#[derive(Default)]
pub struct ScriptedFaces {
    faces: Mutex<Vec<Rect>>,
    calls: AtomicUsize,
}

impl ScriptedFaces {
    pub fn set(&self, faces: Vec<Rect>) {
        *lock(&self.faces) = faces;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaceDetector for ScriptedFaces {
    fn detect_faces(&self, _frame: &RgbImage, _precise: bool) -> Result<Vec<Rect>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.faces).clone())
    }
}

/// 按顺序返回预设的识别结果,用完后报错
#[derive(Default)]
pub struct ScriptedRecognizer {
    predictions: Mutex<VecDeque<Prediction>>,
    calls: AtomicUsize,
    last_frame: Mutex<Option<(u32, u32)>>,
}

impl ScriptedRecognizer {
    pub fn push(&self, name: &str, confidence: f32, embedding: Vec<f32>) {
        lock(&self.predictions).push_back(Prediction {
            identity: name.to_string(),
            confidence,
            embedding: Embedding::from_vec(embedding),
            aligned_face: RgbImage::new(2, 2),
        });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_frame_size(&self) -> Option<(u32, u32)> {
        *lock(&self.last_frame)
    }
}

impl Recognizer for ScriptedRecognizer {
    fn predict(&self, frame: &RgbImage, _region: &Rect) -> Result<Prediction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_frame) = Some(frame.dimensions());
        match lock(&self.predictions).pop_front() {
            Some(prediction) => Ok(prediction),
            None => bail!("no scripted prediction left"),
        }
    }
}

/// 从内存帧列表读取,读完后返回 None
pub struct VecSource {
    frames: VecDeque<RgbImage>,
}

impl VecSource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for VecSource {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

/// 每个 `seed` 生成一张内容不同的帧
pub fn distinct_frame(width: u32, height: u32, seed: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([seed, seed, seed]))
}

/// 单个摄像头的策略测试环境
pub struct Harness {
    pub camera: Camera,
    pub faces: Arc<ScriptedFaces>,
    pub recognizer: Arc<ScriptedRecognizer>,
    pub providers: Providers,
    pub settings: EngineSettings,
    frame_size: (u32, u32),
}

impl Harness {
    pub fn new() -> Self {
        let faces = Arc::new(ScriptedFaces::default());
        let recognizer = Arc::new(ScriptedRecognizer::default());
        let providers = Providers {
            faces: faces.clone(),
            recognizer: recognizer.clone(),
        };
        Self {
            camera: Camera::new(CameraConfig::new("dir://test", ProcessingMode::DetectRecognise)),
            faces,
            recognizer,
            providers,
            settings: EngineSettings::default(),
            frame_size: (16, 16),
        }
    }

    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width, height);
        self
    }

    pub fn frame(&self) -> RgbImage {
        RgbImage::new(self.frame_size.0, self.frame_size.1)
    }

    pub fn ctx(&self) -> FrameContext<'_> {
        FrameContext {
            camera: &self.camera,
            providers: &self.providers,
            settings: &self.settings,
            font: None,
        }
    }
}
