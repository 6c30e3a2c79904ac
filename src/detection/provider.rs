//! 外部检测/识别接口
//! Contracts for the external motion, face-detection and recognition providers
//!
//! 引擎只依赖这些 trait,具体模型由调用方注入.

use anyhow::Result;
use image::RgbImage;

use super::types::{Embedding, MotionResult, Prediction, Rect};

/// 运动检测器 (每个摄像头一个实例,内部可持有背景模型)
pub trait MotionProvider: Send {
    /// # 参数
    /// - `frame`: 当前帧
    /// - `with_regions`: 是否需要返回候选区域
    fn detect_motion(&mut self, frame: &RgbImage, with_regions: bool) -> Result<MotionResult>;
}

/// 人脸检测器 (所有摄像头共享)
pub trait FaceDetector: Send + Sync {
    /// 在整幅图中检测人脸区域
    fn detect_faces(&self, frame: &RgbImage, precise: bool) -> Result<Vec<Rect>>;

    /// 快速模式下的二次确认,用于过滤误检
    fn confirm(&self, _face: &RgbImage) -> Result<bool> {
        Ok(true)
    }
}

/// 人脸识别器 (所有摄像头共享)
pub trait Recognizer: Send + Sync {
    fn predict(&self, frame: &RgbImage, region: &Rect) -> Result<Prediction>;

    fn squared_distance(&self, a: &Embedding, b: &Embedding) -> f32 {
        a.squared_distance(b)
    }
}

/// 不检测任何人脸的占位检测器 (未接入模型时使用)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaces;

impl FaceDetector for NoFaces {
    fn detect_faces(&self, _frame: &RgbImage, _precise: bool) -> Result<Vec<Rect>> {
        Ok(Vec::new())
    }
}

impl Recognizer for NoFaces {
    fn predict(&self, _frame: &RgbImage, _region: &Rect) -> Result<Prediction> {
        anyhow::bail!("no recogniser model configured")
    }
}
