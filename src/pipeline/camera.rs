//! 摄像头共享状态
//!
//! 处理线程写入,告警引擎和状态查询读取. 人员档案有独立的锁,只在修改/读取期间持有.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use image::{ImageFormat, RgbImage};

use super::ProcessingMode;
use crate::config::CameraConfig;
use crate::detection::{PersonRegistry, PersonSnapshot};
use crate::error::Result;
use crate::lock;

pub struct Camera {
    config: CameraConfig,
    motion: AtomicBool,
    stop: AtomicBool,
    /// f64 位模式
    processing_fps: AtomicU64,
    frame: Mutex<Option<RgbImage>>,
    people: Mutex<PersonRegistry>,
}

/// 状态查询快照
#[derive(Debug, Clone)]
pub struct CameraStatus {
    pub index: usize,
    pub url: String,
    pub mode: ProcessingMode,
    pub motion: bool,
    pub processing_fps: f64,
    pub people: Vec<PersonSnapshot>,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            motion: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            processing_fps: AtomicU64::new(0f64.to_bits()),
            frame: Mutex::new(None),
            people: Mutex::new(PersonRegistry::new()),
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn mode(&self) -> ProcessingMode {
        self.config.mode
    }

    pub fn precise_detection(&self) -> bool {
        self.config.precise_detection
    }

    // ========== 运动标志 ==========

    pub fn motion(&self) -> bool {
        self.motion.load(Ordering::Relaxed)
    }

    pub fn set_motion(&self, motion: bool) {
        self.motion.store(motion, Ordering::Relaxed);
    }

    // ========== 停止标志 ==========

    /// 协作式停止,处理线程在下一次循环开始时退出
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    // ========== 帧率 ==========

    pub fn processing_fps(&self) -> f64 {
        f64::from_bits(self.processing_fps.load(Ordering::Relaxed))
    }

    pub fn set_processing_fps(&self, fps: f64) {
        self.processing_fps.store(fps.to_bits(), Ordering::Relaxed);
    }

    // ========== 最新画面 (后写覆盖) ==========

    pub fn publish_frame(&self, frame: RgbImage) {
        *lock(&self.frame) = Some(frame);
    }

    pub fn latest_frame(&self) -> Option<RgbImage> {
        lock(&self.frame).clone()
    }

    pub fn snapshot_jpeg(&self) -> Result<Option<Vec<u8>>> {
        match self.latest_frame() {
            Some(frame) => encode_jpeg(&frame).map(Some),
            None => Ok(None),
        }
    }

    // ========== 人员档案 ==========

    /// 在档案锁内执行 `f`; 不要在闭包里调用检测/识别
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut PersonRegistry) -> R) -> R {
        let mut people = lock(&self.people);
        f(&mut people)
    }

    pub fn people(&self) -> Vec<PersonSnapshot> {
        self.with_registry(|reg| reg.snapshot())
    }

    pub fn status(&self, index: usize) -> CameraStatus {
        CameraStatus {
            index,
            url: self.config.url.clone(),
            mode: self.config.mode,
            motion: self.motion(),
            processing_fps: self.processing_fps(),
            people: self.people(),
        }
    }
}

/// 编码为JPEG (状态页/缩略图)
pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Jpeg)?;
    Ok(bytes.into_inner())
}

/// 人员最新缩略图的JPEG
pub fn thumbnail_jpeg(person: &PersonSnapshot) -> Result<Option<Vec<u8>>> {
    person.thumbnail.as_ref().map(encode_jpeg).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Embedding, Person, PersonId};

    fn camera() -> Camera {
        Camera::new(CameraConfig::new("dir://x", ProcessingMode::DetectMotion))
    }

    #[test]
    fn test_flags_and_fps() {
        let cam = camera();
        assert!(!cam.motion());
        cam.set_motion(true);
        assert!(cam.motion());
        cam.set_processing_fps(12.5);
        assert_eq!(cam.processing_fps(), 12.5);
        cam.stop();
        assert!(cam.is_stopped());
    }

    #[test]
    fn test_last_frame_wins_and_encodes() {
        let cam = camera();
        assert!(cam.snapshot_jpeg().unwrap().is_none());
        cam.publish_frame(RgbImage::new(4, 4));
        cam.publish_frame(RgbImage::new(8, 6));
        assert_eq!(cam.latest_frame().map(|f| f.dimensions()), Some((8, 6)));
        let jpeg = cam.snapshot_jpeg().unwrap().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_status_includes_people() {
        let cam = camera();
        cam.with_registry(|reg| {
            reg.upsert(
                PersonId::new("p"),
                Person::new(Embedding::default(), 77.0, RgbImage::new(1, 1), "alice"),
            )
        });
        let status = cam.status(3);
        assert_eq!(status.index, 3);
        assert_eq!(status.people.len(), 1);
        assert_eq!(status.people[0].identity, "alice");
        let jpeg = thumbnail_jpeg(&status.people[0]).unwrap();
        assert!(jpeg.is_some());
    }
}
