// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 帧差运动检测 (内置的简单实现,可被外部背景建模替换)

use anyhow::Result;
use image::{imageops, GrayImage, RgbImage};

use super::provider::MotionProvider;
use super::types::{MotionResult, Rect};

pub struct FrameDiffMotion {
    previous: Option<GrayImage>,
    /// 单个像素灰度差阈值
    pixel_threshold: u8,
    /// 变化像素占比达到该值才算运动
    min_changed_ratio: f32,
}

impl Default for FrameDiffMotion {
    fn default() -> Self {
        Self::new(25, 0.01)
    }
}

impl FrameDiffMotion {
    pub fn new(pixel_threshold: u8, min_changed_ratio: f32) -> Self {
        Self {
            previous: None,
            pixel_threshold,
            min_changed_ratio,
        }
    }
}

impl MotionProvider for FrameDiffMotion {
    fn detect_motion(&mut self, frame: &RgbImage, with_regions: bool) -> Result<MotionResult> {
        let gray = imageops::grayscale(frame);
        let previous = match self.previous.replace(gray) {
            Some(prev) if prev.dimensions() == frame.dimensions() => prev,
            // 第一帧或分辨率变化: 只建立背景
            _ => return Ok(MotionResult::still()),
        };
        let Some(current) = self.previous.as_ref() else {
            return Ok(MotionResult::still());
        };

        let (w, h) = current.dimensions();
        let (mut x1, mut y1, mut x2, mut y2) = (w, h, 0u32, 0u32);
        let mut changed = 0u64;
        for (x, y, px) in current.enumerate_pixels() {
            let before = previous.get_pixel(x, y)[0];
            if px[0].abs_diff(before) > self.pixel_threshold {
                changed += 1;
                x1 = x1.min(x);
                y1 = y1.min(y);
                x2 = x2.max(x + 1);
                y2 = y2.max(y + 1);
            }
        }

        let total = (w as u64 * h as u64).max(1);
        let motion = changed > 0 && changed as f32 / total as f32 >= self.min_changed_ratio;
        let regions = if motion && with_regions {
            vec![Rect::from_corners(x1, y1, x2, y2)]
        } else {
            Vec::new()
        };
        Ok(MotionResult { motion, regions })
    }
}
