use image::RgbImage;
use tracing::trace;

use super::merge::detect_motion;
use super::{FrameContext, FrameProcessor, ProcessingMode};
use crate::detection::MotionProvider;

/// 模式1: 只更新运动标志,画面原样发布
pub struct MotionOnly {
    motion: Box<dyn MotionProvider>,
}

impl MotionOnly {
    pub fn new(motion: Box<dyn MotionProvider>) -> Self {
        Self { motion }
    }
}

impl FrameProcessor for MotionOnly {
    fn mode(&self) -> ProcessingMode {
        ProcessingMode::DetectMotion
    }

    fn needs_gate(&self) -> bool {
        false
    }

    fn process(&mut self, frame: RgbImage, ctx: &FrameContext<'_>) {
        let result = detect_motion(self.motion.as_mut(), &frame, false);
        trace!("运动: {}", result.motion);
        ctx.camera.set_motion(result.motion);
        ctx.camera.publish_frame(frame);
    }
}
