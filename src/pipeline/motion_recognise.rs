//! 模式3: 运动触发的识别
//!
//! 空闲时只做运动检测 (不调用人脸检测/识别); 检测到运动后切换为整帧识别,
//! 连续 `motion_idle_timeout` 没有人脸再回到空闲.

use std::time::Instant;

use image::RgbImage;
use tracing::info;

use super::annotate::{draw_boxes, FACE_COLOR};
use super::merge::{detect_motion, recognise_and_merge};
use super::{FrameContext, FrameProcessor, ProcessingMode};
use crate::detection::MotionProvider;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// 等待运动
    Watching,
    /// 识别中,记录最近一次看到人脸的时间
    Recognising { last_face: Instant },
}

pub struct MotionThenRecognise {
    motion: Box<dyn MotionProvider>,
    state: State,
}

impl MotionThenRecognise {
    pub fn new(motion: Box<dyn MotionProvider>) -> Self {
        Self {
            motion,
            state: State::Watching,
        }
    }

    pub fn is_recognising(&self) -> bool {
        matches!(self.state, State::Recognising { .. })
    }
}

impl FrameProcessor for MotionThenRecognise {
    fn mode(&self) -> ProcessingMode {
        ProcessingMode::MotionDetectRecognise
    }

    fn process(&mut self, mut frame: RgbImage, ctx: &FrameContext<'_>) {
        match self.state {
            State::Watching => {
                let result = detect_motion(self.motion.as_mut(), &frame, false);
                ctx.camera.set_motion(result.motion);
                if result.motion {
                    info!("🏃 检测到运动,开始识别");
                    self.state = State::Recognising {
                        last_face: Instant::now(),
                    };
                }
            }
            State::Recognising { last_face } => {
                let faces = recognise_and_merge(ctx, &frame);
                if !faces.is_empty() {
                    self.state = State::Recognising {
                        last_face: Instant::now(),
                    };
                    if ctx.settings.drawing {
                        draw_boxes(&mut frame, &faces, FACE_COLOR);
                    }
                } else if last_face.elapsed() > ctx.settings.motion_idle_timeout() {
                    info!("💤 {}秒内无人脸,回到运动检测", ctx.settings.motion_idle_timeout_secs);
                    self.state = State::Watching;
                }
            }
        }
        ctx.camera.publish_frame(frame);
    }
}
