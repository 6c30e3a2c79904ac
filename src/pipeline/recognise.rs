//! 模式2/4: 整帧识别与运动区域识别

use image::RgbImage;

use super::annotate::{draw_boxes, draw_boxes_in, FACE_COLOR, MOTION_COLOR};
use super::merge::{crop, detect_motion, recognise_and_merge};
use super::{FrameContext, FrameProcessor, ProcessingMode};
use crate::detection::MotionProvider;

/// 模式2: 每帧整图检测+识别
pub struct FullFrame;

impl FrameProcessor for FullFrame {
    fn mode(&self) -> ProcessingMode {
        ProcessingMode::DetectRecognise
    }

    fn process(&mut self, mut frame: RgbImage, ctx: &FrameContext<'_>) {
        let faces = recognise_and_merge(ctx, &frame);
        if ctx.settings.drawing {
            draw_boxes(&mut frame, &faces, FACE_COLOR);
        }
        ctx.camera.publish_frame(frame);
    }
}

/// 模式4: 运动区域内检测+识别
pub struct MotionRegions {
    motion: Box<dyn MotionProvider>,
}

impl MotionRegions {
    pub fn new(motion: Box<dyn MotionProvider>) -> Self {
        Self { motion }
    }
}

impl FrameProcessor for MotionRegions {
    fn mode(&self) -> ProcessingMode {
        ProcessingMode::SegmentDetectRecognise
    }

    fn process(&mut self, mut frame: RgbImage, ctx: &FrameContext<'_>) {
        let result = detect_motion(self.motion.as_mut(), &frame, true);
        ctx.camera.set_motion(result.motion);
        if !result.motion {
            ctx.camera.publish_frame(frame);
            return;
        }

        let mut found = Vec::new();
        for region in &result.regions {
            let Some((region, patch)) = crop(&frame, region) else {
                continue;
            };
            let faces = recognise_and_merge(ctx, &patch);
            found.push((region, faces));
        }

        if ctx.settings.drawing {
            for (region, faces) in &found {
                draw_boxes(&mut frame, std::slice::from_ref(region), MOTION_COLOR);
                draw_boxes_in(&mut frame, region, faces, FACE_COLOR);
            }
        }
        ctx.camera.publish_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{PersonId, Rect};
    use crate::testing::{Harness, ScriptedMotion};

    #[test]
    fn test_full_frame_merges_by_name() {
        let h = Harness::new();
        h.faces.set(vec![Rect::new(0, 0, 4, 4)]);
        h.recognizer.push("alice", 70.0, vec![0.0, 0.0]);
        h.recognizer.push("alice", 60.0, vec![0.0, 0.0]);

        let mut p = FullFrame;
        p.process(h.frame(), &h.ctx());
        p.process(h.frame(), &h.ctx());

        let people = h.camera.people();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].id, PersonId::new("alice"));
        assert_eq!(people[0].confidence, 70.0);
        assert!(h.camera.latest_frame().is_some());
    }

    #[test]
    fn test_regions_only_analysed_on_motion() {
        let h = Harness::new();
        h.faces.set(vec![Rect::new(0, 0, 2, 2)]);
        h.recognizer.push("bob", 90.0, vec![1.0]);
        let motion = ScriptedMotion::new(vec![None, Some(vec![Rect::new(2, 2, 8, 8)])]);
        let mut p = MotionRegions::new(Box::new(motion));

        p.process(h.frame(), &h.ctx());
        assert!(!h.camera.motion());
        assert_eq!(h.recognizer.calls(), 0);

        p.process(h.frame(), &h.ctx());
        assert!(h.camera.motion());
        assert_eq!(h.recognizer.calls(), 1);
        // 识别器收到裁剪后的区域
        assert_eq!(h.recognizer.last_frame_size(), Some((8, 8)));
        assert_eq!(h.camera.people()[0].identity, "bob");
    }
}
