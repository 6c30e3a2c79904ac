// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 模式5: 运动区域跟踪+识别
//! Region tracking with identity re-binding
//!
//! 每个运动区域先按重叠率关联到已有跟踪器:
//! - 关联成功: 刷新区域,在区域内识别人脸并更新跟踪器的人员记录.
//!   单张人脸且特征距离过远、名字也不同时,认为换了人,把跟踪器重新绑定到
//!   档案中的已知人员或新建的人员.
//! - 关联失败: 区域内每张人脸各自建立一个跟踪器.
//!
//! 每帧结束时所有跟踪器计数加一,超过 `max_pings` 的被移除.
//!
//! 同一个ID可能同时被多个跟踪器持有,所以写档案时总是合入已有条目,从不整条覆盖.

use image::RgbImage;
use tracing::{debug, info};

use super::annotate::{draw_boxes, draw_trackers, MOTION_COLOR};
use super::merge::{crop, detect_faces, detect_motion, recognise};
use super::{FrameContext, FrameProcessor, ProcessingMode};
use crate::detection::person::{label_for, normalize_identity};
use crate::detection::{
    find_candidate, Embedding, MotionProvider, Person, PersonId, Prediction, Rect, Tracker, TrackerSet,
};

pub struct TrackRecognise {
    motion: Box<dyn MotionProvider>,
    trackers: TrackerSet,
}

impl TrackRecognise {
    pub fn new(motion: Box<dyn MotionProvider>) -> Self {
        Self {
            motion,
            trackers: TrackerSet::new(),
        }
    }

    pub fn trackers(&self) -> &TrackerSet {
        &self.trackers
    }

    fn associate(&mut self, frame: &RgbImage, region: &Rect, ctx: &FrameContext<'_>) {
        let Some((region, patch)) = crop(frame, region) else {
            return;
        };
        match self
            .trackers
            .find_overlapping(&region, ctx.settings.overlap_threshold)
        {
            Some(index) => self.refresh(index, region, &patch, ctx),
            None => self.spawn(region, &patch, ctx),
        }
    }

    /// 已关联的跟踪器: 更新区域并识别区域内的人脸
    fn refresh(&mut self, mut index: usize, region: Rect, patch: &RgbImage, ctx: &FrameContext<'_>) {
        let settings = ctx.settings;
        let threshold = settings.confidence_threshold;
        if let Some(tracker) = self.trackers.get_mut(index) {
            tracker.update_region(region);
            tracker.reset_pings();
        }

        let faces = detect_faces(ctx, patch);
        let single = faces.len() == 1;
        for face in &faces {
            let Some(prediction) = recognise(ctx, patch, face) else {
                continue;
            };
            let predicted = label_for(&prediction, threshold).to_string();
            let Some(tracker) = self.trackers.get(index) else {
                break;
            };
            let distance = ctx
                .providers
                .recognizer
                .squared_distance(tracker.person().embedding(), &prediction.embedding);
            let current = tracker.person().identity();

            let add_face = if single {
                if distance > settings.same_person_distance && current != predicted {
                    match self.rebind(index, &prediction, &predicted, ctx) {
                        Some((new_index, add_face)) => {
                            index = new_index;
                            add_face
                        }
                        None => break,
                    }
                } else {
                    true
                }
            } else if distance < settings.same_person_distance && current == normalize_identity(&prediction.identity) {
                true
            } else {
                // 多张脸时不猜测归属
                break;
            };
            self.observe(index, &prediction, add_face, ctx);
        }
    }

    /// 在档案中重识别: 候选在锁内复制,距离在锁外计算
    fn lookup(&self, predicted: &str, embedding: &Embedding, ctx: &FrameContext<'_>) -> Option<PersonId> {
        let candidates = ctx.camera.with_registry(|reg| reg.candidates());
        let recognizer = &ctx.providers.recognizer;
        find_candidate(
            &candidates,
            predicted,
            embedding,
            ctx.settings.reid_distance,
            |a, b| recognizer.squared_distance(a, b),
        )
    }

    /// 换人: 档案里找得到就沿用其ID,否则新建; 返回新下标和是否还需追加缩略图
    fn rebind(
        &mut self,
        index: usize,
        prediction: &Prediction,
        predicted: &str,
        ctx: &FrameContext<'_>,
    ) -> Option<(usize, bool)> {
        let threshold = ctx.settings.confidence_threshold;
        let known = self.lookup(predicted, &prediction.embedding, ctx);
        let (id, person, known) = ctx.camera.with_registry(|reg| {
            match known.and_then(|id| reg.get(&id).cloned().map(|p| (id, p))) {
                Some((id, person)) => (id, person, true),
                None => {
                    let id = reg.fresh_id();
                    let person = Person::from_prediction(prediction, threshold);
                    reg.upsert(id.clone(), person.clone());
                    (id, person, false)
                }
            }
        });
        info!(
            "🔁 跟踪器重新绑定 → {} ({}, {})",
            id,
            person.identity(),
            if known { "已知" } else { "新人员" }
        );
        self.trackers.rebind(index, id, person).map(|i| (i, known))
    }

    /// 公共更新: 跟踪器持有的记录和档案条目各自合入本次检测
    fn observe(&mut self, index: usize, prediction: &Prediction, add_face: bool, ctx: &FrameContext<'_>) {
        let settings = ctx.settings;
        let (threshold, cap) = (settings.confidence_threshold, settings.max_thumbnails);
        let Some(tracker) = self.trackers.get_mut(index) else {
            return;
        };
        tracker
            .person_mut()
            .merge_detection(prediction, add_face, threshold, cap);
        tracker.reset_face_pings();

        let tracker = &*tracker;
        ctx.camera.with_registry(|reg| match reg.get_mut(tracker.id()) {
            Some(entry) => entry.merge_detection(prediction, add_face, threshold, cap),
            None => reg.upsert(tracker.id().clone(), tracker.person().clone()),
        });
    }

    /// 未关联的区域: 每张人脸建立一个跟踪器
    fn spawn(&mut self, region: Rect, patch: &RgbImage, ctx: &FrameContext<'_>) {
        let settings = ctx.settings;
        let threshold = settings.confidence_threshold;

        for face in detect_faces(ctx, patch) {
            let Some(prediction) = recognise(ctx, patch, &face) else {
                continue;
            };
            let predicted = label_for(&prediction, threshold).to_string();
            let known = self.lookup(&predicted, &prediction.embedding, ctx);
            let (id, person): (PersonId, Person) = ctx.camera.with_registry(|reg| {
                if let Some(id) = known {
                    if let Some(entry) = reg.get_mut(&id) {
                        entry.merge_detection(&prediction, true, threshold, settings.max_thumbnails);
                        debug!("👀 重新识别 {} ({})", id, entry.identity());
                        return (id, entry.clone());
                    }
                }
                let id = reg.fresh_id();
                let person = Person::from_prediction(&prediction, threshold);
                reg.upsert(id.clone(), person.clone());
                (id, person)
            });
            info!("🆕 新跟踪器 {} ({}, {:.1})", id, person.identity(), person.confidence());
            self.trackers.push(Tracker::new(id, person, region));
        }
    }

    fn sweep(&mut self, ctx: &FrameContext<'_>) {
        for expired in self.trackers.sweep(ctx.settings.max_pings) {
            info!("🗑️ 跟踪器过期: {} ({})", expired.id(), expired.person().identity());
        }
    }
}

impl FrameProcessor for TrackRecognise {
    fn mode(&self) -> ProcessingMode {
        ProcessingMode::DetectRecogniseTrack
    }

    fn process(&mut self, mut frame: RgbImage, ctx: &FrameContext<'_>) {
        let result = detect_motion(self.motion.as_mut(), &frame, true);
        ctx.camera.set_motion(result.motion);
        if result.motion {
            for region in &result.regions {
                self.associate(&frame, region, ctx);
            }
        }
        self.sweep(ctx);

        if ctx.settings.drawing {
            draw_boxes(&mut frame, &result.regions, MOTION_COLOR);
            draw_trackers(&mut frame, &self.trackers, ctx.font);
        }
        ctx.camera.publish_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, ScriptedMotion};

    fn region() -> Rect {
        Rect::new(0, 0, 12, 12)
    }

    fn face() -> Rect {
        Rect::new(2, 2, 4, 4)
    }

    #[test]
    fn test_new_region_creates_tracker_and_person() {
        let h = Harness::new();
        h.faces.set(vec![face()]);
        h.recognizer.push("alice", 80.0, vec![0.0, 0.0]);
        let mut p = TrackRecognise::new(Box::new(ScriptedMotion::new(vec![Some(vec![region()])])));

        p.process(h.frame(), &h.ctx());
        assert_eq!(p.trackers().len(), 1);
        let tracker = p.trackers().get(0).unwrap();
        assert_eq!(tracker.person().identity(), "alice");
        let people = h.camera.people();
        assert_eq!(people.len(), 1);
        assert_eq!(&people[0].id, tracker.id());
    }

    #[test]
    fn test_tracker_expires_after_max_pings() {
        let h = Harness::new();
        h.faces.set(vec![face()]);
        h.recognizer.push("alice", 80.0, vec![0.0, 0.0]);
        let mut p = TrackRecognise::new(Box::new(ScriptedMotion::new(vec![Some(vec![region()])])));

        // 创建帧本身也会计数一次
        p.process(h.frame(), &h.ctx());
        for _ in 0..9 {
            p.process(h.frame(), &h.ctx());
        }
        assert_eq!(p.trackers().len(), 1);
        p.process(h.frame(), &h.ctx());
        assert!(p.trackers().is_empty());
        // 档案保留
        assert_eq!(h.camera.people().len(), 1);
    }

    #[test]
    fn test_overlapping_region_refreshes_same_tracker() {
        let h = Harness::new();
        h.faces.set(vec![face()]);
        h.recognizer.push("alice", 60.0, vec![0.0, 0.0]);
        h.recognizer.push("alice", 90.0, vec![0.1, 0.0]);
        let motion = ScriptedMotion::new(vec![Some(vec![region()]), Some(vec![Rect::new(2, 2, 12, 12)])]);
        let mut p = TrackRecognise::new(Box::new(motion));

        p.process(h.frame(), &h.ctx());
        p.process(h.frame(), &h.ctx());
        assert_eq!(p.trackers().len(), 1);
        let tracker = p.trackers().get(0).unwrap();
        assert_eq!(tracker.region(), Rect::new(2, 2, 12, 12));
        assert_eq!(tracker.pings(), 1);
        assert_eq!(tracker.person().confidence(), 90.0);
        assert_eq!(tracker.person().thumbnails().len(), 2);
        assert_eq!(h.camera.people()[0].confidence, 90.0);
    }

    #[test]
    fn test_new_region_reidentifies_by_embedding() {
        let h = Harness::new().with_frame_size(64, 64);
        h.faces.set(vec![face()]);
        // 第一次看到: unknown
        h.recognizer.push("unknown", 30.0, vec![1.0, 1.0]);
        // 离开后在另一处出现, 特征距离 0.5 < 0.8
        h.recognizer.push("unknown", 35.0, vec![1.5, 1.0]);
        let motion = ScriptedMotion::new(vec![
            Some(vec![region()]),
            Some(vec![Rect::new(40, 40, 12, 12)]),
        ]);
        let mut p = TrackRecognise::new(Box::new(motion));

        p.process(h.frame(), &h.ctx());
        p.process(h.frame(), &h.ctx());
        assert_eq!(p.trackers().len(), 2);
        let first = p.trackers().get(0).unwrap().id().clone();
        let second = p.trackers().get(1).unwrap().id().clone();
        assert_eq!(first, second);
        let people = h.camera.people();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].confidence, 35.0);
    }

    #[test]
    fn test_different_face_rebinds_tracker() {
        let h = Harness::new();
        h.faces.set(vec![face()]);
        h.recognizer.push("alice", 80.0, vec![0.0, 0.0]);
        // 同一区域出现另一个人: 距离 8 > 0.99, 名字不同
        h.recognizer.push("bob", 85.0, vec![2.0, 2.0]);
        let motion = ScriptedMotion::new(vec![Some(vec![region()]), Some(vec![region()])]);
        let mut p = TrackRecognise::new(Box::new(motion));

        p.process(h.frame(), &h.ctx());
        let alice = p.trackers().get(0).unwrap().id().clone();
        p.process(h.frame(), &h.ctx());

        assert_eq!(p.trackers().len(), 1);
        let tracker = p.trackers().get(0).unwrap();
        assert_ne!(tracker.id(), &alice);
        assert_eq!(tracker.person().identity(), "bob");
        assert_eq!(tracker.region(), region());
        assert_eq!(tracker.person().thumbnails().len(), 1);
        assert_eq!(h.camera.people().len(), 2);
    }

    #[test]
    fn test_multiple_faces_do_not_rebind() {
        let h = Harness::new();
        h.faces.set(vec![face()]);
        h.recognizer.push("alice", 80.0, vec![0.0, 0.0]);
        let motion = ScriptedMotion::new(vec![Some(vec![region()]), Some(vec![region()])]);
        let mut p = TrackRecognise::new(Box::new(motion));
        p.process(h.frame(), &h.ctx());
        let alice = p.trackers().get(0).unwrap().id().clone();

        h.faces.set(vec![face(), Rect::new(6, 6, 4, 4)]);
        h.recognizer.push("bob", 95.0, vec![3.0, 3.0]);
        h.recognizer.push("alice", 99.0, vec![0.0, 0.0]);
        p.process(h.frame(), &h.ctx());

        let tracker = p.trackers().get(0).unwrap();
        assert_eq!(tracker.id(), &alice);
        assert_eq!(tracker.person().confidence(), 80.0);
        // 不匹配后不再处理后面的脸
        assert_eq!(h.recognizer.calls(), 2);
    }

    #[test]
    fn test_no_motion_still_sweeps() {
        let h = Harness::new();
        h.faces.set(vec![face()]);
        h.recognizer.push("alice", 80.0, vec![0.0, 0.0]);
        let mut p = TrackRecognise::new(Box::new(ScriptedMotion::new(vec![Some(vec![region()])])));
        p.process(h.frame(), &h.ctx());
        p.process(h.frame(), &h.ctx());
        assert!(!h.camera.motion());
        assert_eq!(p.trackers().get(0).unwrap().pings(), 2);
    }

    fn registry_thumbnails(h: &Harness, id: &PersonId) -> usize {
        h.camera
            .with_registry(|reg| reg.get(id).map(|p| p.thumbnails().len()))
            .unwrap_or(0)
    }

    #[test]
    fn test_shared_id_trackers_never_shrink_registry_entry() {
        let h = Harness::new().with_frame_size(64, 64);
        h.faces.set(vec![face()]);
        let a = region();
        let b = Rect::new(40, 40, 12, 12);
        h.recognizer.push("alice", 80.0, vec![0.0, 0.0]);
        h.recognizer.push("alice", 80.0, vec![0.0, 0.0]);
        // 另一处出现, 距离 0.25 重识别为同一个ID
        h.recognizer.push("bob", 60.0, vec![0.5, 0.0]);
        h.recognizer.push("bob", 60.0, vec![0.5, 0.0]);
        h.recognizer.push("alice", 80.0, vec![0.0, 0.0]);
        let motion = ScriptedMotion::new(vec![
            Some(vec![a]),
            Some(vec![a]),
            Some(vec![b]),
            Some(vec![b]),
            Some(vec![a]),
        ]);
        let mut p = TrackRecognise::new(Box::new(motion));

        let mut counts = Vec::new();
        p.process(h.frame(), &h.ctx());
        let id = p.trackers().get(0).unwrap().id().clone();
        counts.push(registry_thumbnails(&h, &id));
        for _ in 0..4 {
            p.process(h.frame(), &h.ctx());
            counts.push(registry_thumbnails(&h, &id));
        }

        assert_eq!(p.trackers().len(), 2);
        assert!(p.trackers().iter().all(|t| t.id() == &id));
        assert_eq!(counts, vec![1, 2, 3, 4, 5]);
        let people = h.camera.people();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].identity, "alice");
        assert_eq!(people[0].confidence, 80.0);
    }

    #[test]
    fn test_reidentifies_across_different_labels() {
        let h = Harness::new().with_frame_size(64, 64);
        h.faces.set(vec![face()]);
        h.recognizer.push("alice", 80.0, vec![0.0, 0.0]);
        h.recognizer.push("bob", 80.0, vec![0.5, 0.0]);
        let motion = ScriptedMotion::new(vec![Some(vec![region()]), Some(vec![Rect::new(40, 40, 12, 12)])]);
        let mut p = TrackRecognise::new(Box::new(motion));

        p.process(h.frame(), &h.ctx());
        p.process(h.frame(), &h.ctx());

        assert_eq!(p.trackers().len(), 2);
        assert_eq!(p.trackers().get(0).unwrap().id(), p.trackers().get(1).unwrap().id());
        assert_eq!(h.camera.people().len(), 1);
    }

    #[test]
    fn test_rebind_to_known_entry_keeps_its_confidence() {
        let h = Harness::new().with_frame_size(64, 64);
        h.faces.set(vec![face()]);
        let b = Rect::new(40, 40, 12, 12);
        h.recognizer.push("bob", 90.0, vec![5.0, 5.0]);
        h.recognizer.push("alice", 80.0, vec![0.0, 0.0]);
        // alice 的区域里换成了 bob
        h.recognizer.push("bob", 70.0, vec![5.0, 5.0]);
        let motion = ScriptedMotion::new(vec![Some(vec![b]), Some(vec![region()]), Some(vec![region()])]);
        let mut p = TrackRecognise::new(Box::new(motion));

        p.process(h.frame(), &h.ctx());
        let bob = p.trackers().get(0).unwrap().id().clone();
        p.process(h.frame(), &h.ctx());
        p.process(h.frame(), &h.ctx());

        assert_eq!(p.trackers().len(), 2);
        let tracker = p.trackers().get(1).unwrap();
        assert_eq!(tracker.id(), &bob);
        assert_eq!(tracker.region(), region());
        assert_eq!(tracker.person().identity(), "bob");
        assert_eq!(tracker.person().confidence(), 90.0);
        assert_eq!(h.camera.people().len(), 2);
        let entry = h.camera.with_registry(|reg| reg.get(&bob).map(|p| p.confidence()));
        assert_eq!(entry, Some(90.0));
        assert_eq!(registry_thumbnails(&h, &bob), 2);
    }
}
