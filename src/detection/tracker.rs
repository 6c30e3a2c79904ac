// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 多目标跟踪公共组件
//! Tracker Set: binds screen regions to Persons across consecutive frames

use super::person::{Person, PersonId};
use super::types::Rect;

// ========== 跟踪对象 ==========

/// 跟踪器 (一个区域 ↔ 一个人)
///
/// 跟踪期间它是所绑定 Person 实时字段的唯一写入者.
#[derive(Debug, Clone)]
pub struct Tracker {
    /// 人员ID (复用已知人员的ID或新生成)
    id: PersonId,

    person: Person,

    /// 当前区域
    region: Rect,

    /// 连续未刷新帧数
    pings: u32,

    /// 连续未找到人脸帧数
    face_pings: u32,

    /// 显示颜色 (每个ID不同颜色)
    color: (u8, u8, u8),
}

impl Tracker {
    pub fn new(id: PersonId, person: Person, region: Rect) -> Self {
        let color = id_to_color(id_hash(&id));
        Self {
            id,
            person,
            region,
            pings: 0,
            face_pings: 0,
            color,
        }
    }

    pub fn id(&self) -> &PersonId {
        &self.id
    }

    pub fn person(&self) -> &Person {
        &self.person
    }

    pub fn person_mut(&mut self) -> &mut Person {
        &mut self.person
    }

    pub fn region(&self) -> Rect {
        self.region
    }

    pub fn pings(&self) -> u32 {
        self.pings
    }

    pub fn face_pings(&self) -> u32 {
        self.face_pings
    }

    pub fn color(&self) -> (u8, u8, u8) {
        self.color
    }

    /// 交集面积 / 跟踪框面积 > threshold
    pub fn overlaps(&self, region: &Rect, threshold: f32) -> bool {
        self.region.overlap_ratio(region) > threshold
    }

    pub fn update_region(&mut self, region: Rect) {
        self.region = region;
    }

    pub fn reset_pings(&mut self) {
        self.pings = 0;
    }

    pub fn reset_face_pings(&mut self) {
        self.face_pings = 0;
    }

    pub fn ping(&mut self) {
        self.pings += 1;
    }

    pub fn face_ping(&mut self) {
        self.face_pings += 1;
    }
}

// ========== 跟踪器集合 ==========

/// 跟踪器集合,按创建顺序保存 (最后一个最新)
///
/// 下标只在同一帧内有效: `rebind` 和 `sweep` 会改变位置.
#[derive(Debug, Default, Clone)]
pub struct TrackerSet {
    trackers: Vec<Tracker>,
}

impl TrackerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// 从旧到新
    pub fn iter(&self) -> impl Iterator<Item = &Tracker> {
        self.trackers.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Tracker> {
        self.trackers.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Tracker> {
        self.trackers.get_mut(index)
    }

    /// 从最新的跟踪器开始找第一个重叠的,不做多候选打分
    pub fn find_overlapping(&self, region: &Rect, threshold: f32) -> Option<usize> {
        (0..self.trackers.len())
            .rev()
            .find(|&i| self.trackers[i].overlaps(region, threshold))
    }

    /// 追加一个跟踪器,返回其下标
    pub fn push(&mut self, tracker: Tracker) -> usize {
        self.trackers.push(tracker);
        self.trackers.len() - 1
    }

    /// 删除 `index` 处的跟踪器,在同一区域上以 `id` 重新建立 (成为最新的一个)
    ///
    /// 返回新跟踪器的下标,下标无效时返回 None
    pub fn rebind(&mut self, index: usize, id: PersonId, person: Person) -> Option<usize> {
        if index >= self.trackers.len() {
            return None;
        }
        let old = self.trackers.remove(index);
        Some(self.push(Tracker::new(id, person, old.region)))
    }

    /// 帧末扫描: 从最新到最旧,计数 +1,超过 `max_pings` 的删除
    ///
    /// 返回被删除的跟踪器
    pub fn sweep(&mut self, max_pings: u32) -> Vec<Tracker> {
        let mut expired = Vec::new();
        for i in (0..self.trackers.len()).rev() {
            let tracker = &mut self.trackers[i];
            tracker.ping();
            tracker.face_ping();
            if tracker.pings > max_pings {
                expired.push(self.trackers.remove(i));
            }
        }
        expired
    }

    pub fn clear(&mut self) {
        self.trackers.clear();
    }
}

// ========== 工具函数 ==========

fn id_hash(id: &PersonId) -> u32 {
    id.as_str()
        .bytes()
        .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619))
}

/// 根据ID生成不同颜色
pub fn id_to_color(id: u32) -> (u8, u8, u8) {
    let hue = (id % 3600) as f32 * 137.508 % 360.0; // 黄金角度采样
    hsv_to_rgb(hue, 0.8, 0.9)
}

/// HSV转RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}
