//! 告警规则匹配
//!
//! 只读取摄像头状态,每个摄像头的档案锁只在扫描期间持有.

use std::sync::Arc;

use super::types::{Alert, CameraSelector, EventKind};
use crate::detection::{Person, UNKNOWN};
use crate::pipeline::Camera;

/// 人员是否满足识别规则
///
/// 对 unknown 规则,阈值比较的是 `100 - 置信度`: 置信度越低越可能是陌生人
pub fn person_matches(person: &Person, alert_person: &str, threshold: f32) -> bool {
    if person.identity() != alert_person {
        return false;
    }
    if person.identity() == UNKNOWN {
        100.0 - person.confidence() >= threshold
    } else {
        person.confidence() >= threshold
    }
}

/// 单个摄像头是否满足告警条件
pub fn camera_matches(alert: &Alert, camera: &Camera) -> bool {
    match alert.event {
        EventKind::Motion => camera.motion(),
        EventKind::Recognition => camera.with_registry(|reg| {
            reg.values()
                .any(|person| person_matches(person, &alert.person, alert.confidence))
        }),
    }
}

/// 返回第一个满足条件的摄像头下标; 下标越界视为不匹配
pub fn check_camera_events(alert: &Alert, cameras: &[Arc<Camera>]) -> Option<usize> {
    match alert.camera {
        CameraSelector::Index(index) => cameras
            .get(index)
            .filter(|camera| camera_matches(alert, camera))
            .map(|_| index),
        CameraSelector::All => cameras
            .iter()
            .position(|camera| camera_matches(alert, camera)),
    }
}
