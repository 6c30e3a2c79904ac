/// 告警系统 (Alert System)
///
/// - Types:    告警规则/布防状态
/// - Matcher:  规则与摄像头状态的匹配
/// - Engine:   周期性评估 + 冷却
/// - Notify:   通知渠道
pub mod engine;
pub mod matcher;
pub mod notify;
pub mod types;

pub use engine::AlertEngine;
pub use notify::{AlertNotice, Dispatcher, LogNotifier, Notifier, WebhookNotifier};
pub use types::{ActionSet, Alert, AlertId, ArmingPredicate, ArmingState, CameraSelector, EventKind, NotifyChannel};
