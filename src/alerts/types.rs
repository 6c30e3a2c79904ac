//! 告警数据结构定义
//! Data structures for alert rules

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::config::{lenient_bool, AlertConfig};
use crate::error::SentinelError;

// ========== 布防状态 ==========

/// 系统布防状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArmingState {
    #[default]
    Disarmed,
    Armed,
    Triggered,
}

impl FromStr for ArmingState {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disarmed" => Ok(Self::Disarmed),
            "armed" => Ok(Self::Armed),
            "triggered" => Ok(Self::Triggered),
            other => Err(SentinelError::Config(format!("unknown arming state `{other}`"))),
        }
    }
}

impl fmt::Display for ArmingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disarmed => "Disarmed",
            Self::Armed => "Armed",
            Self::Triggered => "Triggered",
        };
        f.write_str(s)
    }
}

/// 告警生效的布防状态 (`All` 表示任意状态)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmingPredicate {
    Disarmed,
    Armed,
    Triggered,
    All,
}

impl ArmingPredicate {
    pub fn admits(&self, state: ArmingState) -> bool {
        match self {
            Self::All => true,
            Self::Disarmed => state == ArmingState::Disarmed,
            Self::Armed => state == ArmingState::Armed,
            Self::Triggered => state == ArmingState::Triggered,
        }
    }
}

// ========== 摄像头选择 ==========

/// 目标摄像头: 指定下标或全部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSelector {
    Index(usize),
    All,
}

impl fmt::Display for CameraSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::All => f.write_str("All"),
        }
    }
}

impl FromStr for CameraSelector {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        // 兼容旧格式 "camera_3"
        let digits = s.rsplit('_').next().unwrap_or(s);
        digits
            .parse::<usize>()
            .map(Self::Index)
            .map_err(|_| SentinelError::Config(format!("invalid camera selector `{s}`")))
    }
}

impl Serialize for CameraSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CameraSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(usize),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Index(i) => Ok(Self::Index(i)),
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

// ========== 事件与动作 ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Recognition,
    Motion,
}

/// 通知渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NotifyChannel {
    /// 推送 (apprise)
    Push,
    /// 语音播报 (mycroft)
    Voice,
}

impl fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => f.write_str("push"),
            Self::Voice => f.write_str("voice"),
        }
    }
}

/// 告警触发时启用的渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionSet {
    #[serde(rename = "apprise_message", default, deserialize_with = "lenient_bool")]
    pub push: bool,
    #[serde(rename = "mycroft_message", default, deserialize_with = "lenient_bool")]
    pub voice: bool,
}

impl ActionSet {
    pub fn channels(&self) -> Vec<NotifyChannel> {
        let mut channels = Vec::new();
        if self.push {
            channels.push(NotifyChannel::Push);
        }
        if self.voice {
            channels.push(NotifyChannel::Voice);
        }
        channels
    }
}

// ========== 告警 ==========

static ALERT_COUNT: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AlertId(String);

impl AlertId {
    pub fn next() -> Self {
        Self(format!("alert_{}", ALERT_COUNT.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 告警规则及其内部状态
///
/// `Idle → Pending → Fired → (冷却) → Idle`
#[derive(Debug, Clone)]
pub struct Alert {
    pub id: AlertId,
    pub arming: ArmingPredicate,
    pub camera: CameraSelector,
    pub event: EventKind,
    /// 仅 Recognition 有意义
    pub person: String,
    pub confidence: f32,
    pub actions: ActionSet,
    /// 自定义消息,覆盖默认文案
    pub message: Option<String>,
    pub event_occurred: bool,
    pub action_taken: bool,
    pub event_time: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            id: AlertId::next(),
            arming: config.alarm_state,
            camera: config.camera,
            event: config.event,
            person: config.person.clone(),
            confidence: config.confidence,
            actions: config.actions,
            message: config.message.clone(),
            event_occurred: false,
            action_taken: false,
            event_time: None,
        }
    }

    pub fn to_config(&self) -> AlertConfig {
        AlertConfig {
            alarm_state: self.arming,
            camera: self.camera,
            event: self.event,
            person: self.person.clone(),
            actions: self.actions,
            confidence: self.confidence,
            message: self.message.clone(),
        }
    }

    /// 告警文案
    pub fn alert_string(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        match self.event {
            EventKind::Motion => format!("Motion detected in camera {}", self.camera),
            EventKind::Recognition => format!(
                "{} was recognised in camera {} with a confidence greater than {}",
                self.person, self.camera, self.confidence
            ),
        }
    }

    pub fn set_custom_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// 冷却期内 (已触发且未满 `cooldown`)
    pub fn is_cooling_down(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.action_taken && !self.cooldown_elapsed(now, cooldown)
    }

    pub fn cooldown_elapsed(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.event_time {
            Some(at) => (now - at).to_std().map(|d| d >= cooldown).unwrap_or(false),
            None => true,
        }
    }

    pub fn mark_fired(&mut self, at: DateTime<Utc>) {
        self.event_occurred = true;
        self.action_taken = true;
        self.event_time = Some(at);
    }

    pub fn reinitialise(&mut self) {
        self.event_occurred = false;
        self.action_taken = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognition(person: &str, confidence: f32) -> AlertConfig {
        AlertConfig {
            alarm_state: ArmingPredicate::All,
            camera: CameraSelector::Index(0),
            event: EventKind::Recognition,
            person: person.to_string(),
            actions: ActionSet::default(),
            confidence,
            message: None,
        }
    }

    #[test]
    fn test_predicate_admits() {
        assert!(ArmingPredicate::All.admits(ArmingState::Triggered));
        assert!(ArmingPredicate::Armed.admits(ArmingState::Armed));
        assert!(!ArmingPredicate::Armed.admits(ArmingState::Disarmed));
    }

    #[test]
    fn test_camera_selector_parse() {
        assert_eq!("All".parse::<CameraSelector>().ok(), Some(CameraSelector::All));
        assert_eq!("2".parse::<CameraSelector>().ok(), Some(CameraSelector::Index(2)));
        assert_eq!(
            "camera_4".parse::<CameraSelector>().ok(),
            Some(CameraSelector::Index(4))
        );
        assert!("front door".parse::<CameraSelector>().is_err());
    }

    #[test]
    fn test_alert_ids_are_unique() {
        let a = Alert::from_config(&recognition("alice", 50.0));
        let b = Alert::from_config(&recognition("alice", 50.0));
        assert_ne!(a.id, b.id);
        assert!(a.id.as_str().starts_with("alert_"));
    }

    #[test]
    fn test_alert_string() {
        let mut alert = Alert::from_config(&recognition("alice", 60.0));
        assert_eq!(
            alert.alert_string(),
            "alice was recognised in camera 0 with a confidence greater than 60"
        );
        alert.set_custom_message("front door");
        assert_eq!(alert.alert_string(), "front door");
    }

    #[test]
    fn test_cooldown_window() {
        let mut alert = Alert::from_config(&recognition("alice", 60.0));
        let cooldown = Duration::from_secs(300);
        let fired_at = Utc::now();
        alert.mark_fired(fired_at);
        assert!(alert.is_cooling_down(fired_at + chrono::Duration::seconds(299), cooldown));
        assert!(!alert.is_cooling_down(fired_at + chrono::Duration::seconds(300), cooldown));
    }

    #[test]
    fn test_actions_channels() {
        let actions = ActionSet {
            push: true,
            voice: false,
        };
        assert_eq!(actions.channels(), vec![NotifyChannel::Push]);
    }
}
