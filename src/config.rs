//! 系统配置 - 摄像头/告警持久化到JSON文件,引擎参数可选覆盖

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::alerts::{ActionSet, ArmingPredicate, CameraSelector, EventKind};
use crate::error::Result;
use crate::pipeline::ProcessingMode;

/// 摄像头配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub url: String,
    #[serde(rename = "cameraFunction")]
    pub mode: ProcessingMode,
    /// 精确人脸检测模式 (关闭时对每张脸做二次确认)
    #[serde(rename = "dlibDetection", default, deserialize_with = "lenient_bool")]
    pub precise_detection: bool,
    /// 采集端帧率调整,透传给帧源
    #[serde(rename = "fpsTweak", default, deserialize_with = "lenient_bool")]
    pub fps_tweak: bool,
}

impl CameraConfig {
    pub fn new(url: impl Into<String>, mode: ProcessingMode) -> Self {
        Self {
            url: url.into(),
            mode,
            precise_detection: false,
            fps_tweak: false,
        }
    }
}

/// 告警配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(rename = "alarmState")]
    pub alarm_state: ArmingPredicate,
    pub camera: CameraSelector,
    pub event: EventKind,
    #[serde(default)]
    pub person: String,
    #[serde(default)]
    pub actions: ActionSet,
    #[serde(deserialize_with = "lenient_f32")]
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 通知参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub push_url: Option<String>,
    pub voice_url: Option<String>,
    pub snapshot_base_url: String,
    /// 设置后,触发时把画面写到 `<dir>/<alert_id>.png`
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            push_url: None,
            voice_url: None,
            snapshot_base_url: "http://127.0.0.1:5000".to_string(),
            snapshot_dir: None,
        }
    }
}

/// 引擎参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    // === 识别参数 ===
    pub confidence_threshold: f32, // 低于该值记为 unknown

    // === 跟踪参数 ===
    pub max_pings: u32,            // 跟踪器最大未刷新帧数
    pub overlap_threshold: f32,    // 区域关联阈值 (交集/跟踪框面积)
    pub same_person_distance: f32, // 同一张脸的平方距离上限
    pub reid_distance: f32,        // 档案重识别距离上限

    // === 状态机参数 ===
    pub motion_idle_timeout_secs: u64, // 无人脸多久回到运动检测

    // === 告警参数 ===
    pub alert_cooldown_secs: u64,
    pub alert_period_ms: u64,

    // === 其他 ===
    pub drawing: bool,
    pub font_path: Option<PathBuf>, // 标签字体 (TTF/OTF), 不设置则只画框
    pub max_thumbnails: Option<usize>,
    pub idle_backoff_ms: u64, // 无新帧时的等待

    pub notify: NotifySettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 50.0,

            max_pings: 10,
            overlap_threshold: 0.2,
            same_person_distance: 0.99,
            reid_distance: 0.8,

            motion_idle_timeout_secs: 30,

            alert_cooldown_secs: 300,
            alert_period_ms: 2000,

            drawing: true,
            font_path: None,
            max_thumbnails: None,
            idle_backoff_ms: 10,

            notify: NotifySettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn motion_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.motion_idle_timeout_secs)
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_secs)
    }

    pub fn alert_period(&self) -> Duration {
        Duration::from_millis(self.alert_period_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

/// 持久化的系统配置
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    #[serde(default)]
    pub alerts: Vec<AlertConfig>,
    #[serde(default)]
    pub settings: EngineSettings,
}

impl SystemConfig {
    /// 从JSON文件加载配置,文件缺失或损坏时返回空配置
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<SystemConfig>(&json) {
                Ok(config) => {
                    info!(
                        "✅ 配置已从 {} 加载: {}个摄像头, {}条告警",
                        path.display(),
                        config.cameras.len(),
                        config.alerts.len()
                    );
                    config
                }
                Err(e) => {
                    warn!("⚠️ 配置文件解析失败: {}, 使用空配置", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件 {} 不存在,使用空配置", path.display());
                Self::default()
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        info!("🎛️ 当前配置:");
        for (i, cam) in self.cameras.iter().enumerate() {
            info!("  摄像头[{}]: {} ({})", i, cam.url, cam.mode);
        }
        for al in &self.alerts {
            info!(
                "  告警: {:?} @ camera {} ({:?} {} >= {})",
                al.alarm_state, al.camera, al.event, al.person, al.confidence
            );
        }
        info!(
            "  识别阈值: {:.0} | 最大丢失帧: {} | 冷却: {}s",
            self.settings.confidence_threshold,
            self.settings.max_pings,
            self.settings.alert_cooldown_secs
        );
    }
}

// ========== 宽松反序列化 (兼容旧配置里的字符串布尔/数值) ==========

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolLike {
    Bool(bool),
    Text(String),
}

pub(crate) fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    match BoolLike::deserialize(deserializer)? {
        BoolLike::Bool(b) => Ok(b),
        BoolLike::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            other => Err(de::Error::custom(format!("invalid boolean `{other}`"))),
        },
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberLike {
    Number(f32),
    Text(String),
}

pub(crate) fn lenient_f32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f32, D::Error> {
    match NumberLike::deserialize(deserializer)? {
        NumberLike::Number(n) => Ok(n),
        NumberLike::Text(s) => s
            .trim()
            .parse::<f32>()
            .map_err(|_| de::Error::custom(format!("invalid number `{s}`"))),
    }
}
