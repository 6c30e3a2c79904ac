//! 通知渠道
//!
//! 发送失败只记录日志,不影响告警状态.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::types::{Alert, AlertId, NotifyChannel};
use crate::config::NotifySettings;
use crate::error::{Result, SentinelError};
use crate::pipeline::Camera;

pub const NOTICE_TITLE: &str = "Home Surveillance";

/// 一次告警要发出的内容
#[derive(Debug, Clone, Serialize)]
pub struct AlertNotice {
    pub alert_id: AlertId,
    pub title: String,
    pub body: String,
    pub camera: usize,
    /// 外部快照接口地址
    pub snapshot_url: String,
    /// 本地保存的快照
    pub snapshot_path: Option<PathBuf>,
}

pub trait Notifier: Send + Sync {
    fn send(&self, notice: &AlertNotice) -> Result<()>;
}

/// 只写日志 (未配置地址时的默认渠道)
pub struct LogNotifier {
    channel: NotifyChannel,
}

impl LogNotifier {
    pub fn new(channel: NotifyChannel) -> Self {
        Self { channel }
    }
}

impl Notifier for LogNotifier {
    fn send(&self, notice: &AlertNotice) -> Result<()> {
        info!(
            "📣 [{}] {}: {} ({})",
            self.channel, notice.title, notice.body, notice.snapshot_url
        );
        Ok(())
    }
}

/// 以JSON POST到webhook
pub struct WebhookNotifier {
    channel: NotifyChannel,
    url: String,
    agent: ureq::Agent,
}

impl WebhookNotifier {
    pub fn new(channel: NotifyChannel, url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        Self {
            channel,
            url: url.into(),
            agent,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, notice: &AlertNotice) -> Result<()> {
        let attachments: Vec<String> = std::iter::once(notice.snapshot_url.clone())
            .chain(notice.snapshot_path.iter().map(|p| p.display().to_string()))
            .collect();
        let payload = serde_json::json!({
            "title": notice.title,
            "body": notice.body,
            "attachments": attachments,
        });
        self.agent
            .post(&self.url)
            .send_json(payload)
            .map_err(|e| SentinelError::Notify {
                channel: self.channel.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// 按告警配置的动作把通知分发到各渠道
pub struct Dispatcher {
    notifiers: BTreeMap<NotifyChannel, Box<dyn Notifier>>,
    settings: NotifySettings,
}

impl Dispatcher {
    /// 配置了地址的渠道走webhook,否则只写日志
    pub fn from_settings(settings: &NotifySettings) -> Self {
        let mut notifiers: BTreeMap<NotifyChannel, Box<dyn Notifier>> = BTreeMap::new();
        for (channel, url) in [
            (NotifyChannel::Push, &settings.push_url),
            (NotifyChannel::Voice, &settings.voice_url),
        ] {
            let notifier: Box<dyn Notifier> = match url {
                Some(url) => Box::new(WebhookNotifier::new(channel, url.clone())),
                None => Box::new(LogNotifier::new(channel)),
            };
            notifiers.insert(channel, notifier);
        }
        Self {
            notifiers,
            settings: settings.clone(),
        }
    }

    pub fn with_notifier(mut self, channel: NotifyChannel, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.insert(channel, notifier);
        self
    }

    pub fn notice(&self, alert: &Alert, camera_index: usize) -> AlertNotice {
        AlertNotice {
            alert_id: alert.id.clone(),
            title: NOTICE_TITLE.to_string(),
            body: alert.alert_string(),
            camera: camera_index,
            snapshot_url: format!(
                "{}/camera_snapshot/{}",
                self.settings.snapshot_base_url.trim_end_matches('/'),
                camera_index
            ),
            snapshot_path: None,
        }
    }

    /// 发出告警,返回成功送达的渠道数
    pub fn dispatch(&self, alert: &Alert, camera_index: usize, camera: Option<&Camera>) -> usize {
        let mut notice = self.notice(alert, camera_index);
        if let Some(camera) = camera {
            notice.snapshot_path = self.save_snapshot(alert, camera);
        }
        info!("🚨 告警 {} 触发: {}", alert.id, notice.body);

        let mut delivered = 0;
        for channel in alert.actions.channels() {
            let Some(notifier) = self.notifiers.get(&channel) else {
                warn!("⚠️ 未配置通知渠道 {}", channel);
                continue;
            };
            match notifier.send(&notice) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("❌ 告警 {} 通知失败: {}", alert.id, e),
            }
        }
        delivered
    }

    fn save_snapshot(&self, alert: &Alert, camera: &Camera) -> Option<PathBuf> {
        let dir = self.settings.snapshot_dir.as_ref()?;
        let frame = camera.latest_frame()?;
        let path = dir.join(format!("{}.png", alert.id));
        let saved = fs::create_dir_all(dir)
            .map_err(SentinelError::from)
            .and_then(|_| frame.save(&path).map_err(SentinelError::from));
        match saved {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("⚠️ 快照保存失败 {}: {}", path.display(), e);
                None
            }
        }
    }
}
