//! 告警引擎
//!
//! 每个周期评估所有告警; 已触发的告警在冷却期满后重置,重置的那个周期不再评估.

use std::io;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info};

use super::matcher::check_camera_events;
use super::notify::Dispatcher;
use super::types::{Alert, AlertId, ArmingState};
use crate::config::EngineSettings;
use crate::lock;
use crate::pipeline::Camera;

pub struct AlertEngine {
    alerts: Arc<Mutex<Vec<Alert>>>,
    cameras: Arc<RwLock<Vec<Arc<Camera>>>>,
    arming: Arc<RwLock<ArmingState>>,
    dispatcher: Dispatcher,
    settings: Arc<EngineSettings>,
}

impl AlertEngine {
    pub fn new(
        alerts: Arc<Mutex<Vec<Alert>>>,
        cameras: Arc<RwLock<Vec<Arc<Camera>>>>,
        arming: Arc<RwLock<ArmingState>>,
        dispatcher: Dispatcher,
        settings: Arc<EngineSettings>,
    ) -> Self {
        Self {
            alerts,
            cameras,
            arming,
            dispatcher,
            settings,
        }
    }

    /// 评估一个周期,返回本周期触发的告警
    pub fn evaluate(&self, now: DateTime<Utc>) -> Vec<AlertId> {
        let state = *self.arming.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let cameras: Vec<Arc<Camera>> = self
            .cameras
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        let cooldown = self.settings.alert_cooldown();

        let mut fired = Vec::new();
        let mut alerts = lock(&self.alerts);
        for alert in alerts.iter_mut() {
            if alert.action_taken {
                if alert.cooldown_elapsed(now, cooldown) {
                    debug!("🔄 告警 {} 冷却结束", alert.id);
                    alert.reinitialise();
                }
                continue;
            }
            if !alert.arming.admits(state) {
                continue;
            }
            match check_camera_events(alert, &cameras) {
                Some(index) => {
                    alert.event_occurred = true;
                    self.dispatcher
                        .dispatch(alert, index, cameras.get(index).map(|c| c.as_ref()));
                    alert.mark_fired(now);
                    fired.push(alert.id.clone());
                }
                None => alert.event_occurred = false,
            }
        }
        fired
    }

    /// 周期运行直到收到停止信号或发送端被丢弃
    pub fn run(self, shutdown: Receiver<()>) {
        let period = self.settings.alert_period();
        info!("🔔 告警线程启动 (周期 {:?})", period);
        loop {
            self.evaluate(Utc::now());
            match shutdown.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("🛑 告警线程退出");
    }

    /// 在名为 `alerts_process_thread` 的线程中运行
    pub fn spawn(self, shutdown: Receiver<()>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("alerts_process_thread".to_string())
            .spawn(move || self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::notify::tests::Recording;
    use crate::alerts::types::{ActionSet, ArmingPredicate, CameraSelector, EventKind, NotifyChannel};
    use crate::config::{AlertConfig, CameraConfig, NotifySettings};
    use crate::detection::{Embedding, Person, PersonId};
    use crate::pipeline::ProcessingMode;
    use image::RgbImage;

    struct Fixture {
        engine: AlertEngine,
        alerts: Arc<Mutex<Vec<Alert>>>,
        camera: Arc<Camera>,
        arming: Arc<RwLock<ArmingState>>,
        push: Recording,
    }

    fn fixture(configs: &[AlertConfig]) -> Fixture {
        let camera = Arc::new(Camera::new(CameraConfig::new("dir://x", ProcessingMode::DetectRecognise)));
        let alerts = Arc::new(Mutex::new(configs.iter().map(Alert::from_config).collect()));
        let arming = Arc::new(RwLock::new(ArmingState::Disarmed));
        let push = Recording::default();
        let dispatcher = Dispatcher::from_settings(&NotifySettings::default())
            .with_notifier(NotifyChannel::Push, Box::new(push.clone()));
        let engine = AlertEngine::new(
            alerts.clone(),
            Arc::new(RwLock::new(vec![camera.clone()])),
            arming.clone(),
            dispatcher,
            Arc::new(EngineSettings::default()),
        );
        Fixture {
            engine,
            alerts,
            camera,
            arming,
            push,
        }
    }

    fn config(alarm_state: ArmingPredicate, event: EventKind, person: &str, confidence: f32) -> AlertConfig {
        AlertConfig {
            alarm_state,
            camera: CameraSelector::Index(0),
            event,
            person: person.to_string(),
            actions: ActionSet {
                push: true,
                voice: false,
            },
            confidence,
            message: None,
        }
    }

    fn see(camera: &Camera, name: &str, confidence: f32) {
        camera.with_registry(|reg| {
            reg.upsert(
                PersonId::new(name),
                Person::new(Embedding::default(), confidence, RgbImage::new(1, 1), name),
            )
        });
    }

    #[test]
    fn test_fires_once_within_cooldown() {
        let f = fixture(&[config(ArmingPredicate::All, EventKind::Recognition, "alice", 60.0)]);
        see(&f.camera, "alice", 80.0);
        let now = Utc::now();

        assert_eq!(f.engine.evaluate(now).len(), 1);
        assert!(f.engine.evaluate(now + chrono::Duration::seconds(2)).is_empty());
        assert!(f.engine.evaluate(now + chrono::Duration::seconds(299)).is_empty());
        assert_eq!(f.push.bodies().len(), 1);
        let alerts = lock(&f.alerts);
        assert!(alerts[0].event_occurred && alerts[0].action_taken);
    }

    #[test]
    fn test_reset_after_cooldown_then_refires() {
        let f = fixture(&[config(ArmingPredicate::All, EventKind::Motion, "", 0.0)]);
        f.camera.set_motion(true);
        let now = Utc::now();
        lock(&f.alerts)[0].mark_fired(now - chrono::Duration::seconds(301));

        // 重置周期本身不评估
        assert!(f.engine.evaluate(now).is_empty());
        {
            let alerts = lock(&f.alerts);
            assert!(!alerts[0].event_occurred);
            assert!(!alerts[0].action_taken);
        }
        assert_eq!(f.engine.evaluate(now + chrono::Duration::seconds(2)).len(), 1);
    }

    #[test]
    fn test_arming_predicate_gates_alert() {
        let f = fixture(&[config(ArmingPredicate::Armed, EventKind::Motion, "", 0.0)]);
        f.camera.set_motion(true);
        let now = Utc::now();
        assert!(f.engine.evaluate(now).is_empty());

        *f.arming.write().unwrap() = ArmingState::Armed;
        assert_eq!(f.engine.evaluate(now).len(), 1);
    }

    #[test]
    fn test_no_event_clears_pending_flag() {
        let f = fixture(&[config(ArmingPredicate::All, EventKind::Recognition, "unknown", 65.0)]);
        see(&f.camera, "unknown", 40.0);
        assert!(f.engine.evaluate(Utc::now()).is_empty());
        assert!(!lock(&f.alerts)[0].event_occurred);
        assert!(f.push.bodies().is_empty());
    }

    #[test]
    fn test_thread_stops_on_shutdown() {
        let f = fixture(&[]);
        let (tx, rx) = crossbeam_channel::bounded(1);
        let handle = f.engine.spawn(rx).unwrap();
        tx.send(()).unwrap();
        handle.join().unwrap();
    }
}
