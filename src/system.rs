//! 系统总控: 摄像头/处理线程/告警/布防状态/训练闸门

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

use ab_glyph::FontVec;
use crossbeam_channel::Sender;
use tracing::{error, info, warn};

use crate::alerts::{Alert, AlertEngine, AlertId, ArmingState, Dispatcher};
use crate::config::{AlertConfig, CameraConfig, EngineSettings, SystemConfig};
use crate::detection::{FrameDiffMotion, MotionProvider, NoFaces};
use crate::error::{Result, SentinelError};
use crate::input::{open_source, FrameSource};
use crate::lock;
use crate::pipeline::{build_processor, load_font, Camera, CameraStatus, CameraWorker, Providers, TrainingGate};

pub type SourceFactory = Arc<dyn Fn(&CameraConfig) -> anyhow::Result<Box<dyn FrameSource>> + Send + Sync>;
pub type MotionFactory = Arc<dyn Fn(&CameraConfig) -> Box<dyn MotionProvider> + Send + Sync>;

/// 外部依赖: 帧源/运动检测按摄像头创建,检测识别全局共享
#[derive(Clone)]
pub struct Backends {
    pub sources: SourceFactory,
    pub motion: MotionFactory,
    pub providers: Providers,
}

impl Backends {
    /// 内置实现: 图片目录帧源 + 帧差运动检测,不做人脸识别
    pub fn builtin() -> Self {
        Self {
            sources: Arc::new(open_source),
            motion: Arc::new(frame_diff_motion),
            providers: Providers {
                faces: Arc::new(NoFaces),
                recognizer: Arc::new(NoFaces),
            },
        }
    }
}

fn frame_diff_motion(_config: &CameraConfig) -> Box<dyn MotionProvider> {
    Box::new(FrameDiffMotion::default())
}

pub struct SurveillanceSystem {
    settings: Arc<EngineSettings>,
    backends: Backends,
    cameras: Arc<RwLock<Vec<Arc<Camera>>>>,
    workers: Mutex<Vec<(Arc<Camera>, JoinHandle<()>)>>,
    next_seq: AtomicUsize,
    font: Option<Arc<FontVec>>,
    alerts: Arc<Mutex<Vec<Alert>>>,
    arming: Arc<RwLock<ArmingState>>,
    gate: Arc<TrainingGate>,
    alert_shutdown: Option<Sender<()>>,
    alert_thread: Option<JoinHandle<()>>,
}

impl SurveillanceSystem {
    /// 启动告警线程,并为配置中的每个摄像头启动处理线程
    ///
    /// 打不开的摄像头记录错误后跳过
    pub fn start(config: SystemConfig, backends: Backends) -> Result<Self> {
        let settings = Arc::new(config.settings);
        let cameras = Arc::new(RwLock::new(Vec::new()));
        let alerts = Arc::new(Mutex::new(
            config.alerts.iter().map(Alert::from_config).collect::<Vec<_>>(),
        ));
        let arming = Arc::new(RwLock::new(ArmingState::default()));

        let (tx, rx) = crossbeam_channel::bounded(1);
        let engine = AlertEngine::new(
            alerts.clone(),
            cameras.clone(),
            arming.clone(),
            Dispatcher::from_settings(&settings.notify),
            settings.clone(),
        );
        let alert_thread = engine.spawn(rx)?;

        let font = settings.font_path.as_deref().and_then(|path| match load_font(path) {
            Ok(font) => {
                info!("🔤 标签字体: {}", path.display());
                Some(Arc::new(font))
            }
            Err(e) => {
                warn!("⚠️ 字体加载失败,只画框: {}", e);
                None
            }
        });

        let system = Self {
            settings,
            backends,
            cameras,
            workers: Mutex::new(Vec::new()),
            next_seq: AtomicUsize::new(0),
            font,
            alerts,
            arming,
            gate: Arc::new(TrainingGate::new()),
            alert_shutdown: Some(tx),
            alert_thread: Some(alert_thread),
        };
        for camera in config.cameras {
            let url = camera.url.clone();
            if let Err(e) = system.add_camera(camera) {
                error!("❌ 摄像头 {} 启动失败: {}", url, e);
            }
        }
        Ok(system)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ========== 摄像头 ==========

    /// 打开帧源并启动处理线程,返回摄像头下标
    pub fn add_camera(&self, config: CameraConfig) -> Result<usize> {
        let source = (self.backends.sources)(&config).map_err(|e| SentinelError::Config(format!("{e:#}")))?;
        let motion = (self.backends.motion)(&config);
        let processor = build_processor(config.mode, motion);
        let camera = Arc::new(Camera::new(config));

        let index = {
            let mut cameras = self.cameras.write().unwrap_or_else(PoisonError::into_inner);
            cameras.push(camera.clone());
            cameras.len() - 1
        };
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let worker = CameraWorker::new(
            seq,
            camera.clone(),
            source,
            processor,
            self.backends.providers.clone(),
            self.settings.clone(),
            self.gate.clone(),
        )
        .with_font(self.font.clone());
        match worker.spawn() {
            Ok(handle) => lock(&self.workers).push((camera.clone(), handle)),
            Err(e) => {
                self.cameras
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|c| !Arc::ptr_eq(c, &camera));
                return Err(e.into());
            }
        }
        info!("📷 添加摄像头[{}] #{}: {} ({})", index, seq, camera.url(), camera.mode());
        Ok(index)
    }

    /// 停止处理线程并移除摄像头,后面的摄像头下标前移
    pub fn remove_camera(&self, index: usize) -> Result<()> {
        let mut cameras = self.cameras.write().unwrap_or_else(PoisonError::into_inner);
        if index >= cameras.len() {
            return Err(SentinelError::CameraNotFound(index));
        }
        let camera = cameras.remove(index);
        camera.stop();
        // 线程看到停止标志后自行退出,句柄直接分离
        lock(&self.workers).retain(|(c, _)| !Arc::ptr_eq(c, &camera));
        info!("➖ 移除摄像头[{}]: {}", index, camera.url());
        Ok(())
    }

    pub(crate) fn worker_count(&self) -> usize {
        lock(&self.workers).len()
    }

    pub fn cameras(&self) -> Vec<Arc<Camera>> {
        self.cameras.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn camera(&self, index: usize) -> Result<Arc<Camera>> {
        self.cameras()
            .get(index)
            .cloned()
            .ok_or(SentinelError::CameraNotFound(index))
    }

    pub fn camera_status(&self, index: usize) -> Result<CameraStatus> {
        self.camera(index).map(|camera| camera.status(index))
    }

    pub fn status(&self) -> Vec<CameraStatus> {
        self.cameras()
            .iter()
            .enumerate()
            .map(|(i, camera)| camera.status(i))
            .collect()
    }

    // ========== 告警 ==========

    pub fn add_alert(&self, config: &AlertConfig) -> AlertId {
        let alert = Alert::from_config(config);
        let id = alert.id.clone();
        info!("➕ 添加告警 {}: {}", id, alert.alert_string());
        lock(&self.alerts).push(alert);
        id
    }

    pub fn list_alerts(&self) -> Vec<Alert> {
        lock(&self.alerts).clone()
    }

    /// 手动重置告警 (不必等冷却)
    pub fn reinitialise_alert(&self, id: &AlertId) -> Result<()> {
        let mut alerts = lock(&self.alerts);
        let alert = alerts
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| SentinelError::AlertNotFound(id.to_string()))?;
        alert.reinitialise();
        info!("🔄 告警 {} 已重置", id);
        Ok(())
    }

    pub fn remove_alert(&self, id: &AlertId) -> Result<()> {
        let mut alerts = lock(&self.alerts);
        let before = alerts.len();
        alerts.retain(|a| &a.id != id);
        if alerts.len() == before {
            return Err(SentinelError::AlertNotFound(id.to_string()));
        }
        info!("➖ 删除告警 {}", id);
        Ok(())
    }

    // ========== 布防 / 训练 ==========

    pub fn arming_state(&self) -> ArmingState {
        *self.arming.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_arming_state(&self, state: ArmingState) {
        *self.arming.write().unwrap_or_else(PoisonError::into_inner) = state;
        info!("🛡️ 布防状态: {}", state);
    }

    pub fn training_gate(&self) -> Arc<TrainingGate> {
        self.gate.clone()
    }

    // ========== 配置 ==========

    pub fn to_config(&self) -> SystemConfig {
        SystemConfig {
            cameras: self.cameras().iter().map(|c| c.config().clone()).collect(),
            alerts: lock(&self.alerts).iter().map(Alert::to_config).collect(),
            settings: (*self.settings).clone(),
        }
    }

    pub fn write_config(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_config().save(path)
    }

    /// 停止所有线程并等待退出
    pub fn shutdown(&mut self) {
        for camera in self.cameras() {
            camera.stop();
        }
        // 闸门关闭时处理线程也会轮询停止标志
        let workers: Vec<_> = lock(&self.workers).drain(..).collect();
        for (_, handle) in workers {
            if handle.join().is_err() {
                warn!("⚠️ 摄像头处理线程异常退出");
            }
        }
        if let Some(tx) = self.alert_shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.alert_thread.take() {
            if handle.join().is_err() {
                warn!("⚠️ 告警线程异常退出");
            }
        }
    }
}

impl Drop for SurveillanceSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}
