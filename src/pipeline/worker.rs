//! 摄像头处理线程
//! Per-camera frame loop: read → filter → training gate → strategy

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ab_glyph::FontVec;
use tracing::{debug, info, warn};

use super::{Camera, FrameContext, FrameProcessor, Providers, TrainingGate};
use crate::config::EngineSettings;
use crate::input::{DecodeFilter, FrameSource};

/// 等待训练闸门时检查停止标志的间隔
const GATE_POLL: Duration = Duration::from_millis(200);

pub struct CameraWorker {
    seq: usize, // 启动序号,摄像头增删后不变
    camera: Arc<Camera>,
    source: Box<dyn FrameSource>,
    processor: Box<dyn FrameProcessor>,
    providers: Providers,
    settings: Arc<EngineSettings>,
    gate: Arc<TrainingGate>,
    font: Option<Arc<FontVec>>,
    filter: DecodeFilter,
    read_errors: u64, // 连续读帧失败次数
}

impl CameraWorker {
    pub fn new(
        seq: usize,
        camera: Arc<Camera>,
        source: Box<dyn FrameSource>,
        processor: Box<dyn FrameProcessor>,
        providers: Providers,
        settings: Arc<EngineSettings>,
        gate: Arc<TrainingGate>,
    ) -> Self {
        Self {
            seq,
            camera,
            source,
            processor,
            providers,
            settings,
            gate,
            font: None,
            filter: DecodeFilter::new(),
            read_errors: 0,
        }
    }

    /// 标注时使用的字体
    pub fn with_font(mut self, font: Option<Arc<FontVec>>) -> Self {
        self.font = font;
        self
    }

    pub fn read_errors(&self) -> u64 {
        self.read_errors
    }

    /// 在名为 `frame_process_thread_<seq>` 的线程中运行
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("frame_process_thread_{}", self.seq))
            .spawn(move || self.run())
    }

    pub fn run(mut self) {
        info!(
            "🎬 摄像头#{} 处理线程启动: {} ({})",
            self.seq,
            self.camera.url(),
            self.processor.mode()
        );
        while !self.camera.is_stopped() {
            self.step();
        }
        info!(
            "🛑 摄像头#{} 处理线程退出 (共{}帧,丢弃{}帧)",
            self.seq, self.filter.total_frames, self.filter.dropped_frames
        );
    }

    /// 一次循环,返回是否处理了一帧
    pub fn step(&mut self) -> bool {
        let raw = self.read();
        let Some(frame) = self.filter.filter_frame(raw) else {
            thread::sleep(self.settings.idle_backoff());
            return false;
        };
        self.camera.set_processing_fps(self.filter.current_fps);

        if self.processor.needs_gate() && !self.wait_for_gate() {
            return false;
        }

        let ctx = FrameContext {
            camera: &self.camera,
            providers: &self.providers,
            settings: &self.settings,
            font: self.font.as_deref(),
        };
        self.processor.process(frame, &ctx);
        true
    }

    /// 读一帧; 连续失败只在第一次告警
    fn read(&mut self) -> Option<image::RgbImage> {
        match self.source.read_frame() {
            Ok(frame) => {
                if self.read_errors > 0 {
                    info!("✅ 摄像头#{} 读帧恢复 (此前连续失败{}次)", self.seq, self.read_errors);
                    self.read_errors = 0;
                }
                frame
            }
            Err(e) => {
                self.read_errors += 1;
                if self.read_errors == 1 {
                    warn!("⚠️ 摄像头#{} 读帧失败: {}", self.seq, e);
                } else {
                    debug!("摄像头#{} 读帧失败 (连续{}次): {}", self.seq, self.read_errors, e);
                }
                None
            }
        }
    }

    /// 返回 false 表示等待期间收到了停止请求
    fn wait_for_gate(&self) -> bool {
        if self.gate.is_open() {
            return true;
        }
        debug!("摄像头#{} 等待训练完成", self.seq);
        loop {
            if self.gate.wait_timeout(GATE_POLL) {
                return true;
            }
            if self.camera.is_stopped() {
                return false;
            }
        }
    }
}
