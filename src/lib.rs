#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

pub mod alerts; // 告警引擎
pub mod config; // 系统配置
pub mod detection; // 检测/跟踪
pub mod error;
pub mod input; // 视频输入
pub mod logging;
pub mod pipeline; // 逐帧处理
pub mod system; // 系统总控

#[cfg(test)]
pub(crate) mod testing;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use crate::config::{AlertConfig, CameraConfig, EngineSettings, SystemConfig};
pub use crate::error::{Result, SentinelError};
pub use crate::pipeline::ProcessingMode;
pub use crate::system::{Backends, SurveillanceSystem};

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}

/// 加锁; 持锁线程 panic 后仍继续使用内部数据
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
