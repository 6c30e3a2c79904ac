/// 人脸哨兵 (Face Sentinel)
///
/// 多摄像头人员跟踪与告警系统
///
/// 系统架构:
/// 1. 处理线程: 每个摄像头一个 (读帧 → 运动/人脸检测 → 跟踪 → 档案)
/// 2. 告警线程: 周期评估告警规则并发送通知
/// 3. 主线程:   定时打印状态
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use face_sentinel::alerts::ArmingState;
use face_sentinel::logging::init_logging;
use face_sentinel::{Backends, SurveillanceSystem, SystemConfig};

/// 人脸哨兵参数
#[derive(Parser, Debug)]
#[command(author, version, about = "人脸哨兵 - 多摄像头人员跟踪与告警", long_about = None)]
struct Args {
    /// 配置文件
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// 日志级别 (trace/debug/info/warn/error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// 启动时的布防状态 (Disarmed/Armed/Triggered)
    #[arg(long)]
    arm: Option<String>,

    /// 保存规范化后的配置并退出
    #[arg(long, default_value_t = false)]
    write_config: bool,

    /// 状态打印间隔 (秒)
    #[arg(long, default_value_t = 10)]
    status_interval: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("🚀 人脸哨兵启动");
    let config = SystemConfig::load(&args.config);
    config.log_summary();

    if args.write_config {
        config
            .save(&args.config)
            .with_context(|| format!("writing {}", args.config.display()))?;
        return Ok(());
    }

    let arming = match &args.arm {
        Some(state) => Some(state.parse::<ArmingState>()?),
        None => None,
    };

    warn!("⚠️ 未接入人脸检测/识别模型,只做运动检测");
    let system = SurveillanceSystem::start(config, Backends::builtin())?;
    if let Some(state) = arming {
        system.set_arming_state(state);
    }

    loop {
        thread::sleep(Duration::from_secs(args.status_interval.max(1)));
        for status in system.status() {
            info!(
                "📊 摄像头[{}] {} | 运动: {} | {:.1} FPS | 人员: {}",
                status.index,
                status.mode,
                status.motion,
                status.processing_fps,
                status.people.len()
            );
        }
    }
}
