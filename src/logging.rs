//! 结构化日志 (tracing)
//!
//! 进程内只初始化一次; `RUST_LOG` 优先,其次 `SENTINEL_LOG_LEVEL`,最后使用传入的级别.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT_LOGGING: OnceCell<()> = OnceCell::new();

pub fn init_logging(default_level: &str) {
    INIT_LOGGING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| {
                EnvFilter::try_new(
                    std::env::var("SENTINEL_LOG_LEVEL").unwrap_or_else(|_| default_level.into()),
                )
            })
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let stdout_layer = fmt::layer()
            .with_target(false)
            .with_thread_names(true);

        // 测试或宿主程序可能已装好订阅者
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .try_init();
    });
}
