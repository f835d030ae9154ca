//! 日志初始化
//!
//! 进程启动时调用一次。日志级别优先读 `RUST_LOG`，
//! 未设置时使用配置中的 level。

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 初始化全局 tracing subscriber
///
/// 重复调用会 panic，只在 main 中调用。
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
