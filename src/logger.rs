//! 日志初始化
//!
//! `RUST_LOG` 优先；没设置时默认 info，详细模式下 debug。

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化全局日志，重复调用时忽略
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},chromiumoxide=warn", default_level)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
