//! 可观测性：日志初始化
//!
//! 默认 info，可通过 RUST_LOG 覆盖（如 `RUST_LOG=text2sql=debug`）。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    init_with_default("info");
}

/// 以给定默认级别初始化；重复调用时静默忽略（测试中多次初始化）
pub fn init_with_default(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
