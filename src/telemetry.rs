//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块提供日志订阅器的初始化辅助函数。

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 初始化 tracing 订阅器
///
/// 使用 RUST_LOG 环境变量，未设置时回退到给定的默认过滤指令。
/// 重复调用是安全的；宿主应用已设置全局订阅器时此函数不生效。
///
/// # 参数
///
/// * `default_directive` - 默认过滤指令（例如 "oxwrite=debug"）
pub fn init_tracing(default_directive: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .ok();
    });
}
