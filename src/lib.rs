//! oxwrite - Redis缓存写协调库
//!
//! 提供带可选分布式锁的缓存写入器和键过期事件桥，
//! 支持原子put-if-absent、模式清理和键空间通知转发等功能。

#![doc(html_root_url = "https://docs.rs/oxwrite/0.1.0")]

pub use serde;
pub use tokio;

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod telemetry;
pub mod utils;

// Re-export commonly used items
pub use cache::key::{CacheKey, CacheKeyBuilder};
pub use cache::writer::CacheWriter;
pub use config::Config;
pub use error::{CacheError, Result};
pub use events::bridge::KeyExpirationBridge;
pub use events::{EventPublisher, KeyExpiredEvent};

/// oxwrite 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
