//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存写协调库的配置结构和解析逻辑。

use crate::error::{CacheError, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// 存储连接配置
///
/// 定义远程存储（Redis）的连接相关配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct StoreConfig {
    /// 连接字符串
    pub connection_string: SecretString,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 命令执行超时时间（毫秒）
    pub command_timeout_ms: u64,
    /// Redis 密码（可选，使用 SecretString 保护）
    pub password: Option<SecretString>,
    /// 是否启用 TLS
    pub enable_tls: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection_string: SecretString::new("redis://localhost:6379".to_string().into()),
            connection_timeout_ms: 5000,
            command_timeout_ms: 3000,
            password: None,
            enable_tls: false,
        }
    }
}

/// 缓存写入器配置
///
/// 锁模式是写入器级别的固定设置，不是每次调用的选择
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct WriterConfig {
    /// 缓存键前缀（可选）
    pub key_prefix: Option<String>,
    /// 是否启用锁模式
    pub locking: bool,
    /// 锁获取重试间隔（毫秒），仅在锁模式下生效
    pub lock_sleep_ms: u64,
    /// 锁键的过期时间（毫秒），锁模式下必须显式配置
    pub lock_ttl_ms: Option<u64>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            key_prefix: None,
            locking: false,
            lock_sleep_ms: 50,
            lock_ttl_ms: None,
        }
    }
}

/// 过期事件桥配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct EventsConfig {
    /// 监听的逻辑数据库编号，None表示监听所有数据库
    pub database: Option<i64>,
    /// 服务端 notify-keyspace-events 参数为空时写入的值
    pub notify_keyspace_events: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            database: None,
            notify_keyspace_events: "EA".to_string(),
        }
    }
}

impl Config {
    /// 从TOML文件加载配置
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 返回解析后的配置或错误
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CacheError::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有必需的字段都已设置，并且值在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        if self.store.connection_timeout_ms == 0 {
            return Err("store.connection_timeout_ms cannot be zero".to_string());
        }

        if self.store.command_timeout_ms == 0 {
            return Err("store.command_timeout_ms cannot be zero".to_string());
        }

        if self.writer.locking {
            if self.writer.lock_sleep_ms == 0 {
                return Err("writer.lock_sleep_ms cannot be zero in locking mode".to_string());
            }
            match self.writer.lock_ttl_ms {
                None => {
                    return Err(
                        "writer.lock_ttl_ms must be set in locking mode; a lock key without \
                         an expiration is never released by a crashed holder"
                            .to_string(),
                    )
                }
                Some(0) => return Err("writer.lock_ttl_ms cannot be zero".to_string()),
                Some(_) => {}
            }
        }

        if let Some(db) = self.events.database {
            if db < 0 {
                return Err(format!("events.database cannot be negative (got {})", db));
            }
        }

        if self.events.notify_keyspace_events.is_empty() {
            return Err("events.notify_keyspace_events cannot be empty".to_string());
        }

        Ok(())
    }
}
