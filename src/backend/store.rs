//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了字节级存储客户端，封装对Redis的原始命令访问。

use crate::backend::redis_provider::{DefaultRedisProvider, RedisProvider};
use crate::config::StoreConfig;
use crate::error::{CacheError, Result};
use redis::{aio::ConnectionManager, Client};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, instrument};

/// 字节级存储客户端
///
/// 每次调用克隆共享的连接管理器，调用之间不持有连接。
/// 所有传输失败统一映射为数据访问错误。
#[derive(Clone)]
pub struct StoreBackend {
    client: Client,
    manager: ConnectionManager,
    command_timeout_ms: u64,
}

impl std::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBackend")
            .field("command_timeout_ms", &self.command_timeout_ms)
            .finish()
    }
}

impl StoreBackend {
    /// 创建新的存储客户端实例
    ///
    /// # 参数
    ///
    /// * `config` - 存储连接配置
    ///
    /// # 返回值
    ///
    /// 返回新的StoreBackend实例或错误
    #[instrument(skip(config), level = "info", name = "init_store_backend")]
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        Self::new_with_provider(config, Arc::new(DefaultRedisProvider)).await
    }

    /// 使用指定的Redis提供者创建新的存储客户端实例
    ///
    /// # 参数
    ///
    /// * `config` - 存储连接配置
    /// * `provider` - Redis提供者
    ///
    /// # 返回值
    ///
    /// 返回新的StoreBackend实例或错误
    #[instrument(skip(config, provider), level = "info")]
    pub async fn new_with_provider(
        config: &StoreConfig,
        provider: Arc<dyn RedisProvider>,
    ) -> Result<Self> {
        let (client, manager) = provider.get_client(config).await?;
        Ok(StoreBackend {
            client,
            manager,
            command_timeout_ms: config.command_timeout_ms,
        })
    }

    /// 获取命令超时时间（毫秒）
    pub fn command_timeout_ms(&self) -> u64 {
        self.command_timeout_ms
    }

    /// 获取原始Redis客户端
    ///
    /// 事件桥使用它建立独立的订阅连接
    pub fn raw_client(&self) -> Client {
        self.client.clone()
    }

    async fn run<T>(&self, fut: impl Future<Output = redis::RedisResult<T>>) -> Result<T> {
        match timeout(Duration::from_millis(self.command_timeout_ms), fut).await {
            Ok(res) => res.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(format!(
                "Command timed out after {}ms",
                self.command_timeout_ms
            ))),
        }
    }

    /// 获取键对应的值，键不存在时返回None
    #[instrument(skip(self, key), level = "debug")]
    pub async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        self.run(async move { redis::cmd("GET").arg(key).query_async(&mut conn).await })
            .await
    }

    /// 无条件设置键值，不带过期时间
    #[instrument(skip(self, key, value), level = "debug", fields(value_len = value.len()))]
    pub async fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut conn = self.manager.clone();
        self.run(async move {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    /// 设置键值并附带毫秒级过期时间
    #[instrument(skip(self, key, value), level = "debug", fields(value_len = value.len()))]
    pub async fn set_px(&self, key: &[u8], value: &[u8], ttl_ms: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        self.run(async move {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(ttl_ms)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    /// 仅当键不存在时设置值，附带毫秒级过期时间
    ///
    /// 使用 SET NX PX 实现，是锁键的获取原语
    ///
    /// # 返回值
    ///
    /// 返回是否设置成功
    #[instrument(skip(self, key, value), level = "debug")]
    pub async fn set_nx_px(&self, key: &[u8], value: &[u8], ttl_ms: u64) -> Result<bool> {
        let mut conn = self.manager.clone();
        let result: Option<String> = self
            .run(async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_ms)
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(result.is_some())
    }

    /// 删除单个键
    ///
    /// # 返回值
    ///
    /// 返回删除的键数量，键不存在时为0
    #[instrument(skip(self, key), level = "debug")]
    pub async fn del(&self, key: &[u8]) -> Result<u64> {
        let mut conn = self.manager.clone();
        self.run(async move { redis::cmd("DEL").arg(key).query_async(&mut conn).await })
            .await
    }

    /// 批量删除键
    ///
    /// # 参数
    ///
    /// * `keys` - 要删除的键向量
    ///
    /// # 返回值
    ///
    /// 返回删除的键数量
    #[instrument(skip(self, keys), level = "debug", fields(key_count = keys.len()))]
    pub async fn del_batch(&self, keys: &[Vec<u8>]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key.as_slice());
        }
        let mut conn = self.manager.clone();
        self.run(async move { cmd.query_async(&mut conn).await })
            .await
    }

    /// 检查键是否存在
    #[instrument(skip(self, key), level = "debug")]
    pub async fn exists(&self, key: &[u8]) -> Result<bool> {
        let mut conn = self.manager.clone();
        self.run(async move { redis::cmd("EXISTS").arg(key).query_async(&mut conn).await })
            .await
    }

    /// 执行服务端脚本
    ///
    /// # 参数
    ///
    /// * `script` - 要执行的脚本
    /// * `keys` - KEYS参数
    /// * `args` - ARGV参数
    ///
    /// # 返回值
    ///
    /// 返回脚本的执行结果
    #[instrument(skip(self, script, keys, args), level = "debug")]
    pub async fn eval<T: redis::FromRedisValue + Send>(
        &self,
        script: &redis::Script,
        keys: &[&[u8]],
        args: &[Vec<u8>],
    ) -> Result<T> {
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(arg.as_slice());
        }
        let mut conn = self.manager.clone();
        self.run(async move { invocation.invoke_async(&mut conn).await })
            .await
    }

    /// 枚举匹配模式的所有键
    ///
    /// 使用 SCAN 游标遍历，不阻塞服务端
    ///
    /// # 参数
    ///
    /// * `pattern` - glob模式
    ///
    /// # 返回值
    ///
    /// 返回匹配的键向量
    #[instrument(skip(self, pattern), level = "debug")]
    pub async fn scan_keys(&self, pattern: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let mut conn = self.manager.clone();
            let (next_cursor, batch): (u64, Vec<Vec<u8>>) = self
                .run(async move {
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(1000)
                        .query_async(&mut conn)
                        .await
                })
                .await?;

            keys.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        debug!("SCAN matched {} keys", keys.len());
        Ok(keys)
    }

    /// 确保服务端键空间通知已启用
    ///
    /// 仅当 notify-keyspace-events 当前为空时写入给定参数，
    /// 已有配置保持不变，重复调用是安全的
    #[instrument(skip(self), level = "debug")]
    pub async fn enable_keyspace_notifications(&self, parameter: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let current: HashMap<String, String> = self
            .run(async move {
                redis::cmd("CONFIG")
                    .arg("GET")
                    .arg("notify-keyspace-events")
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        let current_value = current
            .get("notify-keyspace-events")
            .cloned()
            .unwrap_or_default();

        if current_value.is_empty() {
            debug!("Enabling keyspace notifications: {}", parameter);
            let mut conn = self.manager.clone();
            self.run(async move {
                redis::cmd("CONFIG")
                    .arg("SET")
                    .arg("notify-keyspace-events")
                    .arg(parameter)
                    .query_async::<()>(&mut conn)
                    .await
            })
            .await?;
        } else {
            debug!(
                "Keyspace notifications already configured: {}",
                current_value
            );
        }
        Ok(())
    }

    /// 检查连接是否正常
    #[instrument(skip(self), level = "debug")]
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: String = self
            .run(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }
}
