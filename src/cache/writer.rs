//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存写入器，支持非锁和锁两种写协调模式。

use crate::backend::store::StoreBackend;
use crate::cache::key::CacheKey;
use crate::cache::scripts;
use crate::config::WriterConfig;
use crate::error::{CacheError, Result};
use crate::utils::redaction::redact_cache_key;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// 锁键后缀，锁键 = 区域名 + 后缀
const LOCK_SUFFIX: &str = "~lock";

/// 缓存写入器
///
/// 代表缓存抽象对远程存储执行读写删除操作。
/// 模式在构建时固定：非锁模式追求最大吞吐，多步操作之间可能交叠；
/// 锁模式通过存储端锁键串行化需要临界区的操作（put_if_absent、clean）。
#[derive(Debug, Clone)]
pub struct CacheWriter {
    backend: Arc<StoreBackend>,
    sleep_time: Duration,
    lock_ttl: Option<Duration>,
}

impl CacheWriter {
    /// 创建非锁模式的写入器
    pub fn non_locking(backend: Arc<StoreBackend>) -> Self {
        Self {
            backend,
            sleep_time: Duration::ZERO,
            lock_ttl: None,
        }
    }

    /// 创建锁模式的写入器
    ///
    /// # 参数
    ///
    /// * `backend` - 存储客户端
    /// * `sleep_time` - 锁获取重试间隔，必须为正
    /// * `lock_ttl` - 锁键过期时间，必须为正；持有者崩溃后锁最多保留此时长
    ///
    /// # 返回值
    ///
    /// 返回锁模式写入器或配置错误
    pub fn locking(
        backend: Arc<StoreBackend>,
        sleep_time: Duration,
        lock_ttl: Duration,
    ) -> Result<Self> {
        if sleep_time.is_zero() {
            return Err(CacheError::Configuration(
                "sleep_time must be positive in locking mode".to_string(),
            ));
        }
        if lock_ttl.is_zero() {
            return Err(CacheError::Configuration(
                "lock_ttl must be positive; a lock key without an expiration is never \
                 released by a crashed holder"
                    .to_string(),
            ));
        }
        Ok(Self {
            backend,
            sleep_time,
            lock_ttl: Some(lock_ttl),
        })
    }

    /// 根据配置创建写入器
    pub fn from_config(backend: Arc<StoreBackend>, config: &WriterConfig) -> Result<Self> {
        if config.locking {
            let lock_ttl_ms = config.lock_ttl_ms.ok_or_else(|| {
                CacheError::Configuration(
                    "writer.lock_ttl_ms must be set in locking mode".to_string(),
                )
            })?;
            Self::locking(
                backend,
                Duration::from_millis(config.lock_sleep_ms),
                Duration::from_millis(lock_ttl_ms),
            )
        } else {
            Ok(Self::non_locking(backend))
        }
    }

    /// 写入器是否使用锁
    pub fn is_locking(&self) -> bool {
        !self.sleep_time.is_zero()
    }

    /// 无条件写入缓存值
    ///
    /// `ttl` 为正时附带毫秒级过期时间，否则永不过期。
    /// 覆盖键上已有的任何值。
    #[instrument(skip(self, key, value, ttl), level = "debug", fields(value_len = value.len()))]
    pub async fn put(
        &self,
        name: &str,
        key: &CacheKey,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<()> {
        validate_name(name)?;
        validate_key_bytes(key.key_bytes())?;

        debug!("put: name={}, key={}", name, key_display(key));
        match effective_ttl_millis(ttl) {
            Some(ttl_ms) => self.backend.set_px(key.key_bytes(), value, ttl_ms).await,
            None => self.backend.set(key.key_bytes(), value).await,
        }
    }

    /// 读取缓存值，键不存在时返回None
    #[instrument(skip(self, key), level = "debug")]
    pub async fn get(&self, name: &str, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        validate_name(name)?;
        validate_key_bytes(key.key_bytes())?;

        self.backend.get(key.key_bytes()).await
    }

    /// 仅当键不存在时原子写入
    ///
    /// 存在性检查与写入在单次服务端脚本中完成，不存在两次往返之间的
    /// 部分失败窗口。锁模式下额外受区域锁保护。
    ///
    /// # 返回值
    ///
    /// 本调用完成写入时返回None；键已存在时返回现有值且键保持不变
    #[instrument(skip(self, key, value, ttl), level = "debug", fields(value_len = value.len()))]
    pub async fn put_if_absent(
        &self,
        name: &str,
        key: &CacheKey,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<Option<Vec<u8>>> {
        validate_name(name)?;
        validate_key_bytes(key.key_bytes())?;

        debug!("put_if_absent: name={}, key={}", name, key_display(key));
        if self.is_locking() {
            let token = self.acquire_lock(name).await?;
            let result = self.put_if_absent_script(key, value, ttl).await;
            let released = self.release_lock(name, &token).await;
            let previous = result?;
            released?;
            Ok(previous)
        } else {
            self.put_if_absent_script(key, value, ttl).await
        }
    }

    async fn put_if_absent_script(
        &self,
        key: &CacheKey,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<Option<Vec<u8>>> {
        let ttl_ms = effective_ttl_millis(ttl);
        let script = redis::Script::new(scripts::PUT_IF_ABSENT);
        self.backend
            .eval(
                &script,
                &[key.key_bytes()],
                &[
                    value.to_vec(),
                    ttl_ms.is_some().to_string().into_bytes(),
                    ttl_ms.unwrap_or(0).to_string().into_bytes(),
                ],
            )
            .await
    }

    /// 无条件删除缓存值，键不存在时不报错
    #[instrument(skip(self, key), level = "debug")]
    pub async fn remove(&self, name: &str, key: &CacheKey) -> Result<()> {
        validate_name(name)?;
        validate_key_bytes(key.key_bytes())?;

        let removed = self.backend.del(key.key_bytes()).await?;
        debug!(
            "remove: name={}, key={}, removed={}",
            name,
            key_display(key),
            removed
        );
        Ok(())
    }

    /// 删除区域内匹配glob模式的所有键
    ///
    /// 非锁模式：SCAN枚举后批量删除，枚举与删除之间并发写入的
    /// 新键可能存活（已接受的竞争窗口）。
    /// 锁模式：持有区域锁，枚举和删除在单次服务端脚本内原子完成。
    #[instrument(skip(self, pattern), level = "debug")]
    pub async fn clean(&self, name: &str, pattern: &[u8]) -> Result<()> {
        validate_name(name)?;
        if pattern.is_empty() {
            return Err(CacheError::InvalidArgument(
                "Pattern must not be empty".to_string(),
            ));
        }

        if self.is_locking() {
            let token = self.acquire_lock(name).await?;
            let result: Result<i64> = self
                .backend
                .eval(&redis::Script::new(scripts::CLEAN), &[], &[pattern.to_vec()])
                .await;
            let released = self.release_lock(name, &token).await;
            let removed = result?;
            released?;
            debug!("clean: name={}, removed={} keys", name, removed);
        } else {
            let keys = self.backend.scan_keys(pattern).await?;
            if !keys.is_empty() {
                let removed = self.backend.del_batch(&keys).await?;
                debug!("clean: name={}, removed={} keys", name, removed);
            }
        }
        Ok(())
    }

    fn lock_key(name: &str) -> Vec<u8> {
        format!("{}{}", name, LOCK_SUFFIX).into_bytes()
    }

    /// 获取区域锁
    ///
    /// 使用 SET NX PX 循环尝试，每次失败后休眠重试间隔。
    /// 前任持有者崩溃时，等待以其锁TTL为上界。
    #[instrument(skip(self), level = "debug")]
    async fn acquire_lock(&self, name: &str) -> Result<String> {
        let lock_ttl = self
            .lock_ttl
            .ok_or_else(|| CacheError::Configuration("Lock TTL is not configured".to_string()))?;
        let lock_key = Self::lock_key(name);
        let token = Uuid::new_v4().to_string();
        let ttl_ms = lock_ttl.as_millis() as u64;

        loop {
            if self
                .backend
                .set_nx_px(&lock_key, token.as_bytes(), ttl_ms)
                .await?
            {
                debug!("lock acquired: name={}, token={}", name, token);
                return Ok(token);
            }
            sleep(self.sleep_time).await;
        }
    }

    /// 释放区域锁
    ///
    /// 通过脚本校验持有者令牌后删除，令牌不匹配时不删除
    #[instrument(skip(self, token), level = "debug")]
    async fn release_lock(&self, name: &str, token: &str) -> Result<()> {
        let lock_key = Self::lock_key(name);
        let released: i64 = self
            .backend
            .eval(
                &redis::Script::new(scripts::UNLOCK),
                &[lock_key.as_slice()],
                &[token.as_bytes().to_vec()],
            )
            .await?;
        if released == 0 {
            warn!("lock for region {} expired before release", name);
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CacheError::InvalidArgument(
            "Name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_key_bytes(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidArgument(
            "Key must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn effective_ttl_millis(ttl: Option<Duration>) -> Option<u64> {
    match ttl {
        Some(d) if !d.is_zero() => Some(d.as_millis() as u64),
        _ => None,
    }
}

fn key_display(key: &CacheKey) -> String {
    redact_cache_key(&String::from_utf8_lossy(key.key_bytes()))
}
