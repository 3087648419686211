//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了键过期事件桥的生命周期和投递任务。

use crate::backend::store::StoreBackend;
use crate::config::EventsConfig;
use crate::error::{CacheError, Result};
use crate::events::filter::{self, EXPIRED_CHANNEL_PATTERN};
use crate::events::EventPublisher;
use futures::StreamExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

/// 桥的生命周期状态：Created → Initialized → Destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeState {
    Created,
    Initialized,
    Destroyed,
}

struct BridgeInner {
    state: BridgeState,
    task: Option<JoinHandle<()>>,
}

/// 键过期事件桥
///
/// 订阅键空间通知的expired频道，按配置的逻辑数据库过滤，
/// 将命中的通知重新发布为应用事件。
///
/// 桥自身不产生线程语义之外的承诺：投递发生在init()启动的
/// 单个后台任务上，下游发布必须快速返回。
pub struct KeyExpirationBridge {
    client: redis::Client,
    backend: Arc<StoreBackend>,
    publisher: Arc<dyn EventPublisher>,
    database: Option<i64>,
    notify_parameter: String,
    shutdown: CancellationToken,
    inner: Mutex<BridgeInner>,
}

impl KeyExpirationBridge {
    /// 创建新的事件桥（Created状态，尚未订阅）
    ///
    /// # 参数
    ///
    /// * `backend` - 存储客户端，用于启用键空间通知和建立订阅连接
    /// * `publisher` - 事件发布者
    /// * `config` - 事件桥配置
    pub fn new(
        backend: Arc<StoreBackend>,
        publisher: Arc<dyn EventPublisher>,
        config: &EventsConfig,
    ) -> Self {
        Self {
            client: backend.raw_client(),
            backend,
            publisher,
            database: config.database,
            notify_parameter: config.notify_keyspace_events.clone(),
            shutdown: CancellationToken::new(),
            inner: Mutex::new(BridgeInner {
                state: BridgeState::Created,
                task: None,
            }),
        }
    }

    /// 桥绑定的逻辑数据库编号
    pub fn database(&self) -> Option<i64> {
        self.database
    }

    /// 初始化事件桥
    ///
    /// 确保服务端键空间通知已启用（重复调用安全），订阅expired
    /// 频道模式并启动投递任务。已初始化时调用是无操作；
    /// 销毁后调用返回错误。
    #[instrument(skip(self), level = "info")]
    pub async fn init(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            BridgeState::Initialized => return Ok(()),
            BridgeState::Destroyed => {
                return Err(CacheError::Subscription(
                    "Bridge has been destroyed".to_string(),
                ))
            }
            BridgeState::Created => {}
        }

        self.backend
            .enable_keyspace_notifications(&self.notify_parameter)
            .await?;

        #[allow(deprecated)]
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.psubscribe(EXPIRED_CHANNEL_PATTERN).await?;

        let token = self.shutdown.clone();
        let publisher = Arc::clone(&self.publisher);
        let database = self.database;
        debug!("KeyExpirationBridge: 启动投递任务，database={:?}", database);
        let handle = tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = stream.next() => {
                        let Some(msg) = msg else { break };
                        let channel = msg.get_channel_name();
                        match filter::filter_expiration(channel, msg.get_payload_bytes(), database)
                        {
                            Some(event) => {
                                // 隔离下游观察者的失败，单条消息的错误不得中断订阅
                                let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                                    publisher.publish(event)
                                }));
                                if result.is_err() {
                                    warn!("event publisher panicked; expiration event dropped");
                                }
                            }
                            None => {
                                trace!("discarded notification on channel {}", channel);
                            }
                        }
                    }
                }
            }
            debug!("KeyExpirationBridge: 投递任务已停止");
        });

        inner.task = Some(handle);
        inner.state = BridgeState::Initialized;
        Ok(())
    }

    /// 销毁事件桥
    ///
    /// 取消投递任务并等待其退出，订阅连接随任务释放。
    /// 取消之后到达传输层的通知被丢弃，不再发布任何事件。
    /// 重复调用安全；销毁后无法重新初始化。
    #[instrument(skip(self), level = "info")]
    pub async fn destroy(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == BridgeState::Destroyed {
            return Ok(());
        }

        self.shutdown.cancel();
        if let Some(handle) = inner.task.take() {
            let _ = handle.await;
        }
        inner.state = BridgeState::Destroyed;
        debug!("KeyExpirationBridge destroyed");
        Ok(())
    }
}
