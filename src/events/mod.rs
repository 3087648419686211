//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了键过期事件桥，将键空间通知转换为应用事件。

pub mod bridge;
pub mod filter;

use tokio::sync::broadcast;

/// 键过期事件
///
/// 载荷为过期键的原始字节；事件发出后即完成生命周期
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExpiredEvent {
    key: Vec<u8>,
    database: Option<i64>,
}

impl KeyExpiredEvent {
    pub fn new(key: Vec<u8>, database: Option<i64>) -> Self {
        Self { key, database }
    }

    /// 过期键的原始字节
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// 过期发生的逻辑数据库编号（频道名可解析时）
    pub fn database(&self) -> Option<i64> {
        self.database
    }
}

/// 事件发布者特征
///
/// 由宿主应用实现，fire-and-forget语义。
/// 在事件桥的投递任务上同步调用，不得长时间阻塞。
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: KeyExpiredEvent);
}

impl EventPublisher for broadcast::Sender<KeyExpiredEvent> {
    fn publish(&self, event: KeyExpiredEvent) {
        // 没有接收者时发送失败不是错误
        let _ = self.send(event);
    }
}
