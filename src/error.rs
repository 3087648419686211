//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存写协调库的错误类型和处理机制。

use thiserror::Error;

/// 缓存系统错误类型枚举
///
/// 定义了缓存写入器和过期事件桥中可能发生的各种错误类型
#[derive(Error, Debug)]
pub enum CacheError {
    /// 参数错误，在任何存储交互之前同步失败
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 数据访问错误
    ///
    /// 所有来自存储客户端的传输/协议失败统一归入此类，原始错误作为来源保留
    #[error("Data access error: {0}")]
    DataAccess(#[from] redis::RedisError),

    /// 超时错误
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// 订阅生命周期错误
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// 缓存操作结果类型别名
///
/// 简化错误处理，所有缓存操作都返回此类型
pub type Result<T> = std::result::Result<T, CacheError>;
