//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了过期通知的纯过滤逻辑，独立于投递机制，可离线测试。

use crate::events::KeyExpiredEvent;

/// 过期事件频道的订阅模式
pub const EXPIRED_CHANNEL_PATTERN: &str = "__keyevent@*__:expired";

const CHANNEL_PREFIX: &str = "__keyevent@";
const CHANNEL_SUFFIX: &str = "__:expired";

/// 从频道名解析逻辑数据库编号
///
/// 频道格式为 `__keyevent@<db>__:expired`；格式不符或编号
/// 不是纯数字时返回None
pub fn parse_database(channel: &str) -> Option<i64> {
    let rest = channel.strip_prefix(CHANNEL_PREFIX)?;
    let digits = rest.strip_suffix(CHANNEL_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// 过滤一条过期通知
///
/// # 参数
///
/// * `channel` - 通知的频道名
/// * `payload` - 通知载荷（过期键的原始字节）
/// * `database` - 桥绑定的数据库编号，None表示监听所有数据库
///
/// # 返回值
///
/// 通知被接受时返回事件，否则返回None（静默丢弃，不报错）
pub fn filter_expiration(
    channel: &str,
    payload: &[u8],
    database: Option<i64>,
) -> Option<KeyExpiredEvent> {
    let source_db = parse_database(channel);
    match database {
        Some(bound) => {
            let db = source_db?;
            if db != bound {
                return None;
            }
            Some(KeyExpiredEvent::new(payload.to_vec(), Some(db)))
        }
        None => {
            if !channel.starts_with(CHANNEL_PREFIX) || !channel.ends_with(CHANNEL_SUFFIX) {
                return None;
            }
            Some(KeyExpiredEvent::new(payload.to_vec(), source_db))
        }
    }
}
