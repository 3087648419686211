//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了写入器使用的服务端脚本常量。
//!
//! 脚本以版本化常量的形式维护，核心控制流只传递不解释其内容。
//! 修改任何脚本语义时必须递增 `SCRIPT_REVISION`。

/// 脚本资源的修订号
pub const SCRIPT_REVISION: u32 = 1;

/// 原子put-if-absent脚本
///
/// KEYS[1] = 缓存键, ARGV[1] = 值, ARGV[2] = 是否设置过期("true"/"false"),
/// ARGV[3] = 过期毫秒数。写入成功返回nil，键已存在时返回现有值。
pub const PUT_IF_ABSENT: &str = r#"
if redis.call('SETNX', KEYS[1], ARGV[1]) == 1 then
  if ARGV[2] == 'true' then
    redis.call('PEXPIRE', KEYS[1], ARGV[3])
  end
  return nil
else
  return redis.call('GET', KEYS[1])
end
"#;

/// 原子模式清理脚本
///
/// ARGV[1] = glob模式。枚举和删除在单次脚本调用内完成，
/// 消除枚举与删除之间的并发写入窗口。返回删除的键数量。
pub const CLEAN: &str = r#"
local keys = redis.call('KEYS', ARGV[1])
if #keys > 0 then
  return redis.call('DEL', unpack(keys))
end
return 0
"#;

/// 锁释放脚本
///
/// KEYS[1] = 锁键, ARGV[1] = 持有者令牌。
/// 仅当令牌匹配时删除，防止误释放后继持有者的锁。返回1表示已释放。
pub const UNLOCK: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;
