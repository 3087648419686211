//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存区域键的构建逻辑。

/// 缓存区域键
///
/// 有效存储键为 `前缀 ++ 键元素`（配置了非空前缀时），否则为键元素本身。
/// 构建后不可变，仅其字节形式被发送到存储端。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    key_bytes: Vec<u8>,
    has_prefix: bool,
}

impl CacheKey {
    /// 创建键构建器
    ///
    /// # 参数
    ///
    /// * `element` - 键元素的字节表示
    pub fn builder(element: impl Into<Vec<u8>>) -> CacheKeyBuilder {
        CacheKeyBuilder {
            element: element.into(),
            prefix: None,
        }
    }

    /// 获取键的字节表示（含前缀）
    pub fn key_bytes(&self) -> &[u8] {
        &self.key_bytes
    }

    /// 是否带有非空前缀
    pub fn has_prefix(&self) -> bool {
        self.has_prefix
    }
}

/// 缓存区域键构建器
///
/// 前缀是构建器级别的静态事实，不是每次调用的选择
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    element: Vec<u8>,
    prefix: Option<Vec<u8>>,
}

impl CacheKeyBuilder {
    /// 设置键前缀
    ///
    /// 空前缀等同于无前缀
    pub fn use_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// 构建不可变的缓存键
    pub fn build(self) -> CacheKey {
        match self.prefix {
            Some(prefix) if !prefix.is_empty() => {
                let mut key_bytes = Vec::with_capacity(prefix.len() + self.element.len());
                key_bytes.extend_from_slice(&prefix);
                key_bytes.extend_from_slice(&self.element);
                CacheKey {
                    key_bytes,
                    has_prefix: true,
                }
            }
            _ => CacheKey {
                key_bytes: self.element,
                has_prefix: false,
            },
        }
    }
}
