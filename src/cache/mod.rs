//! 链接快照缓存
//!
//! 缓存 short code → LinkSnapshot 的映射，供 Resolver 以 cache-aside
//! 方式读取。快照是权威记录的派生副本，TTL 过期或显式失效后重新回填。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::errors::Result;

pub mod memory;
pub mod null;
pub mod redis;
mod traits;

pub use traits::{CacheLookup, LinkCache};

/// 链接快照（缓存值）
///
/// 权威记录某一时刻的只读副本。`reason` 在可访问时为空字符串。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub id: i64,
    pub original_url: String,
    pub is_accessible: bool,
    pub reason: String,
}

impl LinkSnapshot {
    pub fn accessible(id: i64, original_url: String) -> Self {
        Self {
            id,
            original_url,
            is_accessible: true,
            reason: String::new(),
        }
    }

    pub fn blocked(id: i64, original_url: String, reason: String) -> Self {
        Self {
            id,
            original_url,
            is_accessible: false,
            reason,
        }
    }
}

pub struct CacheFactory;

impl CacheFactory {
    /// 根据配置创建缓存后端
    pub fn create(config: &CacheConfig) -> Result<Arc<dyn LinkCache>> {
        let boxed: Box<dyn LinkCache> = match config.backend.as_str() {
            "redis" => Box::new(redis::RedisLinkCache::new(config)?),
            "null" => Box::new(null::NullLinkCache),
            _ => Box::new(memory::MemoryLinkCache::new(config)),
        };

        Ok(Arc::from(boxed))
    }
}
