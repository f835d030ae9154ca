use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use crate::cache::{CacheLookup, LinkCache, LinkSnapshot};
use crate::config::CacheConfig;

/// 进程内链接快照缓存（moka）
///
/// 使用 time-to-idle 策略：每次读取都会重置空闲计时，
/// 与 Redis 后端"命中续期"的语义一致。
pub struct MemoryLinkCache {
    inner: Cache<String, LinkSnapshot>,
}

impl MemoryLinkCache {
    pub fn new(config: &CacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.memory_max_capacity)
            .time_to_idle(Duration::from_secs(config.ttl_secs))
            .build();

        debug!(
            "MemoryLinkCache initialized with max capacity: {}, TTL: {}s",
            config.memory_max_capacity, config.ttl_secs
        );

        Self { inner }
    }
}

#[async_trait]
impl LinkCache for MemoryLinkCache {
    async fn get(&self, code: &str) -> CacheLookup {
        match self.inner.get(code).await {
            Some(snapshot) => CacheLookup::Hit(snapshot),
            None => CacheLookup::Miss,
        }
    }

    async fn insert(&self, code: &str, snapshot: LinkSnapshot) {
        self.inner.insert(code.to_string(), snapshot).await;
    }

    async fn remove(&self, code: &str) {
        self.inner.invalidate(code).await;
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CacheConfig {
        CacheConfig {
            backend: "memory".to_string(),
            ttl_secs: 60,
            ..CacheConfig::default()
        }
    }

    #[tokio::test]
    async fn insert_get_remove_roundtrip() {
        let cache = MemoryLinkCache::new(&test_config());
        let snapshot = LinkSnapshot::accessible(1, "https://example.org/page".to_string());

        cache.insert("abc1234", snapshot.clone()).await;
        match cache.get("abc1234").await {
            CacheLookup::Hit(found) => assert_eq!(found, snapshot),
            other => panic!("expected hit, got {other:?}"),
        }

        cache.remove("abc1234").await;
        assert!(matches!(cache.get("abc1234").await, CacheLookup::Miss));
    }

    #[tokio::test]
    async fn blocked_snapshot_keeps_reason() {
        let cache = MemoryLinkCache::new(&test_config());
        let snapshot = LinkSnapshot::blocked(2, "https://example.org".to_string(), "Link is disabled".to_string());

        cache.insert("blocked1", snapshot).await;
        match cache.get("blocked1").await {
            CacheLookup::Hit(found) => {
                assert!(!found.is_accessible);
                assert_eq!(found.reason, "Link is disabled");
            }
            other => panic!("expected hit, got {other:?}"),
        }
    }
}
