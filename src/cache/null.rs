use async_trait::async_trait;

use crate::cache::{CacheLookup, LinkCache, LinkSnapshot};

/// 空缓存实现：所有查询都回源
///
/// 用于禁用缓存的部署以及测试降级路径。
pub struct NullLinkCache;

#[async_trait]
impl LinkCache for NullLinkCache {
    async fn get(&self, _code: &str) -> CacheLookup {
        CacheLookup::Miss
    }

    async fn insert(&self, _code: &str, _snapshot: LinkSnapshot) {}

    async fn remove(&self, _code: &str) {}

    fn backend_name(&self) -> &'static str {
        "null"
    }
}
