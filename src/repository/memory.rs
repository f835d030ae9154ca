use async_trait::async_trait;
use dashmap::DashMap;

use super::{LinkRecord, LinkRepository};
use crate::errors::Result;

/// 内存链接仓库
///
/// 以 short code 为 key 的并发映射，作为默认实现和测试替身。
/// 生产部署中权威仓库由链接管理子系统提供。
#[derive(Default)]
pub struct MemoryLinkRepository {
    links: DashMap<String, LinkRecord>,
}

impl MemoryLinkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, record: LinkRecord) {
        self.links.insert(record.short_code.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[async_trait]
impl LinkRepository for MemoryLinkRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<LinkRecord>> {
        Ok(self.links.get(code).map(|entry| entry.value().clone()))
    }

    async fn list_active(&self, limit: usize) -> Result<Vec<LinkRecord>> {
        let mut active: Vec<LinkRecord> = self
            .links
            .iter()
            .filter(|entry| entry.value().is_accessible())
            .map(|entry| entry.value().clone())
            .collect();

        // 稳定顺序，便于分批扫描
        active.sort_by_key(|record| record.id);
        active.truncate(limit);

        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(id: i64, code: &str) -> LinkRecord {
        LinkRecord {
            id,
            short_code: code.to_string(),
            original_url: format!("https://example.org/{code}"),
            is_active: true,
            expires_at: None,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn find_by_code_returns_record() {
        let repo = MemoryLinkRepository::new();
        repo.upsert(record(1, "abc1234"));

        let found = repo.find_by_code("abc1234").await.unwrap().unwrap();
        assert_eq!(found.id, 1);
        assert!(repo.find_by_code("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_active_skips_blocked_links() {
        let repo = MemoryLinkRepository::new();
        repo.upsert(record(1, "ok"));

        let mut disabled = record(2, "disabled");
        disabled.is_active = false;
        repo.upsert(disabled);

        let mut expired = record(3, "expired");
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        repo.upsert(expired);

        let mut deleted = record(4, "deleted");
        deleted.deleted_at = Some(Utc::now());
        repo.upsert(deleted);

        let active = repo.list_active(100).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].short_code, "ok");
    }

    #[tokio::test]
    async fn list_active_respects_limit() {
        let repo = MemoryLinkRepository::new();
        for i in 0..10 {
            repo.upsert(record(i, &format!("code{i}")));
        }

        assert_eq!(repo.list_active(3).await.unwrap().len(), 3);
    }
}
