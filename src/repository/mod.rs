//! 链接仓库（权威数据源）
//!
//! 链接的 CRUD 归链接管理子系统所有，本 crate 只依赖两个读操作：
//! 按 code 查询、按活跃状态列举（供异常检测批量扫描）。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

pub mod memory;

pub use memory::MemoryLinkRepository;

/// 权威链接记录
#[derive(Debug, Clone)]
pub struct LinkRecord {
    pub id: i64,
    pub short_code: String,
    pub original_url: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LinkRecord {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() > expires_at,
            None => false,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_accessible(&self) -> bool {
        self.is_active && !self.is_expired() && !self.is_deleted()
    }
}

#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// 按 short code 查询权威记录
    async fn find_by_code(&self, code: &str) -> Result<Option<LinkRecord>>;

    /// 列举活跃链接（active、未删除、未过期），最多 `limit` 条
    async fn list_active(&self, limit: usize) -> Result<Vec<LinkRecord>>;
}
