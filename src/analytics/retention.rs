//! 原始事件保留清理
//!
//! 删除保留期之外且已聚合（processed=true）的原始点击事件。
//! 未处理事件不受年龄限制，保证聚合器在删除前至少见到每条事件一次。

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use super::ClickEventStore;
use crate::errors::Result;

pub struct RetentionCompactor {
    events: Arc<dyn ClickEventStore>,
}

impl RetentionCompactor {
    pub fn new(events: Arc<dyn ClickEventStore>) -> Self {
        Self { events }
    }

    /// 删除 `processed=true` 且 clicked_at 早于 `now - days_to_keep` 的事件，
    /// 返回删除条数
    pub async fn compact(&self, days_to_keep: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(days_to_keep);

        let deleted = self.events.delete_processed_before(cutoff).await?;

        info!(
            deleted_count = deleted,
            cutoff = %cutoff,
            "Click events compacted"
        );

        Ok(deleted)
    }
}
