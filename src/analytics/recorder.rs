//! 点击事件写入
//!
//! 将单次点击以 `processed=false` 追加到事件日志。本层不做去重：
//! at-least-once 队列的重复投递由聚合层的幂等累加消化。

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::{ClickEvent, ClickEventStore};
use crate::errors::Result;

/// 点击记录请求（队列任务的负载）
#[derive(Debug, Clone)]
pub struct ClickRequest {
    pub link_id: i64,
    pub short_code: String,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
}

pub struct ClickRecorder {
    events: Arc<dyn ClickEventStore>,
}

impl ClickRecorder {
    pub fn new(events: Arc<dyn ClickEventStore>) -> Self {
        Self { events }
    }

    /// 追加一条原始点击事件，返回事件 id
    ///
    /// `clicked_at` 为写入时刻。对同一链接并发调用是安全的。
    pub async fn record_click(&self, request: &ClickRequest) -> Result<Uuid> {
        let event = ClickEvent {
            id: Uuid::nil(),
            link_id: request.link_id,
            short_code: request.short_code.clone(),
            ip_address: request.ip_address.clone(),
            user_agent: request.user_agent.clone(),
            referer: request.referer.clone(),
            country: String::new(),
            city: String::new(),
            clicked_at: Utc::now(),
            processed: false,
        };

        let event_id = self.events.insert(event).await?;

        info!(
            link_id = request.link_id,
            short_code = %request.short_code,
            event_id = %event_id,
            "Click event recorded"
        );

        Ok(event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MemoryClickEventStore;

    fn request(link_id: i64) -> ClickRequest {
        ClickRequest {
            link_id,
            short_code: format!("code{link_id}"),
            ip_address: "198.51.100.2".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            referer: "https://example.net".to_string(),
        }
    }

    #[tokio::test]
    async fn record_click_appends_unprocessed_event() {
        let store = Arc::new(MemoryClickEventStore::new());
        let recorder = ClickRecorder::new(Arc::clone(&store) as Arc<dyn ClickEventStore>);

        let event_id = recorder.record_click(&request(1)).await.unwrap();
        assert!(!event_id.is_nil());

        let pending = store.unprocessed(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].link_id, 1);
        assert!(!pending[0].processed);
    }

    #[tokio::test]
    async fn duplicate_deliveries_produce_distinct_events() {
        // at-least-once 投递下同一点击可能写入两次，本层不去重
        let store = Arc::new(MemoryClickEventStore::new());
        let recorder = ClickRecorder::new(Arc::clone(&store) as Arc<dyn ClickEventStore>);

        let first = recorder.record_click(&request(1)).await.unwrap();
        let second = recorder.record_click(&request(1)).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
    }
}
