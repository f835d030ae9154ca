//! 分析存储接口与内存实现
//!
//! 事件日志与统计表通过 trait 注入，存储引擎内部不在本 crate 范围内。
//! 内存实现依赖 DashMap 的 entry API 提供原子 increment-upsert，
//! 这是并发聚合 worker 之间唯一的同步手段。

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{ClickEvent, LinkStat, StatKey, StatKind};
use crate::errors::Result;

/// 原始点击事件日志
#[async_trait]
pub trait ClickEventStore: Send + Sync {
    /// 追加一条事件，返回存储分配的 id
    async fn insert(&self, event: ClickEvent) -> Result<Uuid>;

    /// 按 clicked_at 升序返回最多 `limit` 条未处理事件
    async fn unprocessed(&self, limit: usize) -> Result<Vec<ClickEvent>>;

    /// 批量标记事件为已处理，返回实际修改的条数
    async fn mark_processed(&self, ids: &[Uuid]) -> Result<u64>;

    /// 删除 `processed=true` 且早于 cutoff 的事件，返回删除条数。
    /// 未处理事件无论多旧都不删除。
    async fn delete_processed_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// 统计某链接在时间区间内的点击数
    async fn count_for_link(
        &self,
        link_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64>;

    /// 某链接最近的点击事件，按 clicked_at 降序
    async fn recent_for_link(&self, link_id: i64, limit: usize) -> Result<Vec<ClickEvent>>;
}

/// 统计表（hourly/daily 累加器）
#[async_trait]
pub trait StatStore: Send + Sync {
    /// 幂等 increment-upsert：对 key 累加 `by`，刷新 short_code 与
    /// updated_at，created_at 仅在首次插入时设置
    async fn increment(&self, key: &StatKey, short_code: &str, by: u64) -> Result<()>;

    async fn get(&self, key: &StatKey) -> Result<Option<LinkStat>>;

    /// 某日期的全部小时统计行（所有链接），供天汇总使用
    async fn hourly_for_date(&self, date: NaiveDate) -> Result<Vec<LinkStat>>;

    /// 某链接某日期的小时统计行，按 hour 升序
    async fn hourly_for_link(&self, link_id: i64, date: NaiveDate) -> Result<Vec<LinkStat>>;

    /// 某链接最近 N 天的天统计行，按 date 降序
    async fn daily_for_link(&self, link_id: i64, days: u32) -> Result<Vec<LinkStat>>;

    /// 最近 N 天点击量最高的链接：(link_id, short_code, total_clicks)
    async fn top_links(&self, limit: usize, days: u32) -> Result<Vec<(i64, String, u64)>>;

    /// 最近 N 天按小时桶汇总的全站点击量，下标即小时 (0-23)
    async fn hourly_heatmap(&self, days: u32) -> Result<Vec<u64>>;
}

/// 内存事件日志
///
/// 单个写锁保护的 Vec，追加即有序（按插入时间），
/// 读取时仍按 clicked_at 排序以容忍乱序投递。
#[derive(Default)]
pub struct MemoryClickEventStore {
    events: RwLock<Vec<ClickEvent>>,
}

impl MemoryClickEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl ClickEventStore for MemoryClickEventStore {
    async fn insert(&self, mut event: ClickEvent) -> Result<Uuid> {
        if event.id.is_nil() {
            event.id = Uuid::new_v4();
        }
        let id = event.id;
        self.events.write().push(event);
        Ok(id)
    }

    async fn unprocessed(&self, limit: usize) -> Result<Vec<ClickEvent>> {
        let events = self.events.read();
        let mut pending: Vec<ClickEvent> = events
            .iter()
            .filter(|event| !event.processed)
            .cloned()
            .collect();
        drop(events);

        // oldest-first，限制单批大小以约束延迟
        pending.sort_by_key(|event| event.clicked_at);
        pending.truncate(limit);

        Ok(pending)
    }

    async fn mark_processed(&self, ids: &[Uuid]) -> Result<u64> {
        let id_set: HashSet<&Uuid> = ids.iter().collect();
        let mut events = self.events.write();

        let mut modified = 0u64;
        for event in events.iter_mut() {
            if !event.processed && id_set.contains(&event.id) {
                event.processed = true;
                modified += 1;
            }
        }

        Ok(modified)
    }

    async fn delete_processed_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|event| !(event.processed && event.clicked_at < cutoff));
        Ok((before - events.len()) as u64)
    }

    async fn count_for_link(
        &self,
        link_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        let events = self.events.read();
        Ok(events
            .iter()
            .filter(|event| {
                event.link_id == link_id && event.clicked_at >= start && event.clicked_at < end
            })
            .count() as u64)
    }

    async fn recent_for_link(&self, link_id: i64, limit: usize) -> Result<Vec<ClickEvent>> {
        let events = self.events.read();
        let mut matched: Vec<ClickEvent> = events
            .iter()
            .filter(|event| event.link_id == link_id)
            .cloned()
            .collect();
        drop(events);

        matched.sort_by(|a, b| b.clicked_at.cmp(&a.clicked_at));
        matched.truncate(limit);

        Ok(matched)
    }
}

/// 内存统计表
#[derive(Default)]
pub struct MemoryStatStore {
    stats: DashMap<StatKey, LinkStat>,
}

impl MemoryStatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatStore for MemoryStatStore {
    async fn increment(&self, key: &StatKey, short_code: &str, by: u64) -> Result<()> {
        let now = Utc::now();

        self.stats
            .entry(key.clone())
            .and_modify(|stat| {
                stat.click_count += by;
                stat.short_code = short_code.to_string();
                stat.updated_at = now;
            })
            .or_insert_with(|| LinkStat {
                key: key.clone(),
                short_code: short_code.to_string(),
                click_count: by,
                created_at: now,
                updated_at: now,
            });

        Ok(())
    }

    async fn get(&self, key: &StatKey) -> Result<Option<LinkStat>> {
        Ok(self.stats.get(key).map(|entry| entry.value().clone()))
    }

    async fn hourly_for_date(&self, date: NaiveDate) -> Result<Vec<LinkStat>> {
        Ok(self
            .stats
            .iter()
            .filter(|entry| {
                let key = &entry.key();
                key.kind == StatKind::Hourly && key.date == date
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn hourly_for_link(&self, link_id: i64, date: NaiveDate) -> Result<Vec<LinkStat>> {
        let mut rows: Vec<LinkStat> = self
            .stats
            .iter()
            .filter(|entry| {
                let key = &entry.key();
                key.kind == StatKind::Hourly && key.link_id == link_id && key.date == date
            })
            .map(|entry| entry.value().clone())
            .collect();

        rows.sort_by_key(|stat| stat.key.hour);
        Ok(rows)
    }

    async fn daily_for_link(&self, link_id: i64, days: u32) -> Result<Vec<LinkStat>> {
        let start = Utc::now().date_naive() - chrono::Duration::days(days as i64);

        let mut rows: Vec<LinkStat> = self
            .stats
            .iter()
            .filter(|entry| {
                let key = &entry.key();
                key.kind == StatKind::Daily && key.link_id == link_id && key.date >= start
            })
            .map(|entry| entry.value().clone())
            .collect();

        rows.sort_by(|a, b| b.key.date.cmp(&a.key.date));
        Ok(rows)
    }

    async fn top_links(&self, limit: usize, days: u32) -> Result<Vec<(i64, String, u64)>> {
        let start = Utc::now().date_naive() - chrono::Duration::days(days as i64);

        let mut totals: std::collections::HashMap<i64, (String, u64)> =
            std::collections::HashMap::new();

        for entry in self.stats.iter() {
            let key = entry.key();
            if key.kind == StatKind::Daily && key.date >= start {
                let stat = entry.value();
                let slot = totals
                    .entry(key.link_id)
                    .or_insert_with(|| (stat.short_code.clone(), 0));
                slot.1 += stat.click_count;
            }
        }

        let mut ranked: Vec<(i64, String, u64)> = totals
            .into_iter()
            .map(|(link_id, (code, total))| (link_id, code, total))
            .collect();
        ranked.sort_by(|a, b| b.2.cmp(&a.2));
        ranked.truncate(limit);

        Ok(ranked)
    }

    async fn hourly_heatmap(&self, days: u32) -> Result<Vec<u64>> {
        let start = Utc::now().date_naive() - chrono::Duration::days(days as i64);

        let mut totals = vec![0u64; 24];
        for entry in self.stats.iter() {
            let key = entry.key();
            if key.kind == StatKind::Hourly && key.date >= start {
                if let Some(hour) = key.hour {
                    totals[hour as usize] += entry.value().click_count;
                }
            }
        }

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn event(link_id: i64, clicked_at: DateTime<Utc>) -> ClickEvent {
        ClickEvent {
            id: Uuid::nil(),
            link_id,
            short_code: format!("code{link_id}"),
            ip_address: "203.0.113.7".to_string(),
            user_agent: String::new(),
            referer: String::new(),
            country: String::new(),
            city: String::new(),
            clicked_at,
            processed: false,
        }
    }

    #[tokio::test]
    async fn unprocessed_returns_oldest_first() {
        let store = MemoryClickEventStore::new();
        let now = Utc::now();

        // 乱序插入
        store.insert(event(1, now)).await.unwrap();
        store.insert(event(1, now - Duration::hours(2))).await.unwrap();
        store.insert(event(1, now - Duration::hours(1))).await.unwrap();

        let batch = store.unprocessed(10).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch[0].clicked_at <= batch[1].clicked_at);
        assert!(batch[1].clicked_at <= batch[2].clicked_at);
    }

    #[tokio::test]
    async fn mark_processed_excludes_events_from_next_batch() {
        let store = MemoryClickEventStore::new();
        let now = Utc::now();

        let id = store.insert(event(1, now)).await.unwrap();
        store.insert(event(2, now)).await.unwrap();

        let modified = store.mark_processed(&[id]).await.unwrap();
        assert_eq!(modified, 1);

        let pending = store.unprocessed(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].link_id, 2);
    }

    #[tokio::test]
    async fn delete_processed_before_spares_unprocessed_events() {
        let store = MemoryClickEventStore::new();
        let old = Utc::now() - Duration::days(60);

        let processed_id = store.insert(event(1, old)).await.unwrap();
        store.insert(event(2, old)).await.unwrap(); // 未处理，同样过期
        store.mark_processed(&[processed_id]).await.unwrap();

        let deleted = store
            .delete_processed_before(Utc::now() - Duration::days(30))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.unprocessed(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn increment_sets_created_at_once_and_accumulates() {
        let store = MemoryStatStore::new();
        let key = StatKey::hourly(7, Utc::now());

        store.increment(&key, "code7", 3).await.unwrap();
        let first = store.get(&key).await.unwrap().unwrap();

        store.increment(&key, "code7", 2).await.unwrap();
        let second = store.get(&key).await.unwrap().unwrap();

        assert_eq!(second.click_count, 5);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn heatmap_sums_hours_across_links_and_days() {
        let store = MemoryStatStore::new();
        let today = Utc::now().date_naive();

        // 两条链接、两天，都落在 9 点和 14 点
        for (link_id, day, hour, count) in [
            (1i64, 0i64, 9u32, 5u64),
            (1, 1, 9, 7),
            (2, 0, 9, 3),
            (2, 1, 14, 10),
        ] {
            let date = today - chrono::Duration::days(day);
            store
                .increment(&StatKey::hourly_at(link_id, date, hour), "code", count)
                .await
                .unwrap();
        }
        // 窗口之外的行不计入
        store
            .increment(
                &StatKey::hourly_at(1, today - chrono::Duration::days(30), 9),
                "code",
                100,
            )
            .await
            .unwrap();

        let heatmap = store.hourly_heatmap(7).await.unwrap();
        assert_eq!(heatmap.len(), 24);
        assert_eq!(heatmap[9], 15);
        assert_eq!(heatmap[14], 10);
        assert_eq!(heatmap.iter().sum::<u64>(), 25);
    }

    #[tokio::test]
    async fn concurrent_increments_do_not_lose_counts() {
        let store = Arc::new(MemoryStatStore::new());
        let key = StatKey::hourly(1, Utc::now());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..500 {
                    store.increment(&key, "code1", 1).await.unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let stat = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stat.click_count, 8 * 500);
    }
}
