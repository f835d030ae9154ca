//! 分析流水线集成测试
//!
//! 覆盖原始事件 → 小时聚合 → 天汇总 → 异常检测 → 保留清理
//! 的完整路径，以及跨批次的计数收敛。

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Timelike, Utc};
use uuid::Uuid;

use shortpulse::analytics::{
    AnomalyDetector, ClickEvent, ClickEventStore, DailyRollup, MemoryClickEventStore,
    MemoryStatStore, RetentionCompactor, StatKey, StatStore, StatsAggregator,
};
use shortpulse::repository::{LinkRecord, LinkRepository, MemoryLinkRepository};

fn event(link_id: i64, code: &str, clicked_at: chrono::DateTime<Utc>) -> ClickEvent {
    ClickEvent {
        id: Uuid::nil(),
        link_id,
        short_code: code.to_string(),
        ip_address: "203.0.113.1".to_string(),
        user_agent: String::new(),
        referer: String::new(),
        country: String::new(),
        city: String::new(),
        clicked_at,
        processed: false,
    }
}

fn active_link(id: i64, code: &str) -> LinkRecord {
    LinkRecord {
        id,
        short_code: code.to_string(),
        original_url: format!("https://example.org/{code}"),
        is_active: true,
        expires_at: None,
        deleted_at: None,
    }
}

struct Pipeline {
    events: Arc<MemoryClickEventStore>,
    stats: Arc<MemoryStatStore>,
    aggregator: StatsAggregator,
    rollup: DailyRollup,
    compactor: RetentionCompactor,
}

fn pipeline() -> Pipeline {
    let events = Arc::new(MemoryClickEventStore::new());
    let stats = Arc::new(MemoryStatStore::new());

    Pipeline {
        aggregator: StatsAggregator::new(
            Arc::clone(&events) as Arc<dyn ClickEventStore>,
            Arc::clone(&stats) as Arc<dyn StatStore>,
        ),
        rollup: DailyRollup::new(Arc::clone(&stats) as Arc<dyn StatStore>),
        compactor: RetentionCompactor::new(Arc::clone(&events) as Arc<dyn ClickEventStore>),
        events,
        stats,
    }
}

fn at(date: NaiveDate, hour: u32) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(hour, 30, 0).unwrap())
}

#[tokio::test]
async fn events_flow_into_hourly_then_daily_stats() {
    let p = pipeline();
    let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();

    // 两条链接，三个小时桶
    for _ in 0..12 {
        p.events.insert(event(1, "alpha", at(date, 9))).await.unwrap();
    }
    for _ in 0..30 {
        p.events.insert(event(1, "alpha", at(date, 14))).await.unwrap();
    }
    for _ in 0..8 {
        p.events.insert(event(2, "beta", at(date, 14))).await.unwrap();
    }

    let report = p.aggregator.aggregate(1000).await.unwrap();
    assert_eq!(report.processed_count, 50);
    assert_eq!(report.buckets_updated, 3);

    let alpha_nine = p
        .stats
        .get(&StatKey::hourly_at(1, date, 9))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alpha_nine.click_count, 12);

    // 再跑一次聚合：没有未处理事件，计数不变
    let report = p.aggregator.aggregate(1000).await.unwrap();
    assert_eq!(report.processed_count, 0);

    let rolled = p.rollup.rollup(Some(date)).await.unwrap();
    assert_eq!(rolled, 2);

    let alpha_daily = p
        .stats
        .get(&StatKey::daily(1, date))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alpha_daily.click_count, 42);

    let beta_daily = p
        .stats
        .get(&StatKey::daily(2, date))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(beta_daily.click_count, 8);
}

#[tokio::test]
async fn limit_bounded_batches_converge_to_total() {
    let p = pipeline();
    let date = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();

    for _ in 0..1200 {
        p.events.insert(event(5, "bulk", at(date, 10))).await.unwrap();
    }

    let first = p.aggregator.aggregate(1000).await.unwrap();
    assert_eq!(first.processed_count, 1000);

    let second = p.aggregator.aggregate(1000).await.unwrap();
    assert_eq!(second.processed_count, 200);

    let stat = p
        .stats
        .get(&StatKey::hourly_at(5, date, 10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stat.click_count, 1200);
}

#[tokio::test]
async fn compaction_removes_only_aggregated_history() {
    let p = pipeline();
    let old = Utc::now() - Duration::days(45);

    for _ in 0..10 {
        p.events.insert(event(1, "aged", old)).await.unwrap();
    }
    p.aggregator.aggregate(100).await.unwrap();

    // 同样古老但尚未聚合的事件
    p.events.insert(event(2, "pending", old)).await.unwrap();

    let deleted = p.compactor.compact(30).await.unwrap();
    assert_eq!(deleted, 10);

    // 未处理的事件幸存，之后仍会被聚合
    assert_eq!(p.events.len(), 1);
    assert_eq!(p.events.unprocessed(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn anomaly_scan_flags_spikes_and_ignores_cold_links() {
    let stats = Arc::new(MemoryStatStore::new());
    let repo = Arc::new(MemoryLinkRepository::new());

    repo.upsert(active_link(1, "spiky"));
    repo.upsert(active_link(2, "steady"));
    repo.upsert(active_link(3, "cold"));

    let now = Utc::now();
    let hour = now.hour();
    let today = now.date_naive();

    // link 1：过去 7 天同小时均值 10，当前小时 100 → 触发
    // link 2：均值 10，当前小时 20 → 不触发（阈值 3x）
    for i in 1..=7 {
        let day = today - Duration::days(i);
        stats
            .increment(&StatKey::hourly_at(1, day, hour), "spiky", 10)
            .await
            .unwrap();
        stats
            .increment(&StatKey::hourly_at(2, day, hour), "steady", 10)
            .await
            .unwrap();
    }
    stats
        .increment(&StatKey::hourly_at(1, today, hour), "spiky", 100)
        .await
        .unwrap();
    stats
        .increment(&StatKey::hourly_at(2, today, hour), "steady", 20)
        .await
        .unwrap();
    // link 3：没有任何历史，当前小时有流量 → 零基线不触发
    stats
        .increment(&StatKey::hourly_at(3, today, hour), "cold", 50)
        .await
        .unwrap();

    let detector = AnomalyDetector::new(
        Arc::clone(&stats) as Arc<dyn StatStore>,
        Arc::clone(&repo) as Arc<dyn LinkRepository>,
        3.0,
    );

    let flags = detector.scan(100).await.unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].link_id, 1);
    assert_eq!(flags[0].current_clicks, 100);
    assert!((flags[0].baseline_avg - 10.0).abs() < f64::EPSILON);
}
