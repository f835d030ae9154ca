//! 点击分析管道
//!
//! 原始点击事件以 append-only 方式写入事件日志（[`recorder`]），
//! 由后台任务批量聚合为小时统计（[`aggregator`]），再滚动为天统计
//! （[`rollup`]）。异常检测（[`anomaly`]）读取小时统计对比历史基线，
//! 清理任务（[`retention`]）删除已处理的过期事件。
//!
//! 所有统计写入都通过存储层的原子 increment-upsert 完成，
//! 多个 worker 并发执行时无需应用层锁。

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod aggregator;
pub mod anomaly;
pub mod recorder;
pub mod retention;
pub mod rollup;
pub mod store;

pub use aggregator::{AggregateReport, StatsAggregator};
pub use anomaly::{AnomalyDetector, AnomalyFlag};
pub use recorder::{ClickRecorder, ClickRequest};
pub use retention::RetentionCompactor;
pub use rollup::DailyRollup;
pub use store::{ClickEventStore, MemoryClickEventStore, MemoryStatStore, StatStore};

/// 原始点击事件（append-only）
///
/// `processed` 置位后事件不可变，保留期满即可被清理。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    pub id: Uuid,
    pub link_id: i64,
    pub short_code: String,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    pub country: String,
    pub city: String,
    pub clicked_at: DateTime<Utc>,
    pub processed: bool,
}

/// 统计粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Hourly,
    Daily,
}

/// 统计行的唯一键：(link_id, date, type, hour?)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatKey {
    pub link_id: i64,
    pub date: NaiveDate,
    pub kind: StatKind,
    /// 小时桶 (0-23)，仅 hourly 统计使用
    pub hour: Option<u32>,
}

impl StatKey {
    /// 从事件时间戳推导小时统计键
    pub fn hourly(link_id: i64, ts: DateTime<Utc>) -> Self {
        Self {
            link_id,
            date: ts.date_naive(),
            kind: StatKind::Hourly,
            hour: Some(ts.hour()),
        }
    }

    pub fn hourly_at(link_id: i64, date: NaiveDate, hour: u32) -> Self {
        Self {
            link_id,
            date,
            kind: StatKind::Hourly,
            hour: Some(hour),
        }
    }

    pub fn daily(link_id: i64, date: NaiveDate) -> Self {
        Self {
            link_id,
            date,
            kind: StatKind::Daily,
            hour: None,
        }
    }
}

/// 统计行（累加器）
///
/// `click_count` 单调非负；`created_at` 仅在首次插入时设置。
#[derive(Debug, Clone)]
pub struct LinkStat {
    pub key: StatKey,
    pub short_code: String,
    pub click_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
