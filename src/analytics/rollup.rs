//! 小时统计 → 天统计滚动
//!
//! 读取目标日期的全部小时统计，按链接求和后以累加 upsert 写入
//! 天统计行。对同一日期重复调用会重复累加，调用方（调度器）
//! 负责每个日期只触发一次。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tracing::info;

use super::{StatKey, StatStore};
use crate::errors::Result;

pub struct DailyRollup {
    stats: Arc<dyn StatStore>,
}

impl DailyRollup {
    pub fn new(stats: Arc<dyn StatStore>) -> Self {
        Self { stats }
    }

    /// 对 `date`（缺省为昨天）执行 hourly → daily 汇总，
    /// 返回写入天统计的链接数
    pub async fn rollup(&self, date: Option<NaiveDate>) -> Result<usize> {
        let target_date = date.unwrap_or_else(|| Utc::now().date_naive() - Duration::days(1));

        let hourly = self.stats.hourly_for_date(target_date).await?;

        if hourly.is_empty() {
            info!(date = %target_date, "No hourly stats to roll up");
            return Ok(0);
        }

        // 按链接求和
        let mut totals: HashMap<i64, (String, u64)> = HashMap::with_capacity(hourly.len());
        for stat in &hourly {
            let slot = totals
                .entry(stat.key.link_id)
                .or_insert_with(|| (stat.short_code.clone(), 0));
            slot.1 += stat.click_count;
        }

        let links_processed = totals.len();

        for (link_id, (short_code, total)) in &totals {
            let key = StatKey::daily(*link_id, target_date);
            self.stats.increment(&key, short_code, *total).await?;
        }

        info!(
            date = %target_date,
            links_processed,
            "Daily rollup completed"
        );

        Ok(links_processed)
    }
}
