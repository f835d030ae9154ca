//! 点击量异常检测
//!
//! 将当前小时的点击数与过去 7 天同一小时的平均值比较，
//! 超过阈值倍数即判定为 spike。基线为零时从不告警，
//! 避免新链接刚产生流量就被误报。

use std::sync::Arc;

use chrono::{Duration, Timelike, Utc};
use tracing::{debug, info};

use super::{StatKey, StatStore};
use crate::errors::Result;
use crate::repository::LinkRepository;

/// 异常判定结果（瞬态，不持久化）
#[derive(Debug, Clone)]
pub struct AnomalyFlag {
    pub link_id: i64,
    pub short_code: String,
    pub current_clicks: u64,
    pub baseline_avg: f64,
    pub threshold: f64,
}

pub struct AnomalyDetector {
    stats: Arc<dyn StatStore>,
    repository: Arc<dyn LinkRepository>,
    threshold_multiplier: f64,
}

impl AnomalyDetector {
    pub fn new(
        stats: Arc<dyn StatStore>,
        repository: Arc<dyn LinkRepository>,
        threshold_multiplier: f64,
    ) -> Self {
        Self {
            stats,
            repository,
            threshold_multiplier,
        }
    }

    /// 检测单个链接当前小时是否出现 spike
    pub async fn detect_spike(&self, link_id: i64) -> Result<bool> {
        Ok(self.evaluate(link_id, "").await?.is_some())
    }

    /// 扫描最多 `limit` 个活跃链接，返回所有触发的告警
    pub async fn scan(&self, limit: usize) -> Result<Vec<AnomalyFlag>> {
        let links = self.repository.list_active(limit).await?;
        let checked = links.len();

        let mut flags = Vec::new();
        for link in links {
            if let Some(flag) = self.evaluate(link.id, &link.short_code).await? {
                flags.push(flag);
            }
        }

        info!(
            links_checked = checked,
            anomalies_found = flags.len(),
            "Anomaly detection completed"
        );

        Ok(flags)
    }

    async fn evaluate(&self, link_id: i64, short_code: &str) -> Result<Option<AnomalyFlag>> {
        let now = Utc::now();
        let today = now.date_naive();
        let current_hour = now.hour();

        let current_clicks = self
            .stats
            .get(&StatKey::hourly_at(link_id, today, current_hour))
            .await?
            .map(|stat| stat.click_count)
            .unwrap_or(0);

        // 过去 7 天同一小时的平均值，只对存在的统计行求均值
        let mut sum = 0u64;
        let mut samples = 0u32;
        for days_back in 1..=7 {
            let day = today - Duration::days(days_back);
            if let Some(stat) = self
                .stats
                .get(&StatKey::hourly_at(link_id, day, current_hour))
                .await?
            {
                sum += stat.click_count;
                samples += 1;
            }
        }

        let baseline_avg = if samples > 0 {
            sum as f64 / samples as f64
        } else {
            0.0
        };

        // 零基线从不告警
        if baseline_avg <= 0.0 {
            return Ok(None);
        }

        if (current_clicks as f64) > baseline_avg * self.threshold_multiplier {
            debug!(
                link_id,
                current_clicks, baseline_avg, "Click spike detected"
            );
            return Ok(Some(AnomalyFlag {
                link_id,
                short_code: short_code.to_string(),
                current_clicks,
                baseline_avg,
                threshold: self.threshold_multiplier,
            }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MemoryStatStore;
    use crate::repository::{LinkRecord, MemoryLinkRepository};

    fn setup(threshold: f64) -> (Arc<MemoryStatStore>, Arc<MemoryLinkRepository>, AnomalyDetector) {
        let stats = Arc::new(MemoryStatStore::new());
        let repo = Arc::new(MemoryLinkRepository::new());
        let detector = AnomalyDetector::new(
            Arc::clone(&stats) as Arc<dyn StatStore>,
            Arc::clone(&repo) as Arc<dyn LinkRepository>,
            threshold,
        );
        (stats, repo, detector)
    }

    async fn fill_baseline(stats: &MemoryStatStore, link_id: i64, per_hour: u64) {
        let now = Utc::now();
        let hour = now.hour();
        for days_back in 1..=7 {
            let day = now.date_naive() - Duration::days(days_back);
            stats
                .increment(&StatKey::hourly_at(link_id, day, hour), "code", per_hour)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn zero_baseline_never_flags() {
        let (stats, _, detector) = setup(3.0);
        let now = Utc::now();

        // 当前小时流量巨大但没有任何历史
        stats
            .increment(
                &StatKey::hourly_at(1, now.date_naive(), now.hour()),
                "code1",
                100_000,
            )
            .await
            .unwrap();

        assert!(!detector.detect_spike(1).await.unwrap());
    }

    #[tokio::test]
    async fn spike_above_threshold_flags() {
        let (stats, _, detector) = setup(3.0);
        let now = Utc::now();

        fill_baseline(&stats, 1, 10).await;
        stats
            .increment(
                &StatKey::hourly_at(1, now.date_naive(), now.hour()),
                "code1",
                31,
            )
            .await
            .unwrap();

        // 基线 10，阈值 3.0 → 31 > 30 触发
        assert!(detector.detect_spike(1).await.unwrap());
    }

    #[tokio::test]
    async fn traffic_at_threshold_does_not_flag() {
        let (stats, _, detector) = setup(3.0);
        let now = Utc::now();

        fill_baseline(&stats, 1, 10).await;
        stats
            .increment(
                &StatKey::hourly_at(1, now.date_naive(), now.hour()),
                "code1",
                30,
            )
            .await
            .unwrap();

        assert!(!detector.detect_spike(1).await.unwrap());
    }

    #[tokio::test]
    async fn scan_reports_flagged_active_links_only() {
        let (stats, repo, detector) = setup(3.0);
        let now = Utc::now();

        repo.upsert(LinkRecord {
            id: 1,
            short_code: "spiky".to_string(),
            original_url: "https://example.org/a".to_string(),
            is_active: true,
            expires_at: None,
            deleted_at: None,
        });
        repo.upsert(LinkRecord {
            id: 2,
            short_code: "calm".to_string(),
            original_url: "https://example.org/b".to_string(),
            is_active: true,
            expires_at: None,
            deleted_at: None,
        });

        fill_baseline(&stats, 1, 5).await;
        fill_baseline(&stats, 2, 5).await;
        stats
            .increment(
                &StatKey::hourly_at(1, now.date_naive(), now.hour()),
                "spiky",
                100,
            )
            .await
            .unwrap();

        let flags = detector.scan(100).await.unwrap();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].link_id, 1);
        assert_eq!(flags[0].short_code, "spiky");
        assert_eq!(flags[0].current_clicks, 100);
        assert!((flags[0].baseline_avg - 5.0).abs() < f64::EPSILON);
    }
}
