//! 后台任务调度
//!
//! 按固定间隔向队列投递维护任务。每类任务首次运行前等待一个
//! 完整间隔，避免启动时的负载尖峰。

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{Job, JobQueue};
use crate::config::AnalyticsConfig;

pub struct Scheduler {
    queue: JobQueue,
    config: AnalyticsConfig,
}

impl Scheduler {
    pub fn new(queue: JobQueue, config: AnalyticsConfig) -> Self {
        Self { queue, config }
    }

    /// 启动所有周期任务，返回 JoinHandle 列表
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let jobs: Vec<(u64, Job)> = vec![
            (
                self.config.aggregate_interval_secs,
                Job::AggregateClicks {
                    limit: self.config.aggregate_batch_limit,
                },
            ),
            (self.config.rollup_interval_secs, Job::RollupDaily { date: None }),
            (
                self.config.anomaly_interval_secs,
                Job::DetectAnomalies {
                    limit: self.config.anomaly_scan_limit,
                },
            ),
            (
                self.config.compact_interval_secs,
                Job::CompactEvents {
                    days_to_keep: self.config.retention_days,
                },
            ),
        ];

        let mut handles = Vec::with_capacity(jobs.len());

        for (interval_secs, job) in jobs {
            let queue = self.queue.clone();
            let interval = Duration::from_secs(interval_secs);
            let name = job.name();

            handles.push(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    if let Err(e) = queue.enqueue(job.clone()) {
                        error!("Scheduler failed to enqueue '{}': {}", name, e);
                        break;
                    }
                }
            }));

            info!(
                "Scheduled '{}' every {}s (first run delayed by one interval)",
                name, interval_secs
            );
        }

        handles
    }
}
