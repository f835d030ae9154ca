//! 任务分发
//!
//! 将队列任务分发到对应的分析组件。存储类故障归为可重试，
//! 数据类错误（校验失败等）归为致命错误直接丢弃。

use std::sync::Arc;

use async_trait::async_trait;

use super::{Job, JobError, JobHandler};
use crate::analytics::{
    AnomalyDetector, ClickRecorder, DailyRollup, RetentionCompactor, StatsAggregator,
};
use crate::errors::ShortpulseError;

pub struct JobRunner {
    recorder: Arc<ClickRecorder>,
    aggregator: Arc<StatsAggregator>,
    rollup: Arc<DailyRollup>,
    detector: Arc<AnomalyDetector>,
    compactor: Arc<RetentionCompactor>,
}

impl JobRunner {
    pub fn new(
        recorder: Arc<ClickRecorder>,
        aggregator: Arc<StatsAggregator>,
        rollup: Arc<DailyRollup>,
        detector: Arc<AnomalyDetector>,
        compactor: Arc<RetentionCompactor>,
    ) -> Self {
        Self {
            recorder,
            aggregator,
            rollup,
            detector,
            compactor,
        }
    }

    fn classify(err: ShortpulseError) -> JobError {
        match err {
            ShortpulseError::Validation(_)
            | ShortpulseError::NotFound(_)
            | ShortpulseError::Serialization(_)
            | ShortpulseError::DateParse(_) => JobError::fatal(err),
            _ => JobError::retryable(err),
        }
    }
}

#[async_trait]
impl JobHandler for JobRunner {
    async fn run(&self, job: &Job) -> Result<(), JobError> {
        match job {
            Job::RecordClick(request) => {
                self.recorder
                    .record_click(request)
                    .await
                    .map(|_| ())
                    .map_err(Self::classify)?;
            }
            Job::AggregateClicks { limit } => {
                self.aggregator
                    .aggregate(*limit)
                    .await
                    .map(|_| ())
                    .map_err(Self::classify)?;
            }
            Job::RollupDaily { date } => {
                self.rollup
                    .rollup(*date)
                    .await
                    .map(|_| ())
                    .map_err(Self::classify)?;
            }
            Job::DetectAnomalies { limit } => {
                self.detector
                    .scan(*limit)
                    .await
                    .map(|_| ())
                    .map_err(Self::classify)?;
            }
            Job::CompactEvents { days_to_keep } => {
                self.compactor
                    .compact(*days_to_keep)
                    .await
                    .map(|_| ())
                    .map_err(Self::classify)?;
            }
        }

        Ok(())
    }
}
