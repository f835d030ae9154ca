//! 进程内任务队列
//!
//! at-least-once 语义的异步工作队列：点击记录与异常检测走
//! analytics 队列，聚合 / 滚动 / 清理走 aggregation 队列，
//! 两者独立消费、独立扩容。
//!
//! 重试不依赖栈展开：worker 根据 [`JobError`] 的类别和显式的
//! 尝试计数决定重新入队还是丢弃。点击记录任务最多尝试
//! `max_attempts` 次（参考值 3），失败后记录日志并丢弃。
//! 点击欠计数是可接受的降级结果，不会反馈为重定向失败。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analytics::ClickRequest;
use crate::config::QueueConfig;
use crate::errors::{Result, ShortpulseError};

pub mod runner;
pub mod scheduler;

pub use runner::JobRunner;
pub use scheduler::Scheduler;

/// 队列任务
#[derive(Debug, Clone)]
pub enum Job {
    RecordClick(ClickRequest),
    AggregateClicks { limit: usize },
    RollupDaily { date: Option<NaiveDate> },
    DetectAnomalies { limit: usize },
    CompactEvents { days_to_keep: i64 },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::RecordClick(_) => "record_click",
            Job::AggregateClicks { .. } => "aggregate_clicks",
            Job::RollupDaily { .. } => "rollup_daily",
            Job::DetectAnomalies { .. } => "detect_anomalies",
            Job::CompactEvents { .. } => "compact_events",
        }
    }

    /// 任务路由：点击记录和异常检测走 analytics 队列，其余走 aggregation
    pub fn route(&self) -> QueueName {
        match self {
            Job::RecordClick(_) | Job::DetectAnomalies { .. } => QueueName::Analytics,
            _ => QueueName::Aggregation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueName {
    Analytics,
    Aggregation,
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueName::Analytics => write!(f, "analytics"),
            QueueName::Aggregation => write!(f, "aggregation"),
        }
    }
}

/// 任务执行错误
///
/// worker 对 `Retryable` 在尝试次数内重新入队，对 `Fatal` 立即丢弃。
#[derive(Debug)]
pub enum JobError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

impl JobError {
    pub fn retryable<E: Into<anyhow::Error>>(err: E) -> Self {
        JobError::Retryable(err.into())
    }

    pub fn fatal<E: Into<anyhow::Error>>(err: E) -> Self {
        JobError::Fatal(err.into())
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::Retryable(e) => write!(f, "retryable: {e}"),
            JobError::Fatal(e) => write!(f, "fatal: {e}"),
        }
    }
}

/// 任务处理器接口，由 [`JobRunner`] 实现
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &Job) -> std::result::Result<(), JobError>;
}

/// 重试策略：固定次数上限 + 固定退避
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: Duration::from_secs(config.retry_backoff_secs),
        }
    }
}

#[derive(Debug)]
struct QueuedJob {
    job: Job,
    attempt: u32,
}

/// 任务队列的生产端（可克隆，发送端共享）
#[derive(Clone)]
pub struct JobQueue {
    analytics_tx: mpsc::UnboundedSender<QueuedJob>,
    aggregation_tx: mpsc::UnboundedSender<QueuedJob>,
}

/// 任务队列的消费端，交给 [`WorkerPool`] 持有
pub struct QueueReceivers {
    analytics_rx: mpsc::UnboundedReceiver<QueuedJob>,
    aggregation_rx: mpsc::UnboundedReceiver<QueuedJob>,
}

impl JobQueue {
    pub fn new() -> (Self, QueueReceivers) {
        let (analytics_tx, analytics_rx) = mpsc::unbounded_channel();
        let (aggregation_tx, aggregation_rx) = mpsc::unbounded_channel();

        (
            Self {
                analytics_tx,
                aggregation_tx,
            },
            QueueReceivers {
                analytics_rx,
                aggregation_rx,
            },
        )
    }

    /// 投递任务（首次尝试）
    pub fn enqueue(&self, job: Job) -> Result<()> {
        self.push(QueuedJob { job, attempt: 1 })
    }

    fn push(&self, queued: QueuedJob) -> Result<()> {
        let route = queued.job.route();
        let sender = match route {
            QueueName::Analytics => &self.analytics_tx,
            QueueName::Aggregation => &self.aggregation_tx,
        };

        sender.send(queued).map_err(|e| {
            ShortpulseError::queue_closed(format!("{route} queue closed: {}", e.0.job.name()))
        })
    }
}

/// worker 池：每个队列 N 个消费者
pub struct WorkerPool;

impl WorkerPool {
    /// 启动所有 worker，返回其 JoinHandle 列表
    pub fn spawn(
        queue: JobQueue,
        receivers: QueueReceivers,
        handler: Arc<dyn JobHandler>,
        policy: RetryPolicy,
        workers_per_queue: usize,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(workers_per_queue * 2);

        let analytics_rx = Arc::new(Mutex::new(receivers.analytics_rx));
        let aggregation_rx = Arc::new(Mutex::new(receivers.aggregation_rx));

        for (name, rx) in [
            (QueueName::Analytics, analytics_rx),
            (QueueName::Aggregation, aggregation_rx),
        ] {
            for worker_id in 0..workers_per_queue {
                let rx = Arc::clone(&rx);
                let handler = Arc::clone(&handler);
                let queue = queue.clone();

                handles.push(tokio::spawn(async move {
                    debug!("Worker {}/{} started", name, worker_id);
                    loop {
                        let queued = {
                            let mut guard = rx.lock().await;
                            guard.recv().await
                        };

                        let queued = match queued {
                            Some(queued) => queued,
                            None => {
                                debug!("Worker {}/{} shutting down, queue closed", name, worker_id);
                                break;
                            }
                        };

                        Self::process(&queue, handler.as_ref(), policy, queued).await;
                    }
                }));
            }
        }

        info!(
            "Worker pool started: {} workers per queue (analytics + aggregation)",
            workers_per_queue
        );

        handles
    }

    async fn process(
        queue: &JobQueue,
        handler: &dyn JobHandler,
        policy: RetryPolicy,
        queued: QueuedJob,
    ) {
        let job_name = queued.job.name();

        match handler.run(&queued.job).await {
            Ok(()) => {
                debug!(
                    "Job '{}' completed (attempt {}/{})",
                    job_name, queued.attempt, policy.max_attempts
                );
            }
            Err(JobError::Fatal(e)) => {
                error!("Job '{}' failed fatally, dropping: {}", job_name, e);
            }
            Err(JobError::Retryable(e)) if queued.attempt < policy.max_attempts => {
                warn!(
                    "Job '{}' failed (attempt {}/{}): {}; retrying in {:?}",
                    job_name, queued.attempt, policy.max_attempts, e, policy.backoff
                );

                let queue = queue.clone();
                let next = QueuedJob {
                    job: queued.job,
                    attempt: queued.attempt + 1,
                };
                tokio::spawn(async move {
                    tokio::time::sleep(policy.backoff).await;
                    if let Err(e) = queue.push(next) {
                        error!("Failed to requeue job: {}", e);
                    }
                });
            }
            Err(JobError::Retryable(e)) => {
                error!(
                    "Job '{}' failed after {} attempts, dropping: {}",
                    job_name, queued.attempt, e
                );
            }
        }
    }
}
