//! 链接解析
//!
//! 以 cache-aside 策略回答「这个 code 重定向到哪里、当前是否可访问」：
//! 先查快照缓存，未命中则回源权威仓库并回填缓存。否定结果不缓存，
//! 避免先查后建的 code 被长期遮蔽。
//!
//! 每次可访问的解析都会异步投递一条点击记录任务；投递失败时降级为
//! 同步 best-effort 写入，任何基础设施故障都不会导致重定向失败。

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::analytics::{ClickRecorder, ClickRequest};
use crate::cache::{CacheLookup, LinkCache, LinkSnapshot};
use crate::queue::{Job, JobQueue};
use crate::repository::{LinkRecord, LinkRepository};

/// 解析结论
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// 找到且可访问，执行 301 重定向
    Accessible { link_id: i64, destination: String },
    /// 找到但被封锁（已删除 / 停用 / 过期），返回 410 与原因
    Blocked { reason: String },
    /// code 无对应记录，返回 404
    NotFound,
}

/// 请求上下文，点击记录任务的来源信息
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
}

pub struct Resolver {
    cache: Arc<dyn LinkCache>,
    repository: Arc<dyn LinkRepository>,
    queue: JobQueue,
    recorder: Arc<ClickRecorder>,
}

impl Resolver {
    pub fn new(
        cache: Arc<dyn LinkCache>,
        repository: Arc<dyn LinkRepository>,
        queue: JobQueue,
        recorder: Arc<ClickRecorder>,
    ) -> Self {
        Self {
            cache,
            repository,
            queue,
            recorder,
        }
    }

    /// 解析 short code
    #[instrument(skip(self, ctx), fields(code = %code))]
    pub async fn resolve(&self, code: &str, ctx: &RequestContext) -> ResolveOutcome {
        let snapshot = match self.cache.get(code).await {
            CacheLookup::Hit(snapshot) => {
                debug!("Cache hit");
                snapshot
            }
            lookup => {
                if matches!(lookup, CacheLookup::Unavailable) {
                    warn!("Cache unavailable, falling through to repository");
                } else {
                    debug!("Cache miss");
                }

                let record = match self.repository.find_by_code(code).await {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        info!("Link not found");
                        return ResolveOutcome::NotFound;
                    }
                    Err(e) => {
                        // 仓库故障时宁可 404 也不挂起重定向路径
                        error!("Repository lookup failed: {}", e);
                        return ResolveOutcome::NotFound;
                    }
                };

                let snapshot = Self::snapshot_from(&record);
                self.cache.insert(code, snapshot.clone()).await;
                snapshot
            }
        };

        if !snapshot.is_accessible {
            info!(reason = %snapshot.reason, "Link not accessible");
            return ResolveOutcome::Blocked {
                reason: snapshot.reason,
            };
        }

        self.record_click(snapshot.id, code, ctx).await;

        ResolveOutcome::Accessible {
            link_id: snapshot.id,
            destination: snapshot.original_url,
        }
    }

    /// 删除缓存快照
    ///
    /// 链接管理侧在可访问性相关字段变更（active 标志、过期时间、
    /// 软删除、URL）时必须同步调用。
    pub async fn invalidate(&self, code: &str) {
        self.cache.remove(code).await;
        info!(code = %code, "Link cache invalidated");
    }

    /// 从权威记录推导快照
    ///
    /// 封锁原因按优先级取第一个命中的谓词：已删除 > 停用 > 过期。
    fn snapshot_from(record: &LinkRecord) -> LinkSnapshot {
        if record.is_accessible() {
            return LinkSnapshot::accessible(record.id, record.original_url.clone());
        }

        let reason = if record.is_deleted() {
            "Link has been deleted"
        } else if !record.is_active {
            "Link is disabled"
        } else {
            "Link has expired"
        };

        LinkSnapshot::blocked(record.id, record.original_url.clone(), reason.to_string())
    }

    /// 投递点击记录任务；队列不可用时同步落盘（best-effort）
    async fn record_click(&self, link_id: i64, code: &str, ctx: &RequestContext) {
        let request = ClickRequest {
            link_id,
            short_code: code.to_string(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            referer: ctx.referer.clone(),
        };

        if let Err(e) = self.queue.enqueue(Job::RecordClick(request.clone())) {
            warn!(
                "Queue not available, recording click directly: {}",
                e
            );
            if let Err(e) = self.recorder.record_click(&request).await {
                error!("Failed to record click: {}", e);
            }
        }
    }
}
