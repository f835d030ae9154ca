//! 固定窗口限流
//!
//! 以「key 在当前窗口内的计数」为唯一状态的共享限流原语。
//! 计数器首次写入时绑定窗口过期时间，窗口结束后自动归零。
//! 单机部署用内存后端，多实例部署用 redis 后端共享计数。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::{Result, ShortpulseError};

/// 限流判定结果
#[derive(Debug, Clone, PartialEq)]
pub enum LimitDecision {
    /// 未超限，附带窗口内当前计数
    Allowed { count: u64 },
    /// 已超限，附带建议的重试等待时间
    Exceeded { retry_after: Duration },
}

/// 窗口计数器存储
///
/// `incr` 将 key 的计数加一并返回（计数, 窗口剩余时间）。
/// 窗口在 key 首次计数时开启，之后的递增不延长窗口。
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn incr(&self, key: &str, window: Duration) -> Result<(u64, Duration)>;
}

pub struct FixedWindowLimiter {
    store: Arc<dyn CounterStore>,
}

impl FixedWindowLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// 判定 key 在当前窗口内是否超过 limit 次
    pub async fn check(&self, key: &str, limit: u64, window: Duration) -> Result<LimitDecision> {
        let (count, remaining) = self.store.incr(key, window).await?;

        if count > limit {
            debug!(key = %key, count, limit, "Rate limit exceeded");
            return Ok(LimitDecision::Exceeded {
                retry_after: remaining,
            });
        }

        Ok(LimitDecision::Allowed { count })
    }
}

/// 内存后端，进程内共享
///
/// 过期槽位除了在下次访问时重置，还会被周期性清扫，
/// 不活跃 key（换 IP 的客户端等）不会永久占用内存。
pub struct MemoryCounterStore {
    windows: DashMap<String, WindowSlot>,
    ops: AtomicU64,
}

struct WindowSlot {
    count: u64,
    expires_at: tokio::time::Instant,
}

/// 每积累这么多次递增执行一次过期清扫
const SWEEP_INTERVAL: u64 = 1024;

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            ops: AtomicU64::new(0),
        }
    }

    /// 当前保留的计数槽数量（含已过期待清扫的）
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn maybe_sweep(&self, now: tokio::time::Instant) {
        if self.ops.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.windows.retain(|_, slot| slot.expires_at > now);
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str, window: Duration) -> Result<(u64, Duration)> {
        let now = tokio::time::Instant::now();
        self.maybe_sweep(now);

        let mut slot = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| WindowSlot {
                count: 0,
                expires_at: now + window,
            });

        // 窗口已过期，重置计数并开启新窗口
        if slot.expires_at <= now {
            slot.count = 0;
            slot.expires_at = now + window;
        }

        slot.count += 1;

        Ok((slot.count, slot.expires_at - now))
    }
}

/// Redis 后端，多实例共享计数
///
/// 连接按需建立，出错时重置，下次调用重连。
pub struct RedisCounterStore {
    client: redis::Client,
    connection: Arc<RwLock<Option<redis::aio::MultiplexedConnection>>>,
    key_prefix: String,
}

impl RedisCounterStore {
    pub fn new(redis_url: &str, key_prefix: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| ShortpulseError::cache_connection(format!("invalid redis url: {e}")))?;

        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            key_prefix: key_prefix.to_string(),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        {
            let guard = self.connection.read().await;
            if let Some(conn) = guard.as_ref() {
                return Ok(conn.clone());
            }
        }

        let mut guard = self.connection.write().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                ShortpulseError::cache_connection(format!("redis connect failed: {e}"))
            })?;

        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn reset_connection(&self) {
        let mut guard = self.connection.write().await;
        *guard = None;
        warn!("Redis counter connection reset");
    }
}

/// 由 TTL 查询结果推导窗口剩余时间
///
/// `None` 表示 key 没有绑定过期时间（SET NX 与 INCR 之间
/// 出过错），调用方需要重新补挂 TTL，否则计数器永不归零。
fn window_remaining(ttl: i64, window: Duration) -> Option<Duration> {
    if ttl > 0 {
        Some(Duration::from_secs(ttl as u64).min(window))
    } else {
        None
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str, window: Duration) -> Result<(u64, Duration)> {
        let mut conn = self.get_connection().await?;
        let key = self.prefixed(key);
        let window_secs = window.as_secs() as i64;

        // 先以 NX 建立带 TTL 的计数器，再递增。TTL 在计数之前
        // 就绑定，中途失败不会留下永不过期的计数器。
        let set_result: redis::RedisResult<Option<String>> = redis::cmd("SET")
            .arg(&key)
            .arg(0u64)
            .arg("NX")
            .arg("EX")
            .arg(window_secs)
            .query_async(&mut conn)
            .await;
        if let Err(e) = set_result {
            self.reset_connection().await;
            return Err(e.into());
        }

        let count: u64 = match conn.incr(&key, 1u64).await {
            Ok(v) => v,
            Err(e) => {
                self.reset_connection().await;
                return Err(e.into());
            }
        };

        let ttl: i64 = match conn.ttl(&key).await {
            Ok(v) => v,
            Err(e) => {
                self.reset_connection().await;
                return Err(e.into());
            }
        };

        let remaining = match window_remaining(ttl, window) {
            Some(remaining) => remaining,
            None => {
                // TTL 意外缺失，补挂一个完整窗口
                warn!(key = %key, "Counter key lost its TTL, re-arming window");
                if let Err(e) = conn.expire::<_, i64>(&key, window_secs).await {
                    self.reset_connection().await;
                    return Err(e.into());
                }
                window
            }
        };

        Ok((count, remaining))
    }
}
