use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};
use tokio::sync::RwLock;
use tracing::{debug, error, trace};

use crate::cache::{CacheLookup, LinkCache, LinkSnapshot};
use crate::config::CacheConfig;
use crate::errors::{Result, ShortpulseError};

/// Redis 链接快照缓存
///
/// 每个 code 对应一个 hash（字段 id / original_url / is_accessible / reason），
/// 写入和命中都会设置 / 刷新 TTL。
pub struct RedisLinkCache {
    client: redis::Client,
    /// 持久化连接，使用 RwLock 保护
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    key_prefix: String,
    ttl: i64,
}

impl RedisLinkCache {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| ShortpulseError::cache_connection(format!("invalid redis url: {e}")))?;

        debug!(
            "RedisLinkCache created with prefix: '{}', TTL: {}s",
            config.key_prefix, config.ttl_secs
        );

        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            key_prefix: config.key_prefix.clone(),
            ttl: config.ttl_secs as i64,
        })
    }

    /// 获取或建立持久连接
    async fn get_connection(&self) -> std::result::Result<MultiplexedConnection, redis::RedisError> {
        // 首先尝试读取现有连接
        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        // 需要建立新连接
        let mut conn_guard = self.connection.write().await;

        // 双重检查，避免竞态条件
        if let Some(ref conn) = *conn_guard {
            return Ok(conn.clone());
        }

        let new_conn = self.client.get_multiplexed_async_connection().await?;
        *conn_guard = Some(new_conn.clone());
        debug!("Redis connection established and cached");

        Ok(new_conn)
    }

    /// 重置连接（在连接错误时调用）
    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
        debug!("Redis connection reset due to error");
    }

    fn make_key(&self, code: &str) -> String {
        format!("{}{}", self.key_prefix, code)
    }

    fn parse_snapshot(fields: &HashMap<String, String>) -> Option<LinkSnapshot> {
        let id = fields.get("id")?.parse::<i64>().ok()?;
        let original_url = fields.get("original_url")?.clone();
        let is_accessible = fields.get("is_accessible").map(|v| v == "true")?;
        let reason = fields.get("reason").cloned().unwrap_or_default();

        Some(LinkSnapshot {
            id,
            original_url,
            is_accessible,
            reason,
        })
    }
}

#[async_trait]
impl LinkCache for RedisLinkCache {
    async fn get(&self, code: &str) -> CacheLookup {
        let redis_key = self.make_key(code);

        let mut conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to get Redis connection: {}", e);
                self.reset_connection().await;
                return CacheLookup::Unavailable;
            }
        };

        let result: redis::RedisResult<HashMap<String, String>> = conn.hgetall(&redis_key).await;

        match result {
            Ok(fields) if fields.is_empty() => {
                trace!("Cache miss for code: {}", code);
                CacheLookup::Miss
            }
            Ok(fields) => match Self::parse_snapshot(&fields) {
                Some(snapshot) => {
                    // 命中即续期
                    if let Err(e) = conn.expire::<_, i64>(&redis_key, self.ttl).await {
                        error!("Failed to refresh TTL for '{}': {}", code, e);
                    }
                    trace!("Cache hit for code: {}", code);
                    CacheLookup::Hit(snapshot)
                }
                None => {
                    error!("Malformed cache entry for code '{}', dropping it", code);
                    let _: redis::RedisResult<i64> = conn.del(&redis_key).await;
                    CacheLookup::Miss
                }
            },
            Err(e) => {
                error!("Failed to read cache for '{}': {}", code, e);
                self.reset_connection().await;
                CacheLookup::Unavailable
            }
        }
    }

    async fn insert(&self, code: &str, snapshot: LinkSnapshot) {
        let redis_key = self.make_key(code);

        let mut conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to get Redis connection: {}", e);
                self.reset_connection().await;
                return;
            }
        };

        let fields = [
            ("id", snapshot.id.to_string()),
            ("original_url", snapshot.original_url.clone()),
            ("is_accessible", snapshot.is_accessible.to_string()),
            ("reason", snapshot.reason.clone()),
        ];

        match conn.hset_multiple::<_, _, _, ()>(&redis_key, &fields).await {
            Ok(_) => {
                if let Err(e) = conn.expire::<_, i64>(&redis_key, self.ttl).await {
                    error!("Failed to set TTL for '{}': {}", code, e);
                }
                trace!("Snapshot cached for code: {}", code);
            }
            Err(e) => {
                error!("Failed to cache snapshot for '{}': {}", code, e);
                self.reset_connection().await;
            }
        }
    }

    async fn remove(&self, code: &str) {
        let redis_key = self.make_key(code);

        let mut conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to get Redis connection: {}", e);
                self.reset_connection().await;
                return;
            }
        };

        match conn.del::<_, i64>(&redis_key).await {
            Ok(deleted) => {
                if deleted > 0 {
                    debug!("Cache invalidated for code: {}", code);
                } else {
                    trace!("No cache entry to invalidate for code: {}", code);
                }
            }
            Err(e) => {
                error!("Failed to invalidate cache for '{}': {}", code, e);
                self.reset_connection().await;
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
