//! 配置管理
//!
//! 从环境变量加载配置（支持 .env 文件），使用 `SHORTPULSE__` 前缀、
//! `__` 作为层级分隔符，例如 `SHORTPULSE__CACHE__BACKEND=redis`。
//!
//! 配置在进程启动时构造一次，随后以只读方式注入各组件，
//! 不使用全局可变状态。

use serde::Deserialize;

use crate::errors::{Result, ShortpulseError};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
    pub analytics: AnalyticsConfig,
    pub limiter: LimiterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 缓存后端: "redis" | "memory" | "null"
    pub backend: String,
    pub redis_url: String,
    /// Redis key 前缀，完整 key 形如 `link:{code}`
    pub key_prefix: String,
    /// 快照 TTL（秒），命中时刷新
    pub ttl_secs: u64,
    /// memory 后端最大容量
    pub memory_max_capacity: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 每个队列的 worker 数量
    pub workers_per_queue: usize,
    /// 点击记录任务最大尝试次数
    pub max_attempts: u32,
    /// 重试退避（秒）
    pub retry_backoff_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// 单次聚合处理的最大事件数
    pub aggregate_batch_limit: usize,
    /// 聚合任务调度间隔（秒）
    pub aggregate_interval_secs: u64,
    /// 异常检测调度间隔（秒）
    pub anomaly_interval_secs: u64,
    /// 异常检测单次扫描的最大活跃链接数
    pub anomaly_scan_limit: usize,
    /// 异常检测阈值倍数
    pub anomaly_threshold: f64,
    /// 天汇总调度间隔（秒）
    pub rollup_interval_secs: u64,
    /// 清理任务调度间隔（秒）
    pub compact_interval_secs: u64,
    /// 已处理原始事件保留天数
    pub retention_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    pub enabled: bool,
    /// 单 IP 在窗口内允许的重定向请求数
    pub max_requests: u64,
    /// 窗口长度（秒）
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "plain" | "json"
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            queue: QueueConfig::default(),
            analytics: AnalyticsConfig::default(),
            limiter: LimiterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "link:".to_string(),
            ttl_secs: 3600,
            memory_max_capacity: 10_000,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers_per_queue: 2,
            max_attempts: 3,
            retry_backoff_secs: 60,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            aggregate_batch_limit: 1000,
            aggregate_interval_secs: 60,
            anomaly_interval_secs: 3600,
            anomaly_scan_limit: 100,
            anomaly_threshold: 3.0,
            rollup_interval_secs: 86_400,
            compact_interval_secs: 86_400,
            retention_days: 30,
        }
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 120,
            window_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置，缺失项使用默认值
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("SHORTPULSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ShortpulseError::validation(format!("config build failed: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| ShortpulseError::validation(format!("config deserialize failed: {e}")))
    }
}
