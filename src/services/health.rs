//! 健康检查

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, trace};

use crate::cache::LinkCache;
use crate::repository::LinkRepository;

/// 应用启动时间，随 app data 注入
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: DateTime<Utc>,
}

pub struct HealthService;

impl HealthService {
    pub async fn health_check(
        repository: web::Data<Arc<dyn LinkRepository>>,
        cache: web::Data<Arc<dyn LinkCache>>,
        app_start_time: web::Data<AppStartTime>,
    ) -> impl Responder {
        trace!("Received health check request");

        let repository_status =
            match tokio::time::timeout(Duration::from_secs(5), repository.list_active(1)).await {
                Ok(Ok(_)) => json!({ "status": "healthy" }),
                Ok(Err(e)) => {
                    error!("Repository health check failed: {}", e);
                    json!({ "status": "unhealthy", "error": e.to_string() })
                }
                Err(_) => {
                    error!("Repository health check timeout");
                    json!({ "status": "unhealthy", "error": "timeout" })
                }
            };

        let now = Utc::now();
        let uptime_seconds = (now - app_start_time.start_datetime).num_seconds().max(0) as u64;
        let is_healthy = repository_status["status"] == "healthy";

        let body = json!({
            "status": if is_healthy { "healthy" } else { "unhealthy" },
            "timestamp": now.to_rfc3339(),
            "uptime": uptime_seconds,
            "repository": repository_status,
            "cache_backend": cache.backend_name(),
        });

        if is_healthy {
            HttpResponse::Ok().json(body)
        } else {
            HttpResponse::ServiceUnavailable().json(body)
        }
    }
}
