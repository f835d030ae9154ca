//! 重定向入口
//!
//! `GET /r/{code}`：可访问返回 301 + Location，未知 code 返回 404，
//! 被封锁返回 410 与原因。限流超限返回 429 + Retry-After。
//! 限流器故障时放行，重定向路径不因基础设施问题中断。

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::{debug, instrument, warn};

use crate::config::LimiterConfig;
use crate::limiter::{FixedWindowLimiter, LimitDecision};
use crate::resolver::{RequestContext, ResolveOutcome, Resolver};

use super::client_ip;

pub struct RedirectService;

impl RedirectService {
    #[instrument(skip_all, fields(code = %path))]
    pub async fn handle_redirect(
        path: web::Path<String>,
        req: HttpRequest,
        resolver: web::Data<Arc<Resolver>>,
        limiter: web::Data<Arc<FixedWindowLimiter>>,
        limiter_config: web::Data<LimiterConfig>,
    ) -> impl Responder {
        let code = path.into_inner();
        let ip = client_ip(&req);

        if limiter_config.enabled {
            if let Some(response) = Self::check_limit(&limiter, &limiter_config, &ip).await {
                return response;
            }
        }

        let ctx = RequestContext {
            ip_address: ip,
            user_agent: Self::header(&req, "User-Agent"),
            referer: Self::header(&req, "Referer"),
        };

        match resolver.resolve(&code, &ctx).await {
            ResolveOutcome::Accessible { destination, .. } => {
                HttpResponse::build(StatusCode::MOVED_PERMANENTLY)
                    .insert_header(("Location", destination))
                    .finish()
            }
            ResolveOutcome::Blocked { reason } => {
                debug!(reason = %reason, "Redirect blocked");
                HttpResponse::build(StatusCode::GONE)
                    .insert_header(("Content-Type", "text/plain; charset=utf-8"))
                    .body(reason)
            }
            ResolveOutcome::NotFound => {
                debug!("Redirect link not found");
                HttpResponse::build(StatusCode::NOT_FOUND)
                    .insert_header(("Content-Type", "text/plain; charset=utf-8"))
                    .insert_header(("Cache-Control", "public, max-age=60"))
                    .body("Not Found")
            }
        }
    }

    /// 超限时返回 429 响应，放行时返回 None
    async fn check_limit(
        limiter: &FixedWindowLimiter,
        config: &LimiterConfig,
        ip: &str,
    ) -> Option<HttpResponse> {
        let key = format!("redirect:{ip}");
        let window = Duration::from_secs(config.window_secs);

        match limiter.check(&key, config.max_requests, window).await {
            Ok(LimitDecision::Allowed { .. }) => None,
            Ok(LimitDecision::Exceeded { retry_after }) => Some(
                HttpResponse::build(StatusCode::TOO_MANY_REQUESTS)
                    .insert_header(("Retry-After", retry_after.as_secs().to_string()))
                    .finish(),
            ),
            Err(e) => {
                // 限流器故障放行
                warn!("Rate limiter unavailable, allowing request: {}", e);
                None
            }
        }
    }

    fn header(req: &HttpRequest, name: &str) -> String {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}
