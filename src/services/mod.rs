//! HTTP 服务层
//!
//! actix-web handler 集合：重定向入口、统计查询与健康检查。
//! handler 只做参数提取与状态码映射，业务判断全部在 Resolver
//! 与分析组件内完成。

mod health;
mod redirect;
mod stats;

pub use health::{AppStartTime, HealthService};
pub use redirect::RedirectService;
pub use stats::StatsService;

use actix_web::HttpRequest;

/// 提取客户端 IP
///
/// 取 `X-Forwarded-For` 第一段（最初的客户端），没有该头时
/// 退回到对端地址。
pub(crate) fn client_ip(req: &HttpRequest) -> String {
    if let Some(forwarded) = req.headers().get("X-Forwarded-For") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn forwarded_header_takes_first_entry() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.9, 10.0.0.1"))
            .to_http_request();
        assert_eq!(client_ip(&req), "203.0.113.9");
    }

    #[test]
    fn missing_header_falls_back_to_peer_addr() {
        let req = TestRequest::default()
            .peer_addr("192.0.2.4:50000".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ip(&req), "192.0.2.4");
    }
}
