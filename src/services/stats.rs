//! 统计查询接口
//!
//! 读取聚合表与原始事件日志，供管理面板使用。
//! 小时/天统计来自汇总表，最近点击来自原始日志。

use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::analytics::{ClickEventStore, StatStore};

#[derive(Debug, Deserialize)]
pub struct HourlyQuery {
    /// "%Y-%m-%d"，缺省为今天
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    /// 统计最近多少小时内的原始点击，缺省 24
    pub hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub limit: Option<usize>,
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct HeatmapQuery {
    pub days: Option<u32>,
}

pub struct StatsService;

impl StatsService {
    /// GET /api/links/{id}/stats/hourly?date=YYYY-MM-DD
    pub async fn hourly(
        path: web::Path<i64>,
        query: web::Query<HourlyQuery>,
        stats: web::Data<Arc<dyn StatStore>>,
    ) -> impl Responder {
        let link_id = path.into_inner();

        let date = match &query.date {
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) => date,
                Err(_) => {
                    return HttpResponse::BadRequest().json(json!({
                        "error": "invalid date, expected YYYY-MM-DD"
                    }));
                }
            },
            None => Utc::now().date_naive(),
        };

        match stats.hourly_for_link(link_id, date).await {
            Ok(rows) => {
                let hours: Vec<_> = rows
                    .iter()
                    .map(|stat| {
                        json!({
                            "hour": stat.key.hour,
                            "clicks": stat.click_count,
                        })
                    })
                    .collect();

                HttpResponse::Ok().json(json!({
                    "link_id": link_id,
                    "date": date.format("%Y-%m-%d").to_string(),
                    "hours": hours,
                }))
            }
            Err(e) => {
                error!("Hourly stats query failed: {}", e);
                HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
            }
        }
    }

    /// GET /api/links/{id}/stats/daily?days=N
    pub async fn daily(
        path: web::Path<i64>,
        query: web::Query<DailyQuery>,
        stats: web::Data<Arc<dyn StatStore>>,
    ) -> impl Responder {
        let link_id = path.into_inner();
        let days = query.days.unwrap_or(7);

        match stats.daily_for_link(link_id, days).await {
            Ok(rows) => {
                let entries: Vec<_> = rows
                    .iter()
                    .map(|stat| {
                        json!({
                            "date": stat.key.date.format("%Y-%m-%d").to_string(),
                            "clicks": stat.click_count,
                        })
                    })
                    .collect();

                HttpResponse::Ok().json(json!({
                    "link_id": link_id,
                    "days": days,
                    "entries": entries,
                }))
            }
            Err(e) => {
                error!("Daily stats query failed: {}", e);
                HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
            }
        }
    }

    /// GET /api/links/{id}/clicks/recent?limit=N
    pub async fn recent_clicks(
        path: web::Path<i64>,
        query: web::Query<RecentQuery>,
        events: web::Data<Arc<dyn ClickEventStore>>,
    ) -> impl Responder {
        let link_id = path.into_inner();
        let limit = query.limit.unwrap_or(20).min(100);

        match events.recent_for_link(link_id, limit).await {
            Ok(rows) => {
                let clicks: Vec<_> = rows
                    .iter()
                    .map(|event| {
                        json!({
                            "clicked_at": event.clicked_at.to_rfc3339(),
                            "ip_address": event.ip_address,
                            "referer": event.referer,
                            "user_agent": event.user_agent,
                        })
                    })
                    .collect();

                HttpResponse::Ok().json(json!({
                    "link_id": link_id,
                    "clicks": clicks,
                }))
            }
            Err(e) => {
                error!("Recent clicks query failed: {}", e);
                HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
            }
        }
    }

    /// GET /api/links/{id}/clicks/count?hours=N
    pub async fn click_count(
        path: web::Path<i64>,
        query: web::Query<CountQuery>,
        events: web::Data<Arc<dyn ClickEventStore>>,
    ) -> impl Responder {
        let link_id = path.into_inner();
        let hours = query.hours.unwrap_or(24).clamp(1, 24 * 90);

        let end = Utc::now();
        let start = end - chrono::Duration::hours(hours);

        match events.count_for_link(link_id, start, end).await {
            Ok(count) => HttpResponse::Ok().json(json!({
                "link_id": link_id,
                "hours": hours,
                "clicks": count,
            })),
            Err(e) => {
                error!("Click count query failed: {}", e);
                HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
            }
        }
    }

    /// GET /api/stats/top?limit=N&days=M
    pub async fn top_links(
        query: web::Query<TopQuery>,
        stats: web::Data<Arc<dyn StatStore>>,
    ) -> impl Responder {
        let limit = query.limit.unwrap_or(10).min(100);
        let days = query.days.unwrap_or(7);

        match stats.top_links(limit, days).await {
            Ok(rows) => {
                let links: Vec<_> = rows
                    .iter()
                    .map(|(link_id, code, clicks)| {
                        json!({
                            "link_id": link_id,
                            "short_code": code,
                            "clicks": clicks,
                        })
                    })
                    .collect();

                HttpResponse::Ok().json(json!({ "links": links }))
            }
            Err(e) => {
                error!("Top links query failed: {}", e);
                HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
            }
        }
    }

    /// GET /api/stats/heatmap?days=N
    ///
    /// 最近 N 天全站点击量在一天 24 小时上的分布。
    pub async fn heatmap(
        query: web::Query<HeatmapQuery>,
        stats: web::Data<Arc<dyn StatStore>>,
    ) -> impl Responder {
        let days = query.days.unwrap_or(7).clamp(1, 90);

        match stats.hourly_heatmap(days).await {
            Ok(totals) => {
                let hours: Vec<_> = totals
                    .iter()
                    .enumerate()
                    .map(|(hour, clicks)| json!({ "hour": hour, "clicks": clicks }))
                    .collect();

                HttpResponse::Ok().json(json!({ "days": days, "hours": hours }))
            }
            Err(e) => {
                error!("Heatmap query failed: {}", e);
                HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
            }
        }
    }
}
