use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dotenvy::dotenv;
use tracing::info;

use shortpulse::analytics::{
    AnomalyDetector, ClickEventStore, ClickRecorder, DailyRollup, MemoryClickEventStore,
    MemoryStatStore, RetentionCompactor, StatStore, StatsAggregator,
};
use shortpulse::cache::{CacheFactory, LinkCache};
use shortpulse::config::Config;
use shortpulse::limiter::{
    CounterStore, FixedWindowLimiter, MemoryCounterStore, RedisCounterStore,
};
use shortpulse::logging::init_logging;
use shortpulse::queue::{JobQueue, JobRunner, RetryPolicy, Scheduler, WorkerPool};
use shortpulse::repository::{LinkRepository, MemoryLinkRepository};
use shortpulse::resolver::Resolver;
use shortpulse::services::{AppStartTime, HealthService, RedirectService, StatsService};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    dotenv().ok();

    let config = Config::load().expect("Failed to load configuration");
    init_logging(&config.logging);

    // 缓存与权威仓库
    let cache: Arc<dyn LinkCache> =
        CacheFactory::create(&config.cache).expect("Failed to create cache backend");
    info!("Using cache backend: {}", cache.backend_name());

    let repository: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());

    // 分析存储与组件
    let events: Arc<dyn ClickEventStore> = Arc::new(MemoryClickEventStore::new());
    let stats: Arc<dyn StatStore> = Arc::new(MemoryStatStore::new());

    let recorder = Arc::new(ClickRecorder::new(Arc::clone(&events)));
    let aggregator = Arc::new(StatsAggregator::new(Arc::clone(&events), Arc::clone(&stats)));
    let rollup = Arc::new(DailyRollup::new(Arc::clone(&stats)));
    let detector = Arc::new(AnomalyDetector::new(
        Arc::clone(&stats),
        Arc::clone(&repository),
        config.analytics.anomaly_threshold,
    ));
    let compactor = Arc::new(RetentionCompactor::new(Arc::clone(&events)));

    // 队列、worker 与调度器
    let (queue, receivers) = JobQueue::new();
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&recorder),
        Arc::clone(&aggregator),
        Arc::clone(&rollup),
        Arc::clone(&detector),
        Arc::clone(&compactor),
    ));

    let _workers = WorkerPool::spawn(
        queue.clone(),
        receivers,
        runner,
        RetryPolicy::from_config(&config.queue),
        config.queue.workers_per_queue,
    );

    let _schedulers = Scheduler::new(queue.clone(), config.analytics.clone()).spawn();

    let resolver = Arc::new(Resolver::new(
        Arc::clone(&cache),
        Arc::clone(&repository),
        queue.clone(),
        Arc::clone(&recorder),
    ));

    // 限流计数器跟随缓存后端：redis 部署共享计数，其余用进程内计数
    let counter: Arc<dyn CounterStore> = if config.cache.backend == "redis" {
        Arc::new(
            RedisCounterStore::new(&config.cache.redis_url, "ratelimit:")
                .expect("Failed to create redis counter store"),
        )
    } else {
        Arc::new(MemoryCounterStore::new())
    };
    let limiter = Arc::new(FixedWindowLimiter::new(counter));

    let bind_addr = (config.server.host.clone(), config.server.port);
    info!(
        "Starting server at http://{}:{}",
        config.server.host, config.server.port
    );

    let limiter_config = config.limiter.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(Arc::clone(&resolver)))
            .app_data(web::Data::new(Arc::clone(&repository)))
            .app_data(web::Data::new(Arc::clone(&cache)))
            .app_data(web::Data::new(Arc::clone(&events)))
            .app_data(web::Data::new(Arc::clone(&stats)))
            .app_data(web::Data::new(Arc::clone(&limiter)))
            .app_data(web::Data::new(limiter_config.clone()))
            .app_data(web::Data::new(app_start_time.clone()))
            .route("/r/{code}", web::get().to(RedirectService::handle_redirect))
            .route("/health", web::get().to(HealthService::health_check))
            .service(
                web::scope("/api")
                    .route(
                        "/links/{id}/stats/hourly",
                        web::get().to(StatsService::hourly),
                    )
                    .route(
                        "/links/{id}/stats/daily",
                        web::get().to(StatsService::daily),
                    )
                    .route(
                        "/links/{id}/clicks/recent",
                        web::get().to(StatsService::recent_clicks),
                    )
                    .route(
                        "/links/{id}/clicks/count",
                        web::get().to(StatsService::click_count),
                    )
                    .route("/stats/top", web::get().to(StatsService::top_links))
                    .route("/stats/heatmap", web::get().to(StatsService::heatmap)),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
