//! Shortpulse - link-resolution cache and click-analytics pipeline
//!
//! This library provides the serving-path components of a URL shortener:
//! snapshot caching for redirects, asynchronous click recording, and the
//! aggregation pipeline that turns raw click events into hourly and daily
//! statistics.
//!
//! # Architecture
//! - `resolver`: cache-aside link resolution for the redirect path
//! - `cache`: link snapshot cache backends (memory, redis, null)
//! - `repository`: authoritative link record access
//! - `analytics`: click event log, aggregation, rollup, anomaly
//!   detection and retention
//! - `queue`: in-process job queues, workers and the periodic scheduler
//! - `limiter`: shared fixed-window rate limiting
//! - `services`: HTTP surface (redirect, stats queries, health)
//! - `config`: configuration management
//! - `errors`: unified error type

pub mod analytics;
pub mod cache;
pub mod config;
pub mod errors;
pub mod limiter;
pub mod logging;
pub mod queue;
pub mod repository;
pub mod resolver;
pub mod services;
