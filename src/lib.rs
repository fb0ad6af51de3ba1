pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod parsers;
pub mod routes;
pub mod scanners;
pub mod services;

use sqlx::PgPool;

use crate::services::scheduler::Scheduler;

/// Shared application state passed to all Axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: config::AppConfig,
    pub redis: redis::Client,
    pub scheduler: Scheduler,
}
