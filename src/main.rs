use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use codepulse::config::AppConfig;
use codepulse::scanners;
use codepulse::services::orchestrator::ScanContext;
use codepulse::services::scan_lock::ScanLock;
use codepulse::services::scheduler::Scheduler;
use codepulse::{db, routes, AppState};
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codepulse=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    db::migrate(&pool).await.context("Failed to run migrations")?;

    let redis = redis::Client::open(config.redis_url.as_str()).context("Invalid REDIS_URL")?;
    let lock = ScanLock::new(redis.clone(), Duration::from_secs(config.scan_lock_ttl_secs));

    let scanners = scanners::default_scanners(&config.scanner_settings());
    let ctx = ScanContext::new(pool.clone(), scanners, Some(lock));
    let scheduler = Scheduler::new(ctx, config.scan_concurrency);

    if config.scan_interval_secs > 0 {
        tracing::info!(
            interval_secs = config.scan_interval_secs,
            stale_after_hours = config.stale_after().num_hours(),
            "Starting scan scheduler"
        );
        scheduler.clone().spawn_periodic(
            Duration::from_secs(config.scan_interval_secs),
            config.stale_after(),
        );
    } else {
        tracing::info!("Scan scheduler disabled");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid BACKEND_HOST/BACKEND_PORT")?;

    let state = AppState {
        db: pool,
        config,
        redis,
        scheduler,
    };

    tracing::info!(host = %addr, "Starting CodePulse API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, routes::router(state)).await?;

    Ok(())
}
