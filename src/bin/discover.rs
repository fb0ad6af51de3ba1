//! Register every application found under the applications root.
//!
//! Usage: `cargo run --bin discover [ROOT]`
//!
//! ROOT defaults to `APPS_ROOT`. Requires `DATABASE_URL` (reads .env).

use std::path::PathBuf;

use anyhow::Context;
use codepulse::config::AppConfig;
use codepulse::db;
use codepulse::services::discovery;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codepulse=info".into()),
        )
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| config.apps_root.clone())
        .context("No applications root given and APPS_ROOT is not set")?;

    let pool = db::create_pool(&config.database_url, 5).await?;
    db::migrate(&pool).await?;

    println!("=== CodePulse discovery: {} ===", root.display());

    let report = discovery::sync(&pool, &root).await?;

    for name in &report.registered {
        println!("[new]  {name}");
    }
    for name in &report.existing {
        println!("[skip] {name} (already registered)");
    }
    for name in &report.decommissioned {
        println!("[skip] {name} (decommissioned)");
    }
    for err in &report.errors {
        println!("[fail] {err}");
    }

    println!(
        "\n=== Discovery complete: {} registered, {} existing, {} decommissioned, {} failed ===",
        report.registered.len(),
        report.existing.len(),
        report.decommissioned.len(),
        report.errors.len()
    );

    Ok(())
}
