use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::scanners::ScannerSettings;

const DEFAULT_STALE_AFTER_HOURS: i64 = 24;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub host: String,
    pub port: u16,
    /// Command prefix placed before every tool name (e.g. `bundle exec`).
    pub tool_runner: Vec<String>,
    pub tool_timeout_secs: u64,
    pub coverage_timeout_secs: u64,
    pub scan_tmp_dir: PathBuf,
    pub drift_golden_path: Option<PathBuf>,
    /// Seconds between scheduler sweeps. Zero disables the scheduler.
    pub scan_interval_secs: u64,
    pub scan_stale_after_hours: i64,
    pub scan_concurrency: usize,
    pub scan_lock_ttl_secs: u64,
    pub apps_root: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKEND_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            tool_runner: parse_runner(
                &env::var("SCAN_TOOL_RUNNER").unwrap_or_else(|_| "bundle exec".to_string()),
            ),
            tool_timeout_secs: env::var("SCAN_TOOL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            coverage_timeout_secs: env::var("COVERAGE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            scan_tmp_dir: env::var("SCAN_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
            drift_golden_path: env::var("DRIFT_GOLDEN_PATH").ok().map(PathBuf::from),
            scan_interval_secs: env::var("SCAN_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),
            scan_stale_after_hours: env::var("SCAN_STALE_AFTER_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),
            scan_concurrency: env::var("SCAN_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            scan_lock_ttl_secs: env::var("SCAN_LOCK_TTL_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .unwrap_or(1800),
            apps_root: env::var("APPS_ROOT").ok().map(PathBuf::from),
        })
    }

    /// Age after which an application is due for a scan. Negative or
    /// unrepresentable hour counts fall back to the default.
    pub fn stale_after(&self) -> chrono::Duration {
        stale_after_hours(self.scan_stale_after_hours)
    }

    /// Settings shared by every scanner adapter.
    pub fn scanner_settings(&self) -> ScannerSettings {
        ScannerSettings {
            runner: self.tool_runner.clone(),
            tool_timeout: Duration::from_secs(self.tool_timeout_secs),
            coverage_timeout: Duration::from_secs(self.coverage_timeout_secs),
            tmp_dir: self.scan_tmp_dir.clone(),
            golden_path: self.drift_golden_path.clone(),
        }
    }
}

fn stale_after_hours(hours: i64) -> chrono::Duration {
    chrono::Duration::try_hours(hours)
        .filter(|d| *d >= chrono::Duration::zero())
        .unwrap_or_else(|| chrono::Duration::hours(DEFAULT_STALE_AFTER_HOURS))
}

/// Split a runner prefix like `bundle exec` into discrete arguments.
fn parse_runner(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
