//! Scan cycle orchestration.
//!
//! A cycle runs the requested adapters against one application in order,
//! classifies its health over the resulting issue population and closes the
//! scan run. Once the application is known the cycle always completes:
//! adapter failures are isolated by `Scanner::scan` and bookkeeping errors
//! are logged.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::{AppHealth, Application};
use crate::models::scan_run::{ScanRun, ScanRunStatus, ScannerFailure};
use crate::scanners::{self, ScanOutcome, Scanner};
use crate::services::scan_lock::{LockAttempt, ScanLock};
use crate::services::{application, health, issue, scan_run};

/// Everything a cycle needs; cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct ScanContext {
    pub db: PgPool,
    pub scanners: Arc<Vec<Arc<dyn Scanner>>>,
    pub lock: Option<ScanLock>,
}

impl ScanContext {
    pub fn new(db: PgPool, scanners: Vec<Arc<dyn Scanner>>, lock: Option<ScanLock>) -> Self {
        Self {
            db,
            scanners: Arc::new(scanners),
            lock,
        }
    }

    /// Scan types served by the registered adapters.
    pub fn known_scan_types(&self) -> Vec<&'static str> {
        scanners::known_scan_types(&self.scanners)
    }
}

/// Result of one finished cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub application_id: Uuid,
    pub status: ScanRunStatus,
    /// Absent when classification could not be computed.
    pub health: Option<AppHealth>,
    pub failures: Vec<ScannerFailure>,
    pub run: Option<ScanRun>,
}

/// Scan one application by id.
///
/// `scan_types` narrows the cycle to the adapters owning those types; empty
/// runs everything. Returns `Ok(None)` when another cycle for the same
/// application holds the lock.
pub async fn scan(
    ctx: &ScanContext,
    application_id: Uuid,
    scan_types: &[String],
) -> Result<Option<CycleReport>, AppError> {
    let app = application::find_by_id(&ctx.db, application_id).await?;
    let selected = scanners::select(&ctx.scanners, scan_types);

    let guard = match &ctx.lock {
        Some(lock) => match lock.acquire(app.id).await {
            LockAttempt::Acquired(guard) => Some(guard),
            LockAttempt::Held => {
                tracing::info!(app = %app.name, "Scan already in progress, skipping");
                return Ok(None);
            }
            LockAttempt::Unavailable => None,
        },
        None => None,
    };

    let report = run_cycle(&ctx.db, &app, &selected).await;

    if let (Some(lock), Some(guard)) = (&ctx.lock, guard) {
        lock.release(guard).await;
    }
    Ok(Some(report))
}

/// Run the given adapters against `app` and record the cycle.
pub async fn run_cycle(pool: &PgPool, app: &Application, selected: &[Arc<dyn Scanner>]) -> CycleReport {
    let scan_types: Vec<String> = selected
        .iter()
        .flat_map(|s| s.scan_types().iter().map(|t| t.to_string()))
        .collect();

    tracing::info!(app = %app.name, scan_types = ?scan_types, "Starting scan cycle");

    let run = match scan_run::start(pool, app.id, &scan_types).await {
        Ok(run) => Some(run),
        Err(e) => {
            tracing::error!(app = %app.name, error = %e, "Failed to open scan run");
            None
        }
    };

    let mut failures = Vec::new();
    for scanner in selected {
        if let ScanOutcome::Failed { error } = scanner.scan(pool, app).await {
            failures.push(ScannerFailure {
                scanner: scanner.name().to_string(),
                message: error,
            });
        }
    }

    let health = match health::evaluate(pool, app.id).await {
        Ok(health) => Some(health),
        Err(e) => {
            tracing::error!(app = %app.name, error = %e, "Failed to classify application health");
            None
        }
    };

    if let Some(health) = health {
        if let Err(e) = application::update_scan_state(pool, app.id, health, Utc::now()).await {
            tracing::error!(app = %app.name, error = %e, "Failed to record scan state");
        }
    }

    let status = if failures.is_empty() {
        ScanRunStatus::Completed
    } else {
        ScanRunStatus::CompletedWithErrors
    };

    let run = match run {
        Some(run) => close_run(pool, app, &run, status.clone(), &failures).await.or(Some(run)),
        None => None,
    };

    tracing::info!(
        app = %app.name,
        status = ?status,
        health = ?health,
        failed_scanners = failures.len(),
        duration_ms = run
            .as_ref()
            .and_then(ScanRun::duration)
            .map(|d| d.num_milliseconds()),
        "Scan cycle finished"
    );

    CycleReport {
        application_id: app.id,
        status,
        health,
        failures,
        run,
    }
}

async fn close_run(
    pool: &PgPool,
    app: &Application,
    run: &ScanRun,
    status: ScanRunStatus,
    failures: &[ScannerFailure],
) -> Option<ScanRun> {
    let total = match issue::count_for_application(pool, app.id).await {
        Ok(n) => i32::try_from(n).unwrap_or(i32::MAX),
        Err(e) => {
            tracing::error!(app = %app.name, error = %e, "Failed to count issues for scan run");
            0
        }
    };

    match scan_run::finish(pool, run.id, status, total, failures).await {
        Ok(run) => Some(run),
        Err(e) => {
            tracing::error!(app = %app.name, error = %e, "Failed to close scan run");
            None
        }
    }
}
