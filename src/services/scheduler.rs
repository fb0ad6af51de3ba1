//! Background scan scheduling.
//!
//! Each cycle runs on its own task. A semaphore bounds how many run at once,
//! and an in-flight set keeps an application from being queued twice.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::application;
use crate::services::orchestrator::{self, ScanContext};

#[derive(Clone)]
pub struct Scheduler {
    ctx: ScanContext,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(ctx: ScanContext, concurrency: usize) -> Self {
        Self {
            ctx,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn context(&self) -> &ScanContext {
        &self.ctx
    }

    /// Queue a cycle for one application.
    ///
    /// Returns `None` when a cycle for it is already queued or running.
    pub fn enqueue(&self, application_id: Uuid, scan_types: Vec<String>) -> Option<JoinHandle<()>> {
        if !self.mark_in_flight(application_id) {
            tracing::debug!(%application_id, "Scan already queued");
            return None;
        }

        let ctx = self.ctx.clone();
        let permits = Arc::clone(&self.permits);
        let slot = InFlightSlot {
            set: Arc::clone(&self.in_flight),
            id: application_id,
        };

        Some(tokio::spawn(async move {
            let _slot = slot;
            if let Ok(_permit) = permits.acquire_owned().await {
                match orchestrator::scan(&ctx, application_id, &scan_types).await {
                    Ok(Some(report)) => tracing::debug!(%application_id, status = ?report.status, "Queued scan finished"),
                    Ok(None) => {}
                    Err(e) if e.is_not_found() => {
                        tracing::warn!(%application_id, "Application no longer registered, dropping queued scan")
                    }
                    Err(e) => tracing::error!(%application_id, error = %e, "Queued scan could not start"),
                }
            }
        }))
    }

    /// Queue every application that is due for a scan.
    pub async fn sweep(&self, stale_after: chrono::Duration) -> Result<usize, AppError> {
        let due = application::needs_scan(&self.ctx.db, stale_after).await?;
        let queued = due
            .iter()
            .filter(|app| self.enqueue(app.id, Vec::new()).is_some())
            .count();
        tracing::info!(due = due.len(), queued, "Scheduler sweep");
        Ok(queued)
    }

    /// Sweep every `interval` until the process exits.
    pub fn spawn_periodic(self, interval: Duration, stale_after: chrono::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep(stale_after).await {
                    tracing::error!(error = %e, "Scheduler sweep failed");
                }
            }
        })
    }

    fn mark_in_flight(&self, application_id: Uuid) -> bool {
        match self.in_flight.lock() {
            Ok(mut set) => set.insert(application_id),
            Err(poisoned) => poisoned.into_inner().insert(application_id),
        }
    }
}

/// Membership in the in-flight set, released on drop so a panicking cycle
/// does not pin its application.
struct InFlightSlot {
    set: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        match self.set.lock() {
            Ok(mut set) => set.remove(&self.id),
            Err(poisoned) => poisoned.into_inner().remove(&self.id),
        };
    }
}
