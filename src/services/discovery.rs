//! Application discovery under a root directory.
//!
//! Every immediate subdirectory of the root is a candidate application,
//! named after the directory. Hidden directories and anything carrying a
//! `DECOMMISSIONED` marker (in the directory itself or its parent) are
//! skipped.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::application::RegisterApplication;
use crate::services::application;

pub const DECOMMISSIONED_MARKER: &str = "DECOMMISSIONED";

/// Outcome of one discovery pass.
#[derive(Debug, Default, Serialize)]
pub struct DiscoveryReport {
    pub registered: Vec<String>,
    pub existing: Vec<String>,
    pub decommissioned: Vec<String>,
    pub errors: Vec<String>,
}

/// Whether `dir` or its parent carries the decommission marker.
pub fn is_decommissioned(dir: &Path) -> bool {
    dir.join(DECOMMISSIONED_MARKER).exists()
        || dir
            .parent()
            .is_some_and(|parent| parent.join(DECOMMISSIONED_MARKER).exists())
}

/// Candidate directories under `root`, sorted by name.
pub fn candidates(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Register every live application found under `root`.
pub async fn sync(pool: &PgPool, root: &Path) -> Result<DiscoveryReport, AppError> {
    let dirs = candidates(root).map_err(|e| {
        AppError::Validation(format!("Cannot read applications root {}: {e}", root.display()))
    })?;
    let mut report = DiscoveryReport::default();

    for dir in dirs {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if is_decommissioned(&dir) {
            tracing::info!(app = %name, "Skipping decommissioned application");
            report.decommissioned.push(name);
            continue;
        }

        let input = RegisterApplication {
            name: name.clone(),
            path: dir.to_string_lossy().into_owned(),
        };
        match application::register(pool, &input).await {
            Ok((_, true)) => {
                tracing::info!(app = %name, path = %input.path, "Registered application");
                report.registered.push(name);
            }
            Ok((_, false)) => report.existing.push(name),
            Err(e) => {
                tracing::warn!(app = %name, error = %e, "Failed to register application");
                report.errors.push(format!("{name}: {e}"));
            }
        }
    }

    Ok(report)
}
