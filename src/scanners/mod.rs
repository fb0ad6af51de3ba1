//! Scanner adapters.
//!
//! An adapter owns one or more scan types. It runs its external tool (or
//! filesystem checks) against an application, hands the raw output to a
//! normalizer, and returns one batch per owned scan type. The shared
//! `Scanner::scan` wraps that with the target precondition, failure
//! isolation and persistence.

pub mod code_smell;
pub mod complexity;
pub mod coverage;
pub mod drift;
pub mod duplication;
pub mod lint;
pub mod process;
pub mod security;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tempfile::NamedTempFile;

use crate::errors::ScanError;
use crate::models::application::Application;
use crate::models::issue::NewIssue;
use crate::parsers::{Normalizer, ParseResult};
use crate::services::result_store;

/// Settings shared by every adapter, derived from `AppConfig`.
#[derive(Debug, Clone)]
pub struct ScannerSettings {
    /// Command prefix placed before every tool name.
    pub runner: Vec<String>,
    pub tool_timeout: Duration,
    pub coverage_timeout: Duration,
    /// Directory for scoped tool output files.
    pub tmp_dir: PathBuf,
    /// Reference application for drift comparison.
    pub golden_path: Option<PathBuf>,
}

/// Normalized issues for one scan type, ready for the result store.
#[derive(Debug, Default)]
pub struct ScanBatch {
    pub scan_type: &'static str,
    pub issues: Vec<NewIssue>,
    pub metadata: Map<String, Value>,
}

impl ScanBatch {
    pub fn new(scan_type: &'static str, issues: Vec<NewIssue>) -> Self {
        Self {
            scan_type,
            issues,
            metadata: Map::new(),
        }
    }

    fn from_parse(scan_type: &'static str, result: ParseResult) -> Self {
        Self {
            scan_type,
            issues: result.issues,
            metadata: result.metadata,
        }
    }
}

/// What one adapter run amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Target missing or not applicable; nothing was touched.
    Skipped,
    /// Results replaced for every owned scan type.
    Completed { issues: usize },
    /// Prior results for the owned scan types were left in place.
    Failed { error: String },
}

#[async_trait]
pub trait Scanner: Send + Sync {
    /// Name used in logs and scan run error details.
    fn name(&self) -> &'static str;

    /// Scan types whose issues this adapter replaces on success.
    fn scan_types(&self) -> &'static [&'static str];

    /// Whether the adapter has anything to do for `app` at all.
    fn applies_to(&self, _app: &Application) -> bool {
        true
    }

    /// Run the tool and normalize its output. Owned scan types without a
    /// batch are stored as empty.
    async fn collect(&self, app: &Application) -> Result<Vec<ScanBatch>, ScanError>;

    /// Precondition check, collection and persistence with failure isolation.
    ///
    /// Never returns an error: any failure is logged once with the
    /// application name and reported as `ScanOutcome::Failed`.
    async fn scan(&self, pool: &PgPool, app: &Application) -> ScanOutcome {
        if !Path::new(&app.path).is_dir() {
            tracing::debug!(app = %app.name, path = %app.path, scanner = self.name(), "Application directory missing, skipping");
            return ScanOutcome::Skipped;
        }
        if !self.applies_to(app) {
            tracing::debug!(app = %app.name, scanner = self.name(), "Scanner not applicable, skipping");
            return ScanOutcome::Skipped;
        }

        let result = match self.collect(app).await {
            Ok(batches) => persist(pool, app, self.scan_types(), batches).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(issues) => {
                tracing::info!(app = %app.name, scanner = self.name(), issues, "Scan completed");
                ScanOutcome::Completed { issues }
            }
            Err(e) => {
                tracing::error!(app = %app.name, scanner = self.name(), error = %e, "Scan failed");
                ScanOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Replace stored results for every owned scan type, one transaction each.
async fn persist(
    pool: &PgPool,
    app: &Application,
    owned: &[&'static str],
    mut batches: Vec<ScanBatch>,
) -> Result<usize, ScanError> {
    let mut stored = 0;
    for &scan_type in owned {
        let batch = match batches.iter().position(|b| b.scan_type == scan_type) {
            Some(i) => batches.swap_remove(i),
            None => ScanBatch::new(scan_type, Vec::new()),
        };
        result_store::replace_issues(
            pool,
            app.id,
            scan_type,
            &batch.issues,
            Value::Object(batch.metadata),
        )
        .await?;
        stored += batch.issues.len();
    }

    for stray in batches {
        tracing::warn!(app = %app.name, scan_type = stray.scan_type, "Dropping batch for scan type the scanner does not own");
    }
    Ok(stored)
}

/// Run a normalizer over raw output, logging records it had to skip.
pub(crate) fn normalize(
    normalizer: &dyn Normalizer,
    tool: &str,
    app: &Application,
    data: &[u8],
) -> Result<ParseResult, ScanError> {
    let result = normalizer
        .normalize(data)
        .map_err(|e| ScanError::malformed(tool, e))?;
    for err in &result.errors {
        tracing::warn!(
            app = %app.name,
            tool,
            record = err.record_index,
            field = %err.field,
            message = %err.message,
            "Skipped malformed record"
        );
    }
    Ok(result)
}

/// Replace every character outside `[A-Za-z0-9_-]` so the name is safe in a file name.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Scoped output file for one tool run; removed when dropped.
pub(crate) fn output_file(
    settings: &ScannerSettings,
    tool: &str,
    app: &Application,
) -> Result<NamedTempFile, ScanError> {
    let prefix = format!("{tool}_{}_", sanitize_name(&app.name));
    let file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".json")
        .tempfile_in(&settings.tmp_dir)?;
    Ok(file)
}

/// Read what a tool wrote to its output file.
///
/// An empty file means the tool never got to write a report; the exit status
/// decides whether that is a tool failure or just missing output.
pub(crate) async fn read_output(
    tool: &str,
    file: &NamedTempFile,
    output: &process::ToolOutput,
) -> Result<Vec<u8>, ScanError> {
    let data = tokio::fs::read(file.path()).await?;
    if data.iter().all(u8::is_ascii_whitespace) {
        if !output.status.success() {
            return Err(output.failure(tool));
        }
        return Err(ScanError::MissingOutput {
            tool: tool.to_string(),
        });
    }
    Ok(data)
}

/// Directory the code analyzers point at: `<root>/app` when present.
pub(crate) fn source_dir(app: &Application) -> PathBuf {
    let root = Path::new(&app.path);
    let app_dir = root.join("app");
    if app_dir.is_dir() {
        app_dir
    } else {
        root.to_path_buf()
    }
}

/// Every adapter in the order a full cycle runs them.
pub fn default_scanners(settings: &ScannerSettings) -> Vec<Arc<dyn Scanner>> {
    vec![
        Arc::new(lint::LintScanner::new(settings.clone())),
        Arc::new(security::SecurityScanner::new(settings.clone())),
        Arc::new(code_smell::CodeSmellScanner::new(settings.clone())),
        Arc::new(complexity::ComplexityScanner::new(settings.clone())),
        Arc::new(duplication::DuplicationScanner::new(settings.clone())),
        Arc::new(coverage::CoverageScanner::new(settings.clone())),
        Arc::new(drift::DriftScanner::new(settings.clone())),
    ]
}

/// Adapters owning at least one of `scan_types`; all of them when none are given.
pub fn select(scanners: &[Arc<dyn Scanner>], scan_types: &[String]) -> Vec<Arc<dyn Scanner>> {
    if scan_types.is_empty() {
        return scanners.to_vec();
    }
    scanners
        .iter()
        .filter(|s| {
            s.scan_types()
                .iter()
                .any(|owned| scan_types.iter().any(|t| t == owned))
        })
        .cloned()
        .collect()
}

/// Every scan type known to the registry.
pub fn known_scan_types(scanners: &[Arc<dyn Scanner>]) -> Vec<&'static str> {
    scanners
        .iter()
        .flat_map(|s| s.scan_types().iter().copied())
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::time::Duration;

    use chrono::Utc;
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;
    use uuid::Uuid;

    use super::ScannerSettings;
    use crate::models::application::{AppHealth, Application};

    pub fn application(name: &str, path: &Path) -> Application {
        Application {
            id: Uuid::new_v4(),
            name: name.to_string(),
            path: path.to_string_lossy().into_owned(),
            status: AppHealth::Pending,
            last_scanned_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Settings whose runner is a shell script standing in for every tool.
    pub fn settings_with_fake_tool(tmp: &Path, script: &str) -> ScannerSettings {
        let script_path = tmp.join("fake_tool.sh");
        std::fs::write(&script_path, script).unwrap();
        ScannerSettings {
            runner: vec!["sh".to_string(), script_path.to_string_lossy().into_owned()],
            tool_timeout: Duration::from_secs(10),
            coverage_timeout: Duration::from_secs(10),
            tmp_dir: tmp.to_path_buf(),
            golden_path: None,
        }
    }

    /// Pool that never connects; for paths that must not reach the database.
    pub fn unreachable_pool() -> PgPool {
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap()
    }
}
