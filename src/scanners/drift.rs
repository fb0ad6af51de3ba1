//! Deployment drift adapter.
//!
//! Compares an application's deployment setup against house conventions and
//! the golden reference application. No external tool is involved.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;

use crate::errors::ScanError;
use crate::models::application::Application;
use crate::models::issue::{NewIssue, Severity};
use crate::scanners::{ScanBatch, Scanner, ScannerSettings};

/// Name the golden reference application is registered under.
pub const GOLDEN_APP_NAME: &str = "golden_deployment";

const DEPLOY_CONFIG: &str = "config/deploy.rb";
const PRODUCTION_ENV: &str = "config/environments/production.rb";
const GEMFILE_LOCK: &str = "Gemfile.lock";

pub struct DriftScanner {
    settings: ScannerSettings,
}

impl DriftScanner {
    pub fn new(settings: ScannerSettings) -> Self {
        Self { settings }
    }

    fn is_golden(&self, app: &Application) -> bool {
        if app.name == GOLDEN_APP_NAME {
            return true;
        }
        match &self.settings.golden_path {
            Some(golden) => same_path(golden, Path::new(&app.path)),
            None => false,
        }
    }

    async fn check_deploy_config(&self, root: &Path, issues: &mut Vec<NewIssue>) -> Result<(), ScanError> {
        let Some(content) = read_optional(&root.join(DEPLOY_CONFIG)).await? else {
            issues.push(
                NewIssue::new(
                    Severity::Critical,
                    "Missing config/deploy.rb - deployment not configured",
                )
                .at(Some(DEPLOY_CONFIG.to_string()), None),
            );
            return Ok(());
        };

        if !content.contains("set :application") {
            issues.push(
                NewIssue::new(Severity::High, "Deployment config missing :application setting")
                    .at(Some(DEPLOY_CONFIG.to_string()), None),
            );
        }
        Ok(())
    }

    async fn check_rails_version(&self, root: &Path, issues: &mut Vec<NewIssue>) -> Result<(), ScanError> {
        let Some(golden) = &self.settings.golden_path else {
            return Ok(());
        };
        let Some(app_lock) = read_optional(&root.join(GEMFILE_LOCK)).await? else {
            return Ok(());
        };
        let Some(golden_lock) = read_optional(&golden.join(GEMFILE_LOCK)).await? else {
            tracing::debug!(golden = %golden.display(), "Golden Gemfile.lock not found");
            return Ok(());
        };

        let gem_line = Regex::new(r"(?m)^\s{4}(\w+)\s+\(([^)]+)\)")
            .map_err(|e| ScanError::malformed("drift", e))?;
        let app_gems = locked_versions(&gem_line, &app_lock);
        let golden_gems = locked_versions(&gem_line, &golden_lock);

        if let (Some(ours), Some(theirs)) = (app_gems.get("rails"), golden_gems.get("rails")) {
            if ours != theirs {
                issues.push(
                    NewIssue::new(
                        Severity::Medium,
                        format!("Rails version ({ours}) differs from {GOLDEN_APP_NAME} ({theirs})"),
                    )
                    .at(Some(GEMFILE_LOCK.to_string()), None),
                );
            }
        }
        Ok(())
    }

    async fn check_production_env(&self, root: &Path, issues: &mut Vec<NewIssue>) -> Result<(), ScanError> {
        let Some(content) = read_optional(&root.join(PRODUCTION_ENV)).await? else {
            return Ok(());
        };

        if !content.contains("tailwindcss:build") {
            issues.push(
                NewIssue::new(
                    Severity::Medium,
                    "Tailwind CSS build task may not be configured for deployment",
                )
                .at(Some(PRODUCTION_ENV.to_string()), None),
            );
        }
        if !content.contains("relative_url_root") {
            issues.push(
                NewIssue::new(
                    Severity::High,
                    "Path-based routing (relative_url_root) not configured - app may not work in production",
                )
                .at(Some(PRODUCTION_ENV.to_string()), None),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Scanner for DriftScanner {
    fn name(&self) -> &'static str {
        "drift"
    }

    fn scan_types(&self) -> &'static [&'static str] {
        &["drift"]
    }

    fn applies_to(&self, app: &Application) -> bool {
        !self.is_golden(app)
    }

    async fn collect(&self, app: &Application) -> Result<Vec<ScanBatch>, ScanError> {
        let root = PathBuf::from(&app.path);
        let mut issues = Vec::new();

        self.check_deploy_config(&root, &mut issues).await?;
        self.check_rails_version(&root, &mut issues).await?;
        self.check_production_env(&root, &mut issues).await?;

        Ok(vec![ScanBatch::new("drift", issues)])
    }
}

/// File contents, or `None` when the file does not exist.
async fn read_optional(path: &Path) -> Result<Option<String>, ScanError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Gem name → locked version from the `specs:` section of a lockfile.
fn locked_versions<'a>(gem_line: &Regex, lockfile: &'a str) -> HashMap<&'a str, &'a str> {
    gem_line
        .captures_iter(lockfile)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let version = caps.get(2)?.as_str();
            Some((name, version))
        })
        .collect()
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanners::test_support::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn lockfile(rails: &str) -> String {
        format!("GEM\n  remote: https://rubygems.org/\n  specs:\n    rack (3.0.8)\n    rails ({rails})\n      actionpack (= {rails})\n")
    }

    fn conforming_app(root: &Path) {
        write(root, DEPLOY_CONFIG, "set :application, \"billing\"\n");
        write(
            root,
            PRODUCTION_ENV,
            "config.relative_url_root = \"/billing\"\n# tailwindcss:build runs on deploy\n",
        );
    }

    #[tokio::test]
    async fn missing_deploy_config_is_critical() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_with_fake_tool(tmp.path(), "exit 0");
        let root = tmp.path().join("billing");
        std::fs::create_dir(&root).unwrap();

        let batches = DriftScanner::new(settings)
            .collect(&application("billing", &root))
            .await
            .unwrap();
        let issues = &batches[0].issues;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Some(Severity::Critical));
        assert_eq!(issues[0].file_path.as_deref(), Some(DEPLOY_CONFIG));
    }

    #[tokio::test]
    async fn conforming_app_is_clean() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_with_fake_tool(tmp.path(), "exit 0");
        let root = tmp.path().join("billing");
        conforming_app(&root);

        let batches = DriftScanner::new(settings)
            .collect(&application("billing", &root))
            .await
            .unwrap();
        assert!(batches[0].issues.is_empty());
    }

    #[tokio::test]
    async fn flags_each_convention_breach() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_with_fake_tool(tmp.path(), "exit 0");
        let root = tmp.path().join("billing");
        write(&root, DEPLOY_CONFIG, "lock \"~> 3.19\"\n");
        write(&root, PRODUCTION_ENV, "Rails.application.configure do\nend\n");

        let batches = DriftScanner::new(settings)
            .collect(&application("billing", &root))
            .await
            .unwrap();
        let severities: Vec<_> = batches[0].issues.iter().map(|i| i.severity).collect();
        assert_eq!(
            severities,
            vec![Some(Severity::High), Some(Severity::Medium), Some(Severity::High)]
        );
    }

    #[tokio::test]
    async fn rails_version_compared_with_golden() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = settings_with_fake_tool(tmp.path(), "exit 0");
        let golden = tmp.path().join(GOLDEN_APP_NAME);
        write(&golden, GEMFILE_LOCK, &lockfile("7.2.1"));
        settings.golden_path = Some(golden);

        let root = tmp.path().join("billing");
        conforming_app(&root);
        write(&root, GEMFILE_LOCK, &lockfile("7.1.3"));

        let batches = DriftScanner::new(settings)
            .collect(&application("billing", &root))
            .await
            .unwrap();
        let issues = &batches[0].issues;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Some(Severity::Medium));
        assert_eq!(
            issues[0].message,
            "Rails version (7.1.3) differs from golden_deployment (7.2.1)"
        );
    }

    #[test]
    fn golden_app_is_not_scanned() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = settings_with_fake_tool(tmp.path(), "exit 0");
        let golden = tmp.path().join("reference");
        std::fs::create_dir(&golden).unwrap();
        settings.golden_path = Some(golden.clone());

        let scanner = DriftScanner::new(settings);
        assert!(!scanner.applies_to(&application(GOLDEN_APP_NAME, tmp.path())));
        assert!(!scanner.applies_to(&application("reference", &golden)));
        assert!(scanner.applies_to(&application("billing", tmp.path())));
    }

    #[test]
    fn lockfile_parsing_reads_top_level_specs_only() {
        let gem_line = Regex::new(r"(?m)^\s{4}(\w+)\s+\(([^)]+)\)").unwrap();
        let lock = lockfile("7.1.3");
        let gems = locked_versions(&gem_line, &lock);
        assert_eq!(gems.get("rails"), Some(&"7.1.3"));
        assert_eq!(gems.get("rack"), Some(&"3.0.8"));
        assert!(!gems.contains_key("actionpack"));
    }
}
