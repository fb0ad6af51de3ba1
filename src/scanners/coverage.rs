//! Test coverage adapter.
//!
//! Reads SimpleCov's `coverage/.resultset.json`. When it is missing and the
//! application has a test suite, the suite is run once with `COVERAGE=true`
//! under the coverage timeout to produce it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::errors::ScanError;
use crate::models::application::Application;
use crate::parsers::Normalizer;
use crate::parsers::coverage::CoverageNormalizer;
use crate::scanners::process::ToolCommand;
use crate::scanners::{normalize, ScanBatch, Scanner, ScannerSettings};

const TOOL: &str = "test_coverage";

pub struct CoverageScanner {
    settings: ScannerSettings,
}

impl CoverageScanner {
    pub fn new(settings: ScannerSettings) -> Self {
        Self { settings }
    }

    fn resultset_path(root: &Path) -> PathBuf {
        root.join("coverage").join(".resultset.json")
    }

    fn has_test_suite(root: &Path) -> bool {
        root.join("test").is_dir() || root.join("spec").is_dir()
    }

    async fn run_test_suite(&self, app: &Application, root: &Path) -> Result<(), ScanError> {
        tracing::info!(app = %app.name, "Coverage data missing, running test suite");

        let output = ToolCommand::program(root.join("bin").join("rails"), root, self.settings.coverage_timeout)
            .arg("test")
            .env("COVERAGE", "true")
            .env("RAILS_ENV", "test")
            .output()
            .await?;

        // Failing tests still leave coverage behind.
        if !output.status.success() {
            tracing::warn!(
                app = %app.name,
                status = %output.status,
                stderr = %output.stderr_excerpt(),
                "Test suite exited unsuccessfully"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Scanner for CoverageScanner {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn scan_types(&self) -> &'static [&'static str] {
        &["test_coverage"]
    }

    fn applies_to(&self, app: &Application) -> bool {
        let root = Path::new(&app.path);
        Self::resultset_path(root).is_file() || Self::has_test_suite(root)
    }

    async fn collect(&self, app: &Application) -> Result<Vec<ScanBatch>, ScanError> {
        let root = Path::new(&app.path);
        let resultset = Self::resultset_path(root);

        if !resultset.is_file() {
            self.run_test_suite(app, root).await?;
        }

        let data = match tokio::fs::read(&resultset).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScanError::MissingOutput {
                    tool: TOOL.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let normalizer = CoverageNormalizer::new(root);
        let result = normalize(&normalizer, TOOL, app, &data)?;
        Ok(vec![ScanBatch::from_parse(normalizer.scan_type(), result)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::Severity;
    use crate::scanners::test_support::*;

    fn write_resultset(root: &Path, body: &str) {
        std::fs::create_dir_all(root.join("coverage")).unwrap();
        std::fs::write(root.join("coverage/.resultset.json"), body).unwrap();
    }

    #[tokio::test]
    async fn reads_existing_resultset() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_with_fake_tool(tmp.path(), "exit 0");
        let root = tmp.path().join("billing");
        let body = format!(
            r#"{{"RSpec":{{"coverage":{{"{}":{{"lines":[1,1,0,null,0,0,null,1,1,1]}}}}}}}}"#,
            root.join("app/models/user.rb").display()
        );
        write_resultset(&root, &body);

        let scanner = CoverageScanner::new(settings);
        let app = application("billing", &root);
        assert!(scanner.applies_to(&app));

        let batches = scanner.collect(&app).await.unwrap();
        let issues = &batches[0].issues;
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, Some(Severity::Medium));
        assert_eq!(issues[0].file_path.as_deref(), Some("app/models/user.rb"));
        assert_eq!(issues[1].severity, Some(Severity::Info));
        assert_eq!(batches[0].metadata["overall_coverage"], 62.5);
    }

    #[test]
    fn nothing_to_measure_without_tests_or_data() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_with_fake_tool(tmp.path(), "exit 0");
        let root = tmp.path().join("billing");
        std::fs::create_dir_all(root.join("app")).unwrap();

        let scanner = CoverageScanner::new(settings);
        assert!(!scanner.applies_to(&application("billing", &root)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_test_suite_when_data_missing() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_with_fake_tool(tmp.path(), "exit 0");
        let root = tmp.path().join("billing");
        std::fs::create_dir_all(root.join("test")).unwrap();
        std::fs::create_dir_all(root.join("bin")).unwrap();

        let rails = root.join("bin/rails");
        std::fs::write(
            &rails,
            "#!/bin/sh\n[ \"$COVERAGE\" = \"true\" ] || exit 7\nmkdir -p coverage\necho '{\"RSpec\":{\"coverage\":{}}}' > coverage/.resultset.json\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&rails, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scanner = CoverageScanner::new(settings);
        let batches = scanner.collect(&application("billing", &root)).await.unwrap();
        let issues = &batches[0].issues;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "Overall test coverage: 0.0%");
        assert!(root.join("coverage/.resultset.json").exists());
    }

    #[tokio::test]
    async fn missing_rails_binary_is_spawn_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_with_fake_tool(tmp.path(), "exit 0");
        let root = tmp.path().join("billing");
        std::fs::create_dir_all(root.join("spec")).unwrap();

        // No bin/rails at all.
        let err = CoverageScanner::new(settings)
            .collect(&application("billing", &root))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Spawn { .. }));
    }
}
