//! Brakeman adapter.

use std::path::Path;

use async_trait::async_trait;

use crate::errors::ScanError;
use crate::models::application::Application;
use crate::parsers::Normalizer;
use crate::parsers::security::SecurityNormalizer;
use crate::scanners::process::ToolCommand;
use crate::scanners::{normalize, output_file, read_output, ScanBatch, Scanner, ScannerSettings};

const TOOL: &str = "brakeman";

pub struct SecurityScanner {
    settings: ScannerSettings,
    normalizer: SecurityNormalizer,
}

impl SecurityScanner {
    pub fn new(settings: ScannerSettings) -> Self {
        Self {
            settings,
            normalizer: SecurityNormalizer::new(),
        }
    }
}

#[async_trait]
impl Scanner for SecurityScanner {
    fn name(&self) -> &'static str {
        "security"
    }

    fn scan_types(&self) -> &'static [&'static str] {
        &["security"]
    }

    async fn collect(&self, app: &Application) -> Result<Vec<ScanBatch>, ScanError> {
        let root = Path::new(&app.path);
        let report = output_file(&self.settings, TOOL, app)?;

        // Brakeman analyzes the whole Rails tree, not just app/.
        let output = ToolCommand::tool(&self.settings, TOOL, root)
            .arg(root)
            .args(["-q", "-f", "json", "-o"])
            .arg(report.path())
            .output()
            .await?;

        let data = read_output(TOOL, &report, &output).await?;
        let result = normalize(&self.normalizer, TOOL, app, &data)?;
        Ok(vec![ScanBatch::from_parse(self.normalizer.scan_type(), result)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanners::test_support::*;

    #[tokio::test]
    async fn collects_warnings_from_report_file() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/brakeman_sample.json");
        let script = format!(
            "while [ $# -gt 0 ]; do if [ \"$1\" = \"-o\" ]; then out=\"$2\"; fi; shift; done\ncat '{fixture}' > \"$out\"\nexit 3\n"
        );
        let settings = settings_with_fake_tool(tmp.path(), &script);
        let app_dir = tmp.path().join("billing");
        std::fs::create_dir(&app_dir).unwrap();

        let batches = SecurityScanner::new(settings)
            .collect(&application("billing", &app_dir))
            .await
            .unwrap();
        assert_eq!(batches[0].scan_type, "security");
        assert_eq!(batches[0].issues.len(), 3);
        assert_eq!(batches[0].metadata["rails_version"], "7.1.3");
    }

    #[tokio::test]
    async fn crash_without_report_is_tool_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_with_fake_tool(tmp.path(), "echo 'Not a Rails application' >&2\nexit 4\n");
        let app_dir = tmp.path().join("billing");
        std::fs::create_dir(&app_dir).unwrap();

        let err = SecurityScanner::new(settings)
            .collect(&application("billing", &app_dir))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ToolFailed { .. }));
        assert!(err.to_string().contains("Not a Rails application"));
    }
}
