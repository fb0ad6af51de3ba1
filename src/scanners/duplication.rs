//! Flay adapter.

use std::path::Path;

use async_trait::async_trait;

use crate::errors::ScanError;
use crate::models::application::Application;
use crate::parsers::Normalizer;
use crate::parsers::duplication::DuplicationNormalizer;
use crate::scanners::process::ToolCommand;
use crate::scanners::{normalize, source_dir, ScanBatch, Scanner, ScannerSettings};

const TOOL: &str = "flay";

pub struct DuplicationScanner {
    settings: ScannerSettings,
    normalizer: DuplicationNormalizer,
}

impl DuplicationScanner {
    pub fn new(settings: ScannerSettings) -> Self {
        Self {
            settings,
            normalizer: DuplicationNormalizer::new(),
        }
    }
}

#[async_trait]
impl Scanner for DuplicationScanner {
    fn name(&self) -> &'static str {
        "duplication"
    }

    fn scan_types(&self) -> &'static [&'static str] {
        &["flay"]
    }

    async fn collect(&self, app: &Application) -> Result<Vec<ScanBatch>, ScanError> {
        let report = ToolCommand::tool(&self.settings, TOOL, Path::new(&app.path))
            .arg(source_dir(app))
            .output()
            .await?
            .into_report(TOOL)?;

        let result = normalize(&self.normalizer, TOOL, app, &report)?;
        Ok(vec![ScanBatch::from_parse(self.normalizer.scan_type(), result)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanners::test_support::*;

    #[tokio::test]
    async fn parses_stdout_report() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/flay_sample.txt");
        let settings = settings_with_fake_tool(tmp.path(), &format!("cat '{fixture}'\n"));
        let app_dir = tmp.path().join("billing");
        std::fs::create_dir(&app_dir).unwrap();

        let batches = DuplicationScanner::new(settings)
            .collect(&application("billing", &app_dir))
            .await
            .unwrap();
        assert_eq!(batches[0].scan_type, "flay");
        assert_eq!(batches[0].issues.len(), 2);
    }

    #[tokio::test]
    async fn missing_tool_is_spawn_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = settings_with_fake_tool(tmp.path(), "");
        settings.runner = vec!["no-such-runner-binary".to_string()];
        let app_dir = tmp.path().join("billing");
        std::fs::create_dir(&app_dir).unwrap();

        let err = DuplicationScanner::new(settings)
            .collect(&application("billing", &app_dir))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Spawn { .. }));
    }
}
