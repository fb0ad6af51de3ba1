//! Reek adapter. Reek only reports on stdout, so stdout is pointed at the
//! scoped output file.

use std::path::Path;

use async_trait::async_trait;

use crate::errors::ScanError;
use crate::models::application::Application;
use crate::parsers::Normalizer;
use crate::parsers::code_smell::CodeSmellNormalizer;
use crate::scanners::process::ToolCommand;
use crate::scanners::{
    normalize, output_file, read_output, source_dir, ScanBatch, Scanner, ScannerSettings,
};

const TOOL: &str = "reek";

pub struct CodeSmellScanner {
    settings: ScannerSettings,
    normalizer: CodeSmellNormalizer,
}

impl CodeSmellScanner {
    pub fn new(settings: ScannerSettings) -> Self {
        Self {
            settings,
            normalizer: CodeSmellNormalizer::new(),
        }
    }
}

#[async_trait]
impl Scanner for CodeSmellScanner {
    fn name(&self) -> &'static str {
        "code_smell"
    }

    fn scan_types(&self) -> &'static [&'static str] {
        &["reek"]
    }

    async fn collect(&self, app: &Application) -> Result<Vec<ScanBatch>, ScanError> {
        let report = output_file(&self.settings, TOOL, app)?;

        let output = ToolCommand::tool(&self.settings, TOOL, Path::new(&app.path))
            .arg(source_dir(app))
            .args(["--format", "json"])
            .stdout_to(report.reopen()?)
            .output()
            .await?;

        let data = read_output(TOOL, &report, &output).await?;
        let result = normalize(&self.normalizer, TOOL, app, &data)?;
        Ok(vec![ScanBatch::from_parse(self.normalizer.scan_type(), result)])
    }
}
