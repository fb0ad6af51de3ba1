//! Flog adapter.

use std::path::Path;

use async_trait::async_trait;

use crate::errors::ScanError;
use crate::models::application::Application;
use crate::parsers::Normalizer;
use crate::parsers::complexity::ComplexityNormalizer;
use crate::scanners::process::ToolCommand;
use crate::scanners::{normalize, source_dir, ScanBatch, Scanner, ScannerSettings};

const TOOL: &str = "flog";

pub struct ComplexityScanner {
    settings: ScannerSettings,
    normalizer: ComplexityNormalizer,
}

impl ComplexityScanner {
    pub fn new(settings: ScannerSettings) -> Self {
        Self {
            settings,
            normalizer: ComplexityNormalizer::new(),
        }
    }
}

#[async_trait]
impl Scanner for ComplexityScanner {
    fn name(&self) -> &'static str {
        "complexity"
    }

    fn scan_types(&self) -> &'static [&'static str] {
        &["flog"]
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
