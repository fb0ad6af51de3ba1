//! RuboCop adapter, restricted to cops that flag real defects.

use std::path::Path;

use async_trait::async_trait;

use crate::errors::ScanError;
use crate::models::application::Application;
use crate::parsers::Normalizer;
use crate::parsers::lint::LintNormalizer;
use crate::scanners::process::ToolCommand;
use crate::scanners::{
    normalize, output_file, read_output, source_dir, ScanBatch, Scanner, ScannerSettings,
};

const TOOL: &str = "rubocop";

/// Correctness, security and performance cops. Style cops are left out.
pub const HIGH_VALUE_COPS: &[&str] = &[
    "Lint/Debugger",
    "Lint/UnusedMethodArgument",
    "Lint/UnusedBlockArgument",
    "Lint/UselessAssignment",
    "Lint/ShadowingOuterLocalVariable",
    "Lint/AmbiguousOperator",
    "Lint/Void",
    "Security/Eval",
    "Security/Open",
    "Security/MarshalLoad",
    "Performance/RegexpMatch",
    "Performance/StringReplacement",
    "Performance/RedundantMerge",
    "Rails/OutputSafety",
    "Rails/UniqBeforePluck",
    "Rails/FindEach",
    "Rails/HasManyOrHasOneDependent",
];

pub struct LintScanner {
    settings: ScannerSettings,
    normalizer: LintNormalizer,
}

impl LintScanner {
    pub fn new(settings: ScannerSettings) -> Self {
        Self {
            settings,
            normalizer: LintNormalizer::new(),
        }
    }
}

#[async_trait]
impl Scanner for LintScanner {
    fn name(&self) -> &'static str {
        "lint"
    }

    fn scan_types(&self) -> &'static [&'static str] {
        &["rubocop"]
    }

    async fn collect(&self, app: &Application) -> Result<Vec<ScanBatch>, ScanError> {
        let report = output_file(&self.settings, TOOL, app)?;

        // Exit status 1 means offenses were found; the report decides.
        let output = ToolCommand::tool(&self.settings, TOOL, Path::new(&app.path))
            .arg("--only")
            .arg(HIGH_VALUE_COPS.join(","))
            .args(["--format", "json", "--out"])
            .arg(report.path())
            .arg(source_dir(app))
            .output()
            .await?;

        let data = read_output(TOOL, &report, &output).await?;
        let result = normalize(&self.normalizer, TOOL, app, &data)?;
        Ok(vec![ScanBatch::from_parse(self.normalizer.scan_type(), result)])
    }
}
