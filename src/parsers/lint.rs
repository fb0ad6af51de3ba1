//! RuboCop JSON formatter output normalizer.

use serde::Deserialize;

use crate::models::issue::NewIssue;
use crate::parsers::severity::LINT;
use crate::parsers::{line_number, Normalizer, ParseResult};

#[derive(Default)]
pub struct LintNormalizer;

impl LintNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Normalizer for LintNormalizer {
    fn normalize(&self, data: &[u8]) -> Result<ParseResult, anyhow::Error> {
        let report: LintReport = serde_json::from_slice(data)?;
        let mut result = ParseResult::default();

        for file in report.files {
            for offense in file.offenses {
                result.issues.push(convert_offense(&file.path, offense));
            }
        }

        if let Some(summary) = report.summary {
            if let Some(count) = summary.inspected_file_count {
                result
                    .metadata
                    .insert("inspected_files".to_string(), count.into());
            }
        }

        Ok(result)
    }

    fn scan_type(&self) -> &'static str {
        "rubocop"
    }
}

#[derive(Debug, Deserialize)]
struct LintReport {
    #[serde(default)]
    files: Vec<LintFile>,
    summary: Option<LintSummary>,
}

#[derive(Debug, Deserialize)]
struct LintSummary {
    inspected_file_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LintFile {
    path: Option<String>,
    #[serde(default)]
    offenses: Vec<LintOffense>,
}

#[derive(Debug, Deserialize)]
struct LintOffense {
    severity: Option<String>,
    message: Option<String>,
    cop_name: Option<String>,
    location: Option<LintLocation>,
}

#[derive(Debug, Deserialize)]
struct LintLocation {
    start_line: Option<i64>,
    line: Option<i64>,
}

/// Every offense becomes an issue; missing cop or message parts are empty.
fn convert_offense(path: &Option<String>, offense: LintOffense) -> NewIssue {
    let message = format!(
        "{}: {}",
        offense.cop_name.unwrap_or_default(),
        offense.message.unwrap_or_default()
    );
    let line = offense
        .location
        .and_then(|loc| loc.start_line.or(loc.line));

    NewIssue::new(LINT.map_opt(offense.severity.as_deref()), message).at(path.clone(), line_number(line))
}
