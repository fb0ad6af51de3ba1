//! Flog text report normalizer.
//!
//! The report is line oriented: a header line names a file and its total
//! score, and the indented score lines that follow belong to that file.
//!
//! ```text
//! app/models/user.rb: (45.2)
//!    45.2:  User#complex_method
//!    12.5:  User#another_method
//! ```
//!
//! Every method is recorded, low scores included.

use regex::Regex;

use crate::models::issue::NewIssue;
use crate::parsers::severity::{self, numeric_token};
use crate::parsers::{decode_text, Normalizer, ParseError, ParseResult};

#[derive(Default)]
pub struct ComplexityNormalizer;

impl ComplexityNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Normalizer for ComplexityNormalizer {
    fn normalize(&self, data: &[u8]) -> Result<ParseResult, anyhow::Error> {
        let text = decode_text(data);
        let mut scanner = ReportScanner::new()?;
        let mut result = ParseResult::default();

        for (i, line) in text.lines().enumerate() {
            match scanner.feed(line, i) {
                Ok(Some(issue)) => result.issues.push(issue),
                Ok(None) => {}
                Err(err) => result.errors.push(err),
            }
        }

        if let Some(total) = scanner.total {
            result
                .metadata
                .insert("flog_total".to_string(), total.into());
        }
        result
            .metadata
            .insert("methods_analyzed".to_string(), result.issues.len().into());

        Ok(result)
    }

    fn scan_type(&self) -> &'static str {
        "flog"
    }
}

/// Two-state line scanner: either no file is open yet, or score lines are
/// attributed to `current_file`.
struct ReportScanner {
    header: Regex,
    score: Regex,
    trailing_location: Regex,
    current_file: Option<String>,
    total: Option<f64>,
}

impl ReportScanner {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            header: Regex::new(r"^(\S.*):\s+\(([\d.]+)\)\s*$")?,
            score: Regex::new(r"^\s+(\d+(?:\.\d+)?):\s+(\S.*?)\s*$")?,
            trailing_location: Regex::new(r"^(.*\S)\s+(\S+):(\d+)(?:-\d+)?$")?,
            current_file: None,
            total: None,
        })
    }

    fn feed(&mut self, line: &str, index: usize) -> Result<Option<NewIssue>, ParseError> {
        if let Some(caps) = self.header.captures(line) {
            self.current_file = Some(caps[1].trim().to_string());
            return Ok(None);
        }

        let Some(caps) = self.score.captures(line) else {
            return Ok(None);
        };
        let location = caps[2].to_string();

        if location == "flog total" {
            self.total = numeric_token(&caps[1]);
            return Ok(None);
        }
        if location.starts_with("flog/method average") {
            return Ok(None);
        }

        let score = numeric_token(&caps[1]).ok_or_else(|| ParseError {
            record_index: index,
            field: "score".to_string(),
            message: format!("Unreadable score '{}'", &caps[1]),
        })?;

        // `flog -a` appends `path:start-end` to the method name.
        let (method, file, line_no) = match self.trailing_location.captures(&location) {
            Some(loc) => (
                loc[1].to_string(),
                Some(loc[2].to_string()),
                loc[3].parse::<i32>().ok(),
            ),
            None => (location, None, None),
        };
        let file = self.current_file.clone().or(file);

        Ok(Some(
            NewIssue::new(
                severity::complexity(score),
                format!("Complexity ({score:.1}): {method}"),
            )
            .at(file, line_no)
            .with_metric(score),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::Severity;

    #[test]
    fn attributes_scores_to_current_file() {
        let normalizer = ComplexityNormalizer::new();
        let data = include_bytes!("../../tests/fixtures/flog_sample.txt");
        let result = normalizer.normalize(data).unwrap();
        assert_eq!(result.issues.len(), 3);

        let files: Vec<_> = result
            .issues
            .iter()
            .map(|i| i.file_path.as_deref().unwrap())
            .collect();
        assert_eq!(
            files,
            vec![
                "app/models/user.rb",
                "app/models/user.rb",
                "app/services/processor.rb"
            ]
        );
    }

    #[test]
    fn severities_and_metrics() {
        let normalizer = ComplexityNormalizer::new();
        let data = include_bytes!("../../tests/fixtures/flog_sample.txt");
        let result = normalizer.normalize(data).unwrap();

        let severities: Vec<_> = result.issues.iter().map(|i| i.severity).collect();
        assert_eq!(
            severities,
            vec![Some(Severity::High), Some(Severity::Low), Some(Severity::High)]
        );
        let metrics: Vec<_> = result.issues.iter().map(|i| i.metric_value).collect();
        assert_eq!(metrics, vec![Some(45.2), Some(12.5), Some(52.0)]);
        assert_eq!(
            result.issues[0].message,
            "Complexity (45.2): User#complex_method"
        );
        assert_eq!(result.issues[2].message, "Complexity (52.0): Processor#process");
    }

    #[test]
    fn skips_totals_and_averages() {
        let normalizer = ComplexityNormalizer::new();
        let data = b"   210.3: flog total\n    12.4: flog/method average\n\n    30.1: Report#build\n";
        let result = normalizer.normalize(data).unwrap();
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Some(Severity::Medium));
        assert_eq!(result.issues[0].file_path, None);
        assert_eq!(result.metadata["flog_total"], 210.3);
    }

    #[test]
    fn picks_up_trailing_method_location() {
        let normalizer = ComplexityNormalizer::new();
        let data = b"    41.0: Billing#charge   app/models/billing.rb:12-40\n";
        let result = normalizer.normalize(data).unwrap();
        let issue = &result.issues[0];
        assert_eq!(issue.message, "Complexity (41.0): Billing#charge");
        assert_eq!(issue.file_path.as_deref(), Some("app/models/billing.rb"));
        assert_eq!(issue.line_number, Some(12));
    }

    #[test]
    fn state_does_not_leak_between_parses() {
        let normalizer = ComplexityNormalizer::new();
        let data = include_bytes!("../../tests/fixtures/flog_sample.txt");
        normalizer.normalize(data).unwrap();
        let result = normalizer.normalize(b"    5.0: Lonely#method\n").unwrap();
        assert_eq!(result.issues[0].file_path, None);
    }

}
