//! Flay text report normalizer.

use regex::Regex;

use crate::models::issue::NewIssue;
use crate::parsers::severity::DUPLICATION;
use crate::parsers::{decode_text, Normalizer, ParseResult};

#[derive(Default)]
pub struct DuplicationNormalizer;

impl DuplicationNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Normalizer for DuplicationNormalizer {
    fn normalize(&self, data: &[u8]) -> Result<ParseResult, anyhow::Error> {
        let text = decode_text(data);
        let mut scanner = ReportScanner::new()?;

        for line in text.lines() {
            scanner.feed(line);
        }

        let mut result = ParseResult::default();
        if let Some(total) = scanner.total {
            result
                .metadata
                .insert("flay_total".to_string(), total.into());
        }
        result.issues = scanner.issues;
        Ok(result)
    }

    fn scan_type(&self) -> &'static str {
        "flay"
    }
}

/// Either outside any finding, or inside the finding at `current`.
struct ReportScanner {
    location: Regex,
    total_score: Regex,
    issues: Vec<NewIssue>,
    current: Option<usize>,
    total: Option<i64>,
}

impl ReportScanner {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            location: Regex::new(r"^\s*(\S.*\.rb):(\d+)")?,
            total_score: Regex::new(r"^Total score \(lower is better\) = (\d+)")?,
            issues: Vec::new(),
            current: None,
            total: None,
        })
    }

    fn feed(&mut self, line: &str) {
        if line.contains("Similar code found") || line.contains("IDENTICAL code found") {
            self.issues
                .push(NewIssue::new(DUPLICATION.fallback(), line.trim()));
            self.current = Some(self.issues.len() - 1);
            return;
        }

        if let Some(caps) = self.total_score.captures(line) {
            self.total = caps[1].parse().ok();
            return;
        }

        let Some(index) = self.current else {
            return;
        };
        let Some(caps) = self.location.captures(line) else {
            return;
        };
        let issue = &mut self.issues[index];
        if issue.file_path.is_none() {
            issue.file_path = Some(caps[1].to_string());
            issue.line_number = caps[2].parse().ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::Severity;

    #[test]
    fn one_issue_per_finding() {
        let normalizer = DuplicationNormalizer::new();
        let data = include_bytes!("../../tests/fixtures/flay_sample.txt");
        let result = normalizer.normalize(data).unwrap();
        assert_eq!(result.issues.len(), 2);
        assert!(result
            .issues
            .iter()
            .all(|i| i.severity == Some(Severity::Low)));
        assert_eq!(result.metadata["flay_total"], 114);
    }

    #[test]
    fn first_location_wins() {
        let normalizer = DuplicationNormalizer::new();
        let data = include_bytes!("../../tests/fixtures/flay_sample.txt");
        let result = normalizer.normalize(data).unwrap();

        let first = &result.issues[0];
        assert_eq!(first.message, "1) Similar code found in :defn (mass = 50)");
        assert_eq!(first.file_path.as_deref(), Some("app/models/user.rb"));
        assert_eq!(first.line_number, Some(25));

        let second = &result.issues[1];
        assert!(second.message.contains("IDENTICAL code found"));
        assert_eq!(
            second.file_path.as_deref(),
            Some("app/controllers/a_controller.rb")
        );
        assert_eq!(second.line_number, Some(10));
    }

    #[test]
    fn locations_before_any_finding_are_ignored() {
        let normalizer = DuplicationNormalizer::new();
        let data = b"  app/models/stray.rb:3\nSimilar code found in :call (mass = 32)\n  app/a.rb:7\n";
        let result = normalizer.normalize(data).unwrap();
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].file_path.as_deref(), Some("app/a.rb"));
        assert_eq!(result.issues[0].line_number, Some(7));
    }

    #[test]
    fn location_paths_may_contain_spaces() {
        let normalizer = DuplicationNormalizer::new();
        let data = b"Similar code found in :defn (mass = 36)\n  app/legacy models/invoice.rb:14\n  app/models/invoice.rb:9\n";
        let result = normalizer.normalize(data).unwrap();
        assert_eq!(
            result.issues[0].file_path.as_deref(),
            Some("app/legacy models/invoice.rb")
        );
        assert_eq!(result.issues[0].line_number, Some(14));
    }

    #[test]
    fn finding_without_locations_has_no_file() {
        let normalizer = DuplicationNormalizer::new();
        let result = normalizer
            .normalize(b"Similar code found in :iter (mass = 40)\n")
            .unwrap();
        assert_eq!(result.issues[0].file_path, None);
        assert_eq!(result.issues[0].line_number, None);
    }

    #[test]
    fn clean_report_yields_nothing() {
        let normalizer = DuplicationNormalizer::new();
        let result = normalizer
            .normalize(b"Total score (lower is better) = 0\n")
            .unwrap();
        assert!(result.issues.is_empty());
        assert_eq!(result.metadata["flay_total"], 0);
    }
}
