//! Reek JSON output normalizer.
//!
//! Accepts both the grouped shape (`[{"source", "smells": [...]}]`) and the
//! flat list reek emits with `--format json` (`[{"source", "smell_type", ...}]`).

use serde::Deserialize;

use crate::models::issue::NewIssue;
use crate::parsers::severity::CODE_SMELL;
use crate::parsers::{line_number, Normalizer, ParseError, ParseResult};

#[derive(Default)]
pub struct CodeSmellNormalizer;

impl CodeSmellNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Normalizer for CodeSmellNormalizer {
    fn normalize(&self, data: &[u8]) -> Result<ParseResult, anyhow::Error> {
        let entries: Vec<SmellEntry> = serde_json::from_slice(data)?;
        let mut result = ParseResult::default();
        let mut index = 0usize;

        for entry in entries {
            if entry.smells.is_empty() && entry.smell.smell_type.is_some() {
                self.push(&mut result, entry.source.clone(), entry.smell, index);
                index += 1;
                continue;
            }
            for smell in entry.smells {
                self.push(&mut result, entry.source.clone(), smell, index);
                index += 1;
            }
        }

        Ok(result)
    }

    fn scan_type(&self) -> &'static str {
        "reek"
    }
}

#[derive(Debug, Deserialize)]
struct SmellEntry {
    source: Option<String>,
    #[serde(default)]
    smells: Vec<Smell>,
    #[serde(flatten)]
    smell: Smell,
}

#[derive(Debug, Default, Deserialize)]
struct Smell {
    smell_type: Option<String>,
    message: Option<String>,
    #[serde(default)]
    lines: Vec<i64>,
}

impl CodeSmellNormalizer {
    fn push(&self, result: &mut ParseResult, source: Option<String>, smell: Smell, index: usize) {
        match self.convert_smell(source, smell, index) {
            Ok(issue) => result.issues.push(issue),
            Err(err) => result.errors.push(err),
        }
    }

    fn convert_smell(
        &self,
        source: Option<String>,
        smell: Smell,
        index: usize,
    ) -> Result<NewIssue, ParseError> {
        let Some(smell_type) = smell.smell_type.filter(|s| !s.is_empty()) else {
            return Err(ParseError {
                record_index: index,
                field: "smell_type".to_string(),
                message: "Smell without a type".to_string(),
            });
        };
        let message = match smell.message {
            Some(m) if !m.is_empty() => format!("{smell_type}: {m}"),
            _ => smell_type,
        };
        let line = smell.lines.first().copied();

        Ok(NewIssue::new(CODE_SMELL.fallback(), message).at(source, line_number(line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::Severity;

    #[test]
    fn flattens_grouped_smells() {
        let normalizer = CodeSmellNormalizer::new();
        let data = include_bytes!("../../tests/fixtures/reek_sample.json");
        let result = normalizer.normalize(data).unwrap();
        assert_eq!(result.issues.len(), 3);
        assert!(result.errors.is_empty());
        assert!(result
            .issues
            .iter()
            .all(|i| i.severity == Some(Severity::Medium)));
    }

    #[test]
    fn first_line_wins() {
        let normalizer = CodeSmellNormalizer::new();
        let data = include_bytes!("../../tests/fixtures/reek_sample.json");
        let result = normalizer.normalize(data).unwrap();
        let envy = &result.issues[0];
        assert_eq!(envy.message, "FeatureEnvy: User has feature envy of Account");
        assert_eq!(envy.file_path.as_deref(), Some("app/models/user.rb"));
        assert_eq!(envy.line_number, Some(15));
    }

    #[test]
    fn no_lines_means_no_line_number() {
        let normalizer = CodeSmellNormalizer::new();
        let data = include_bytes!("../../tests/fixtures/reek_sample.json");
        let result = normalizer.normalize(data).unwrap();
        let last = result.issues.last().unwrap();
        assert_eq!(last.file_path.as_deref(), Some("app/services/exporter.rb"));
        assert_eq!(last.line_number, None);
    }

    #[test]
    fn accepts_flat_shape() {
        let normalizer = CodeSmellNormalizer::new();
        let data = br#"[
            {"source":"app/a.rb","smell_type":"UtilityFunction","message":"doesn't depend on instance state","lines":[4]},
            {"source":"app/b.rb","smell_type":"DuplicateMethodCall","message":"calls 'x' 2 times","lines":[9, 11]}
        ]"#;
        let result = normalizer.normalize(data).unwrap();
        assert_eq!(result.issues.len(), 2);
        assert_eq!(result.issues[1].line_number, Some(9));
        assert_eq!(result.issues[1].file_path.as_deref(), Some("app/b.rb"));
    }

    #[test]
    fn empty_array_is_clean() {
        let normalizer = CodeSmellNormalizer::new();
        let result = normalizer.normalize(b"[]").unwrap();
        assert!(result.issues.is_empty());
        assert!(result.errors.is_empty());
    }
}
