//! Line coverage normalizer.
//!
//! Reads either a plain `{path: [hits...]}` map or SimpleCov's
//! `.resultset.json` (`{suite: {"coverage": {path: {"lines": [...]}}}}`).
//! A `null` hit marks a non-executable line, `0` an uncovered one.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde_json::{Map, Value};

use crate::models::issue::{NewIssue, Severity};
use crate::parsers::severity::{self, COVERAGE_REPORT_THRESHOLD};
use crate::parsers::{round2, Normalizer, ParseError, ParseResult};

pub struct CoverageNormalizer {
    app_root: PathBuf,
    /// `app_root` with symlinks resolved, when it exists on disk.
    canonical_root: Option<PathBuf>,
}

impl CoverageNormalizer {
    pub fn new(app_root: impl Into<PathBuf>) -> Self {
        let app_root = app_root.into();
        let canonical_root = std::fs::canonicalize(&app_root).ok();
        Self {
            app_root,
            canonical_root,
        }
    }

    /// Path relative to the application root, or `None` when the file lies
    /// outside it or under a test directory.
    fn relative_path(&self, path: &str) -> Option<String> {
        let path = Path::new(path);
        let relative = if path.is_absolute() {
            self.strip_root(path)?
        } else {
            path.to_path_buf()
        };

        let in_test_dir = relative.components().any(|c| match c {
            Component::Normal(part) => part == "test" || part == "spec",
            _ => false,
        });
        if in_test_dir || relative.as_os_str().is_empty() {
            return None;
        }
        Some(relative.to_string_lossy().into_owned())
    }

    /// Strip the root lexically, then again with symlinks resolved on both
    /// sides. Entries that no longer exist are compared as written.
    fn strip_root(&self, path: &Path) -> Option<PathBuf> {
        if let Ok(relative) = path.strip_prefix(&self.app_root) {
            return Some(relative.to_path_buf());
        }
        let root = self.canonical_root.as_deref()?;
        let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        resolved.strip_prefix(root).ok().map(Path::to_path_buf)
    }
}

impl Normalizer for CoverageNormalizer {
    fn normalize(&self, data: &[u8]) -> Result<ParseResult, anyhow::Error> {
        let document: Map<String, Value> = serde_json::from_slice(data)?;
        let mut result = ParseResult::default();
        let mut files: BTreeMap<String, Vec<Option<u64>>> = BTreeMap::new();

        for (i, (path, lines)) in coverage_entries(&document).into_iter().enumerate() {
            let Some(hits) = line_hits(lines) else {
                result.errors.push(ParseError {
                    record_index: i,
                    field: "lines".to_string(),
                    message: format!("No line data for {path}"),
                });
                continue;
            };
            let Some(relative) = self.relative_path(path) else {
                continue;
            };
            merge_hits(files.entry(relative).or_default(), &hits);
        }

        let mut covered_total = 0u64;
        let mut executable_total = 0u64;
        let mut files_analyzed = 0u64;

        for (path, hits) in &files {
            let executable = hits.iter().filter(|h| h.is_some()).count() as u64;
            if executable == 0 {
                continue;
            }
            let covered = hits.iter().filter(|h| matches!(h, Some(n) if *n > 0)).count() as u64;
            files_analyzed += 1;
            covered_total += covered;
            executable_total += executable;

            let percent = covered as f64 / executable as f64 * 100.0;
            if percent < COVERAGE_REPORT_THRESHOLD {
                result.issues.push(
                    NewIssue::new(
                        severity::coverage(percent),
                        format!("Low test coverage: {percent:.1}% ({covered}/{executable} lines)"),
                    )
                    .at(Some(path.clone()), None)
                    .with_metric(round2(percent)),
                );
            }
        }

        let overall = if executable_total == 0 {
            0.0
        } else {
            round2(covered_total as f64 / executable_total as f64 * 100.0)
        };
        result.issues.push(
            NewIssue::new(Severity::Info, format!("Overall test coverage: {overall:.1}%"))
                .with_metric(overall),
        );

        result
            .metadata
            .insert("overall_coverage".to_string(), overall.into());
        result
            .metadata
            .insert("files_analyzed".to_string(), files_analyzed.into());
        result
            .metadata
            .insert("covered_lines".to_string(), covered_total.into());
        result
            .metadata
            .insert("executable_lines".to_string(), executable_total.into());

        Ok(result)
    }

    fn scan_type(&self) -> &'static str {
        "test_coverage"
    }
}

/// Flatten both accepted shapes into `(path, line data)` pairs.
fn coverage_entries(document: &Map<String, Value>) -> Vec<(&str, &Value)> {
    let is_resultset = !document.is_empty()
        && document
            .values()
            .all(|suite| suite.get("coverage").is_some_and(Value::is_object));

    if !is_resultset {
        return document.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }

    document
        .values()
        .filter_map(|suite| suite.get("coverage").and_then(Value::as_object))
        .flat_map(|files| files.iter().map(|(k, v)| (k.as_str(), v)))
        .collect()
}

fn line_hits(value: &Value) -> Option<Vec<Option<u64>>> {
    let lines = match value {
        Value::Array(lines) => lines,
        Value::Object(file) => file.get("lines")?.as_array()?,
        _ => return None,
    };
    Some(lines.iter().map(Value::as_u64).collect())
}

/// Sum per-line hits from several suites; a line is executable if any suite
/// says so.
fn merge_hits(into: &mut Vec<Option<u64>>, hits: &[Option<u64>]) {
    if into.len() < hits.len() {
        into.resize(hits.len(), None);
    }
    for (slot, hit) in into.iter_mut().zip(hits) {
        *slot = match (*slot, *hit) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> CoverageNormalizer {
        CoverageNormalizer::new("/srv/apps/billing")
    }

    #[test]
    fn eight_executable_five_covered_is_medium() {
        let data = br#"{"/srv/apps/billing/app/models/user.rb": [1,1,0,null,0,0,null,1,1,1]}"#;
        let result = normalizer().normalize(data).unwrap();
        assert_eq!(result.issues.len(), 2);

        let file = &result.issues[0];
        assert_eq!(file.severity, Some(Severity::Medium));
        assert_eq!(file.metric_value, Some(62.5));
        assert_eq!(file.file_path.as_deref(), Some("app/models/user.rb"));
        assert_eq!(file.message, "Low test coverage: 62.5% (5/8 lines)");

        let overall = &result.issues[1];
        assert_eq!(overall.severity, Some(Severity::Info));
        assert_eq!(overall.message, "Overall test coverage: 62.5%");
        assert_eq!(overall.file_path, None);
    }

    #[test]
    fn reads_simplecov_resultset() {
        let data = include_bytes!("../../tests/fixtures/simplecov_resultset.json");
        let result = normalizer().normalize(data).unwrap();

        let files: Vec<_> = result
            .issues
            .iter()
            .filter_map(|i| i.file_path.as_deref())
            .collect();
        assert_eq!(files, vec!["app/models/ledger.rb", "app/models/user.rb"]);
        assert_eq!(result.issues[0].severity, Some(Severity::High));
        assert_eq!(result.issues[0].metric_value, Some(25.0));

        assert_eq!(result.metadata["files_analyzed"], 3);
        assert_eq!(result.metadata["covered_lines"], 12);
        assert_eq!(result.metadata["executable_lines"], 18);
        assert_eq!(result.metadata["overall_coverage"], 66.67);
    }

    #[test]
    fn exactly_one_aggregate_issue() {
        let data = include_bytes!("../../tests/fixtures/simplecov_resultset.json");
        let result = normalizer().normalize(data).unwrap();
        let info: Vec<_> = result
            .issues
            .iter()
            .filter(|i| i.severity == Some(Severity::Info))
            .collect();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].metric_value, Some(66.67));
    }

    #[test]
    fn merges_suites_by_summing_hits() {
        let data = br#"{
            "RSpec":    {"coverage": {"/srv/apps/billing/app/a.rb": {"lines": [1, 0, 0, null]}}},
            "Minitest": {"coverage": {"/srv/apps/billing/app/a.rb": {"lines": [0, 2, 0, null]}}}
        }"#;
        let result = normalizer().normalize(data).unwrap();
        assert_eq!(result.metadata["covered_lines"], 2);
        assert_eq!(result.metadata["executable_lines"], 3);
        assert_eq!(result.issues[0].metric_value, Some(66.67));
    }

    #[test]
    fn skips_test_dirs_and_foreign_files() {
        let data = br#"{
            "/srv/apps/billing/test/models/user_test.rb": [0, 0],
            "/srv/apps/billing/spec/support/helper.rb": [0],
            "/opt/gems/rack.rb": [0, 0, 0]
        }"#;
        let result = normalizer().normalize(data).unwrap();
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.metadata["files_analyzed"], 0);
        assert_eq!(result.metadata["overall_coverage"], 0.0);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_root_matches_resolved_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let base = std::fs::canonicalize(tmp.path()).unwrap();
        let release = base.join("releases/20260101");
        std::fs::create_dir_all(release.join("app/models")).unwrap();
        std::fs::write(release.join("app/models/user.rb"), "class User; end\n").unwrap();
        let current = base.join("current");
        std::os::unix::fs::symlink(&release, &current).unwrap();

        let real = release.join("app/models/user.rb");
        let linked = current.join("app/models/user.rb");
        let data = serde_json::json!({
            "RSpec": {"coverage": {
                real.to_str().unwrap(): {"lines": [1, 0, null]},
                linked.to_str().unwrap(): {"lines": [0, 0, null]}
            }}
        });

        let result = CoverageNormalizer::new(current.clone())
            .normalize(data.to_string().as_bytes())
            .unwrap();
        assert_eq!(result.metadata["files_analyzed"], 1);
        assert_eq!(result.metadata["covered_lines"], 1);
        assert_eq!(result.metadata["executable_lines"], 2);
        assert_eq!(result.issues[0].file_path.as_deref(), Some("app/models/user.rb"));
    }

    #[test]
    fn test_named_files_outside_test_dirs_count() {
        let data = br#"{"/srv/apps/billing/app/models/test_result.rb": [1, 0]}"#;
        let result = normalizer().normalize(data).unwrap();
        assert_eq!(result.metadata["files_analyzed"], 1);
    }

    #[test]
    fn zero_executable_files_are_skipped() {
        let data = br#"{"/srv/apps/billing/app/models/concern.rb": [null, null]}"#;
        let result = normalizer().normalize(data).unwrap();
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.metadata["files_analyzed"], 0);
    }

    #[test]
    fn malformed_entry_is_reported() {
        let data = br#"{"/srv/apps/billing/app/a.rb": "oops", "/srv/apps/billing/app/b.rb": [1]}"#;
        let result = normalizer().normalize(data).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.metadata["files_analyzed"], 1);
    }

    #[test]
    fn rejects_non_object_document() {
        assert!(normalizer().normalize(b"[1, 2, 3]").is_err());
    }
}
