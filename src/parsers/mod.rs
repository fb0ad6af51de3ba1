//! Tool output normalizers.
//!
//! Each normalizer implements the `Normalizer` trait, turning one analyzer's
//! raw output (JSON document or line-oriented text) into canonical `NewIssue`
//! records. Normalizers never spawn processes or talk to the database; the
//! only filesystem access is coverage resolving symlinked paths.

pub mod code_smell;
pub mod complexity;
pub mod coverage;
pub mod duplication;
pub mod lint;
pub mod security;
pub mod severity;

use serde_json::{Map, Value};

use crate::models::issue::NewIssue;

/// Result of normalizing one tool run.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub issues: Vec<NewIssue>,
    pub errors: Vec<ParseError>,
    /// Free-form data destined for the scan type's summary row.
    pub metadata: Map<String, Value>,
}

/// A single record that could not be normalized and was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub record_index: usize,
    pub field: String,
    pub message: String,
}

/// Trait for pluggable tool output normalizers.
pub trait Normalizer: Send + Sync {
    /// Normalize raw tool output into canonical issues.
    ///
    /// Fails only when the document as a whole is unreadable; individual bad
    /// records are reported through `ParseResult::errors`.
    fn normalize(&self, data: &[u8]) -> Result<ParseResult, anyhow::Error>;

    /// The scan type the produced issues are stored under.
    fn scan_type(&self) -> &'static str;
}

/// Decode tool output as UTF-8, tolerating stray invalid bytes in text reports.
pub(crate) fn decode_text(data: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(data)
}

/// Convert an optional JSON line number into the stored representation.
pub(crate) fn line_number(value: Option<i64>) -> Option<i32> {
    value.and_then(|n| i32::try_from(n).ok())
}

/// Round to two decimals, the precision stored for percentages and averages.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
