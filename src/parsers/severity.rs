//! Severity mapping tables, one per normalizer.
//!
//! Every tool speaks its own vocabulary (native severity, confidence, a
//! numeric score, or nothing at all). Each source gets exactly one total
//! mapping onto the canonical scale; nothing downstream branches on which
//! tool produced an issue.

use crate::models::issue::Severity;

/// Declarative token → severity lookup with an explicit fallback.
#[derive(Debug, Clone, Copy)]
pub struct SeverityTable {
    entries: &'static [(&'static str, Severity)],
    fallback: Severity,
}

impl SeverityTable {
    pub const fn new(entries: &'static [(&'static str, Severity)], fallback: Severity) -> Self {
        Self { entries, fallback }
    }

    /// Case-insensitive lookup; unknown tokens resolve to the fallback.
    pub fn map(&self, token: &str) -> Severity {
        let token = token.trim();
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, severity)| *severity)
            .unwrap_or(self.fallback)
    }

    /// Lookup for fields the tool may omit entirely.
    pub fn map_opt(&self, token: Option<&str>) -> Severity {
        token.map_or(self.fallback, |t| self.map(t))
    }

    pub fn fallback(&self) -> Severity {
        self.fallback
    }
}

/// Lint offenses: native severity.
pub const LINT: SeverityTable = SeverityTable::new(
    &[
        ("fatal", Severity::High),
        ("error", Severity::High),
        ("warning", Severity::Medium),
    ],
    Severity::Low,
);

/// Security warnings: the tool's confidence in the warning.
pub const SECURITY_CONFIDENCE: SeverityTable = SeverityTable::new(
    &[
        ("high", Severity::Critical),
        ("medium", Severity::High),
        ("weak", Severity::Medium),
    ],
    Severity::Low,
);

/// Code smells carry no severity of their own.
pub const CODE_SMELL: SeverityTable = SeverityTable::new(&[], Severity::Medium);

/// Duplication clusters carry no severity of their own.
pub const DUPLICATION: SeverityTable = SeverityTable::new(&[], Severity::Low);

/// Method complexity score thresholds.
pub fn complexity(score: f64) -> Severity {
    if score > 40.0 {
        Severity::High
    } else if score > 20.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Coverage percentage below which a file is reported at all.
pub const COVERAGE_REPORT_THRESHOLD: f64 = 80.0;

/// Severity for a file already known to be under the report threshold.
pub fn coverage(percent: f64) -> Severity {
    if percent < 50.0 {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Parse a numeric token for the threshold-based sources; garbage is `None`.
pub fn numeric_token(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
