//! Per-report ingestion summary with a bounded diagnostic log.

use serde::{Deserialize, Serialize};

/// Maximum number of diagnostics kept in a summary's error log.
pub const MAX_ERROR_DETAILS: usize = 100;

/// A soft, per-line diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiagnostic {
    /// 1-based line number within the report.
    pub line_number: usize,
    /// The raw line as received.
    pub line: String,
    pub message: String,
}

/// Statistics and diagnostics for one ingested report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionSummary {
    pub total_lines: usize,
    pub processed_lines: usize,
    pub skipped_lines: usize,
    pub upserted_results: usize,
    pub errors: Vec<LineDiagnostic>,
    /// Diagnostics that did not fit in `errors`.
    #[serde(skip)]
    pub dropped_errors: usize,
}

impl IngestionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic, or count it as dropped once the log is full.
    pub fn record_error(&mut self, line_number: usize, line: &str, message: impl Into<String>) {
        if self.errors.len() >= MAX_ERROR_DETAILS {
            self.dropped_errors += 1;
            return;
        }
        self.errors.push(LineDiagnostic {
            line_number,
            line: line.to_string(),
            message: message.into(),
        });
    }

    /// Total diagnostics raised, logged or not.
    pub fn diagnostic_count(&self) -> usize {
        self.errors.len() + self.dropped_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_log_is_capped() {
        let mut summary = IngestionSummary::new();
        for n in 1..=MAX_ERROR_DETAILS + 25 {
            summary.record_error(n, "bad", "Empty line");
        }
        assert_eq!(summary.errors.len(), MAX_ERROR_DETAILS);
        assert_eq!(summary.dropped_errors, 25);
        assert_eq!(summary.diagnostic_count(), MAX_ERROR_DETAILS + 25);
        assert_eq!(summary.errors.last().unwrap().line_number, MAX_ERROR_DETAILS);
    }

    #[test]
    fn serializes_without_dropped_counter() {
        let mut summary = IngestionSummary::new();
        summary.total_lines = 1;
        summary.record_error(1, "", "Empty line");
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "total_lines": 1,
                "processed_lines": 0,
                "skipped_lines": 0,
                "upserted_results": 0,
                "errors": [{"line_number": 1, "line": "", "message": "Empty line"}],
            })
        );
    }
}
