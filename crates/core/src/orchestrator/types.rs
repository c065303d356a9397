//! Types for the theme orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::StoreError;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Dedup store could not be read or updated.
    #[error("dedup store error: {0}")]
    Store(#[from] StoreError),
}

/// Per-provider fetch counts for one show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTally {
    /// Written or skipped.
    pub succeeded: usize,
    /// Of `succeeded`, how many already existed.
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}

/// What happened to one show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ShowOutcome {
    /// Another run holds the show.
    InFlight,
    /// Show root directory does not exist.
    MissingRoot,
    /// Dedup store says there is nothing left to do.
    AlreadySatisfied,
    /// A provider supplied resources.
    Completed {
        provider: String,
        tally: FetchTally,
        /// Whether the show was recorded as satisfied.
        marked: bool,
    },
    /// No provider had anything.
    Unresolved,
}

impl ShowOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            ShowOutcome::InFlight => "in_flight",
            ShowOutcome::MissingRoot => "missing_root",
            ShowOutcome::AlreadySatisfied => "already_satisfied",
            ShowOutcome::Completed { .. } => "completed",
            ShowOutcome::Unresolved => "unresolved",
        }
    }
}

/// Outcome counts for a batch of shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub shows: usize,
    pub in_flight: usize,
    pub missing_root: usize,
    pub already_satisfied: usize,
    pub completed: usize,
    pub unresolved: usize,
    pub errors: usize,
}

impl BatchReport {
    pub fn record(&mut self, result: &Result<ShowOutcome, OrchestratorError>) {
        self.shows += 1;
        match result {
            Ok(ShowOutcome::InFlight) => self.in_flight += 1,
            Ok(ShowOutcome::MissingRoot) => self.missing_root += 1,
            Ok(ShowOutcome::AlreadySatisfied) => self.already_satisfied += 1,
            Ok(ShowOutcome::Completed { .. }) => self.completed += 1,
            Ok(ShowOutcome::Unresolved) => self.unresolved += 1,
            Err(_) => self.errors += 1,
        }
    }
}

/// Record of the most recent sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSummary {
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<BatchReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization() {
        let outcome = ShowOutcome::Completed {
            provider: "plex".to_string(),
            tally: FetchTally {
                succeeded: 1,
                skipped: 0,
                failed: 0,
                total: 1,
            },
            marked: true,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "completed");
        assert_eq!(json["provider"], "plex");
        assert_eq!(json["tally"]["total"], 1);

        let json = serde_json::to_value(ShowOutcome::MissingRoot).unwrap();
        assert_eq!(json["outcome"], "missing_root");
    }

    #[test]
    fn test_batch_report_record() {
        let mut report = BatchReport::default();
        report.record(&Ok(ShowOutcome::Unresolved));
        report.record(&Ok(ShowOutcome::AlreadySatisfied));
        report.record(&Ok(ShowOutcome::AlreadySatisfied));
        report.record(&Err(OrchestratorError::Store(StoreError::Corrupt {
            name: "theme-songs".to_string(),
            reason: "eof".to_string(),
        })));

        assert_eq!(report.shows, 4);
        assert_eq!(report.unresolved, 1);
        assert_eq!(report.already_satisfied, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.completed, 0);
    }
}
