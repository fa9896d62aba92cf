use std::sync::Mutex;

use serde::Serialize;

use super::outcome::{AnalysisOutcome, AnalysisStatus};

/// Derived statistics over the outcomes recorded so far.
///
/// All averages are zero when no outcomes exist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetrics {
    pub total: usize,
    pub successful: usize,
    pub warnings: usize,
    pub errors: usize,
    pub success_rate: f64,
    pub average_time_ms: f64,
    pub average_confidence: f64,
}

impl BatchMetrics {
    fn empty() -> Self {
        Self {
            total: 0,
            successful: 0,
            warnings: 0,
            errors: 0,
            success_rate: 0.0,
            average_time_ms: 0.0,
            average_confidence: 0.0,
        }
    }
}

/// Append-only store of per-document outcomes for the active job.
///
/// Appends may arrive from engine callback threads in bulk mode; reads always
/// get an owned copy so observers are never exposed to live mutation.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    outcomes: Mutex<Vec<AnalysisOutcome>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one outcome. Insertion order is preserved.
    pub fn append(&self, outcome: AnalysisOutcome) {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(|e| e.into_inner());
        outcomes.push(outcome);
    }

    /// Number of outcomes recorded so far.
    pub fn len(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Owned copy of the outcomes recorded so far.
    pub fn snapshot(&self) -> Vec<AnalysisOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Computes derived statistics from the current contents.
    pub fn metrics(&self) -> BatchMetrics {
        let outcomes = self.outcomes.lock().unwrap_or_else(|e| e.into_inner());
        if outcomes.is_empty() {
            return BatchMetrics::empty();
        }

        let total = outcomes.len();
        let mut successful = 0;
        let mut warnings = 0;
        let mut errors = 0;
        let mut time_sum = 0u64;
        let mut confidence_sum = 0.0;

        for outcome in outcomes.iter() {
            match outcome.status {
                AnalysisStatus::Success => successful += 1,
                AnalysisStatus::Warning => warnings += 1,
                AnalysisStatus::Error => errors += 1,
            }
            time_sum += outcome.processing_time_ms;
            confidence_sum += outcome.confidence;
        }

        BatchMetrics {
            total,
            successful,
            warnings,
            errors,
            success_rate: successful as f64 / total as f64,
            average_time_ms: time_sum as f64 / total as f64,
            average_confidence: confidence_sum / total as f64,
        }
    }

    /// Discards the previous job's outcomes. Called by the coordinator at
    /// submit time only.
    pub(crate) fn clear(&self) {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(|e| e.into_inner());
        outcomes.clear();
    }
}
