use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Immutable configuration for one batch job.
///
/// Serializes to the engine's expected wire form:
/// `{aggressiveMode, backupFiles, confidenceThreshold, useDictionary, parallel}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    /// Apply corrections even below the confidence threshold.
    pub aggressive_mode: bool,
    /// Write a backup copy before correcting a document in place.
    pub backup_files: bool,
    /// Minimum confidence required to apply a correction, in `[0, 1]`.
    pub confidence_threshold: f64,
    /// Consult the language dictionary during analysis.
    pub use_dictionary: bool,
    /// Hint that the engine may parallelize internally.
    pub parallel: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            aggressive_mode: false,
            backup_files: true,
            confidence_threshold: 0.8,
            use_dictionary: true,
            parallel: true,
        }
    }
}

impl ProcessingOptions {
    pub fn with_aggressive_mode(mut self, aggressive: bool) -> Self {
        self.aggressive_mode = aggressive;
        self
    }

    pub fn with_backup_files(mut self, backup: bool) -> Self {
        self.backup_files = backup;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_use_dictionary(mut self, use_dictionary: bool) -> Self {
        self.use_dictionary = use_dictionary;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Checks the invariants a job submission relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Validation {
                message: format!(
                    "confidenceThreshold must be within [0, 1], got {}",
                    self.confidence_threshold
                ),
            });
        }
        Ok(())
    }
}
