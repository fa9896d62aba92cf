use serde::{Deserialize, Serialize};

/// Status of one analyzed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisStatus::Success => write!(f, "success"),
            AnalysisStatus::Warning => write!(f, "warning"),
            AnalysisStatus::Error => write!(f, "error"),
        }
    }
}

/// Recorded result for one document, including synthesized error results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub path: String,
    pub original_encoding: String,
    pub status: AnalysisStatus,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
    pub processing_time_ms: u64,
    pub issues_found: u32,
    pub corrections_applied: u32,
    /// Present iff `status == Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl AnalysisOutcome {
    /// Synthesizes an error outcome for a document the engine could not
    /// analyze. Keeps the one-outcome-per-path invariant intact.
    pub fn error(path: &str, detail: &str) -> Self {
        Self {
            path: path.to_string(),
            original_encoding: "unknown".to_string(),
            status: AnalysisStatus::Error,
            confidence: 0.0,
            processing_time_ms: 0,
            issues_found: 0,
            corrections_applied: 0,
            error_detail: Some(detail.to_string()),
        }
    }

    /// Builds a minimal outcome from the fields a bulk progress callback
    /// carries. Metric fields the callback does not report stay zero.
    pub fn from_callback(path: &str, status: &str) -> Self {
        let (status, error_detail) = parse_status_string(status);
        Self {
            path: path.to_string(),
            original_encoding: "unknown".to_string(),
            status,
            confidence: 0.0,
            processing_time_ms: 0,
            issues_found: 0,
            corrections_applied: 0,
            error_detail,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Success
    }
}

/// Result payload as the engine serializes it.
///
/// The engine reports status as a free-form string (`"success"`, `"warning"`,
/// or `"error: <detail>"`), so the wire form is kept separate from the domain
/// type and converted explicitly.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireOutcome {
    pub path: String,
    #[serde(default)]
    pub original_encoding: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub processing_time: u64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub issues_found: u32,
    #[serde(default)]
    pub corrections_applied: u32,
}

impl From<WireOutcome> for AnalysisOutcome {
    fn from(wire: WireOutcome) -> Self {
        let (status, error_detail) =
            parse_status_string(wire.status.as_deref().unwrap_or("success"));
        Self {
            path: wire.path,
            original_encoding: wire
                .original_encoding
                .unwrap_or_else(|| "unknown".to_string()),
            status,
            confidence: wire.confidence.clamp(0.0, 1.0),
            processing_time_ms: wire.processing_time,
            issues_found: wire.issues_found,
            corrections_applied: wire.corrections_applied,
            error_detail,
        }
    }
}

/// Maps the engine's free-form status strings onto the domain enum.
fn parse_status_string(status: &str) -> (AnalysisStatus, Option<String>) {
    let trimmed = status.trim();
    let lower = trimmed.to_lowercase();
    if lower.starts_with("error") {
        let detail = trimmed
            .splitn(2, ':')
            .nth(1)
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| trimmed.to_string());
        (AnalysisStatus::Error, Some(detail))
    } else if lower.starts_with("warn") {
        (AnalysisStatus::Warning, None)
    } else {
        (AnalysisStatus::Success, None)
    }
}
