use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemojibakeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Errors at the analysis engine boundary.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine initialization failed with status {status}")]
    Unavailable { status: i32 },

    #[error("Engine call failed for '{path}': {reason}")]
    CallFailed { path: String, reason: String },

    #[error("Engine reported an error for '{path}': {detail}")]
    AnalysisFailed { path: String, detail: String },

    #[error("Engine returned a malformed result payload for '{path}': {source}")]
    MalformedResult {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Engine returned a malformed metrics payload: {0}")]
    MalformedMetrics(#[source] serde_json::Error),

    #[error("Dictionary enrichment rejected with status {status}")]
    DictionaryRejected { status: i32 },

    #[error("Engine has not been initialized")]
    NotInitialized,
}

/// Errors surfaced by the batch coordinator itself. Per-document failures are
/// never raised through this type; they are absorbed into the outcome stream.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("A job is already active")]
    JobAlreadyActive,

    #[error("Cannot submit an empty batch")]
    EmptyBatch,

    #[error("Invalid processing options: {0}")]
    InvalidOptions(#[from] ConfigError),

    #[error("Bulk processing failed with engine status {status}")]
    BatchFatal { status: i32 },

    #[error("Failed to spawn dispatch thread: {source}")]
    DispatchSpawn {
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory scan failed for '{path}': {source}")]
    WalkFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Scan root '{0}' is not a directory")]
    NotADirectory(PathBuf),
}

pub type Result<T> = std::result::Result<T, DemojibakeError>;
