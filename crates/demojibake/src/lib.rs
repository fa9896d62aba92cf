pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod scanner;

pub use broadcast::{ProgressBridge, ProgressEvent};
pub use config::{load_config, load_config_from_str, Config, ProgressConfig, ScanConfig};
pub use coordinator::{
    AnalysisOutcome, AnalysisStatus, BatchCoordinator, BatchMetrics, DispatchMode, FailureCause,
    JobHandle, JobState, ProcessingOptions, ResultAggregator,
};
pub use engine::{EngineApi, EngineClient, ProgressCallback};
pub use error::{
    ConfigError, CoordinatorError, DemojibakeError, EngineError, Result, ScanError,
};
pub use scanner::DocumentScanner;

#[cfg(feature = "native-engine")]
pub use engine::NativeEngine;
