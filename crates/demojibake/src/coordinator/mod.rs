//! Batch document processing: job lifecycle, dispatch, result aggregation.

pub mod aggregator;
pub mod batch;
pub mod job;
pub mod options;
pub mod outcome;

pub use aggregator::{BatchMetrics, ResultAggregator};
pub use batch::{BatchCoordinator, DispatchMode};
pub use job::{FailureCause, Job, JobHandle, JobState};
pub use options::ProcessingOptions;
pub use outcome::{AnalysisOutcome, AnalysisStatus};
