use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::broadcast::{ProgressBridge, ProgressEvent};

use super::aggregator::{BatchMetrics, ResultAggregator};
use super::options::ProcessingOptions;
use super::outcome::AnalysisOutcome;

/// Cause attached to a `Failed` terminal state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureCause {
    /// Engine status code, when the failure came from the engine.
    pub status: Option<i32>,
    pub message: String,
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (engine status {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Lifecycle marker of the coordinator's job slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    Cancelling,
    Completed,
    Cancelled,
    Failed(FailureCause),
}

impl JobState {
    /// Running and Cancelling are transient; everything else is stable.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Running | JobState::Cancelling)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Cancelled | JobState::Failed(_)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Idle => write!(f, "idle"),
            JobState::Running => write!(f, "running"),
            JobState::Cancelling => write!(f, "cancelling"),
            JobState::Completed => write!(f, "completed"),
            JobState::Cancelled => write!(f, "cancelled"),
            JobState::Failed(cause) => write!(f, "failed: {}", cause),
        }
    }
}

/// One batch submission. Paths and options are fixed at creation.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub paths: Vec<String>,
    pub options: ProcessingOptions,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(paths: Vec<String>, options: ProcessingOptions) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            paths,
            options,
            submitted_at: Utc::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.paths.len()
    }
}

/// Snapshot-read view over one submitted job.
///
/// The handle never mutates coordinator state; cancellation goes through the
/// coordinator itself.
#[derive(Clone, Debug)]
pub struct JobHandle {
    job_id: String,
    state_rx: watch::Receiver<JobState>,
    aggregator: Arc<ResultAggregator>,
    bridge: Arc<ProgressBridge>,
}

impl JobHandle {
    pub(crate) fn new(
        job_id: String,
        state_rx: watch::Receiver<JobState>,
        aggregator: Arc<ResultAggregator>,
        bridge: Arc<ProgressBridge>,
    ) -> Self {
        Self {
            job_id,
            state_rx,
            aggregator,
            bridge,
        }
    }

    pub fn id(&self) -> &str {
        &self.job_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.state_rx.borrow().clone()
    }

    /// Owned copy of the outcomes recorded so far.
    pub fn snapshot(&self) -> Vec<AnalysisOutcome> {
        self.aggregator.snapshot()
    }

    /// Derived statistics over the outcomes recorded so far.
    pub fn metrics(&self) -> BatchMetrics {
        self.aggregator.metrics()
    }

    /// Subscribes to the progress event stream.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.bridge.subscribe()
    }

    /// Waits until the job reaches a terminal state and returns it.
    ///
    /// Returns the last observed state if the coordinator is dropped while
    /// the job is still in flight.
    pub async fn wait_terminal(&mut self) -> JobState {
        let result = self
            .state_rx
            .wait_for(|state| state.is_terminal())
            .await
            .map(|state| state.clone());
        match result {
            Ok(state) => state,
            Err(_) => self.state_rx.borrow().clone(),
        }
    }
}
