//! Thread-safe progress relay between engine callback threads and the
//! single observer.
//!
//! Callbacks arrive on threads the coordinator does not own. The bridge is
//! the only path from those threads to the observer: publication is a short
//! critical section (sequence assignment plus broadcast send under one lock)
//! that never waits on the observer. Buffering is bounded with drop-oldest
//! semantics on overflow — a lagging observer loses intermediate ticks, not
//! the most recent ones, so the terminal progress signal survives any
//! receiver that keeps draining.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One step notification delivered to the observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Job this event belongs to.
    pub job_id: String,
    /// 1-based index, strictly increasing within one job.
    pub sequence: u64,
    /// Total documents in the submission.
    pub total: usize,
    /// Document the engine reported on.
    pub current_path: String,
    /// Engine status string for that document.
    pub status: String,
    /// Timestamp of this event.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct ActiveJob {
    job_id: String,
    total: usize,
    sequence: u64,
}

/// Relays per-document progress from arbitrary threads to one ordered stream.
#[derive(Debug)]
pub struct ProgressBridge {
    sender: Arc<broadcast::Sender<ProgressEvent>>,
    // Sequence assignment and send share this lock so delivery order always
    // matches sequence order.
    active: Mutex<Option<ActiveJob>>,
}

impl ProgressBridge {
    /// Creates a bridge with the given buffer capacity. On overflow the
    /// oldest buffered events are dropped first.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
            active: Mutex::new(None),
        }
    }

    /// Subscribes the observer to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Arms the bridge for a new job: resets the sequence counter and makes
    /// `job_id` the only id whose events are delivered.
    pub fn begin_job(&self, job_id: &str, total: usize) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        *active = Some(ActiveJob {
            job_id: job_id.to_string(),
            total,
            sequence: 0,
        });
    }

    /// Detaches a job from the bridge. Events published for it afterwards are
    /// dropped as stale. No-op if another job is already active.
    pub fn retire_job(&self, job_id: &str) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().is_some_and(|j| j.job_id == job_id) {
            *active = None;
        }
    }

    /// Publishes one progress tick. Safe to call from any thread; never
    /// blocks on the observer. Returns `false` when the event was dropped
    /// because `job_id` is not the active job.
    pub fn publish(&self, job_id: &str, current_path: &str, status: &str) -> bool {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let Some(job) = active.as_mut() else {
            debug!("Dropping progress event for '{}': no active job", job_id);
            return false;
        };
        if job.job_id != job_id {
            debug!(
                "Dropping stale progress event for job '{}' (active: '{}')",
                job_id, job.job_id
            );
            return false;
        }

        job.sequence += 1;
        let event = ProgressEvent {
            job_id: job.job_id.clone(),
            sequence: job.sequence,
            total: job.total,
            current_path: current_path.to_string(),
            status: status.to_string(),
            timestamp: Utc::now(),
        };

        // No active receivers is fine
        let _ = self.sender.send(event);
        true
    }

    /// Sequence index of the last delivered event for the active job.
    pub fn last_sequence(&self) -> u64 {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.as_ref().map(|j| j.sequence).unwrap_or(0)
    }
}
