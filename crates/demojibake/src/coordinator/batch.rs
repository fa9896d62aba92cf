//! Batch job lifecycle, dispatch, cancellation, and failure isolation.
//!
//! One coordinator owns at most one active job. The dispatch loop (or the
//! single bulk call) runs on a dedicated background thread; the observer only
//! ever sees snapshot reads, watch-channel state changes, and bridge events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info_span;

use crate::broadcast::ProgressBridge;
use crate::engine::{EngineClient, BATCH_SUCCESS};
use crate::error::{CoordinatorError, EngineError};

use super::aggregator::ResultAggregator;
use super::job::{FailureCause, Job, JobHandle, JobState};
use super::options::ProcessingOptions;
use super::outcome::AnalysisOutcome;

/// How a job's documents reach the engine.
///
/// The observable contract (outcomes, progress events, terminal states) is
/// identical either way; only the call pattern differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One engine call per document, in submission order, from the dispatch
    /// thread. Per-document failures never abort the job.
    Iterative,
    /// One engine call for the whole collection; the engine reports progress
    /// from its own threads in completion order. A nonzero return fails the
    /// whole job.
    Bulk,
}

struct ActiveJob {
    job_id: String,
    state_tx: watch::Sender<JobState>,
    cancel: Arc<AtomicBool>,
    dispatch: Option<JoinHandle<()>>,
}

struct Shared {
    engine: Arc<EngineClient>,
    aggregator: Arc<ResultAggregator>,
    bridge: Arc<ProgressBridge>,
    slot: Mutex<Option<ActiveJob>>,
}

impl Shared {
    /// Appends an outcome only while `job_id` is still the coordinator's
    /// current job. The check and the append happen under the slot lock so a
    /// concurrent `submit` cannot clear and re-own the aggregator between
    /// them; a stale outcome never lands in the next job's results. Returns
    /// `false` when the outcome was absorbed.
    fn append_if_current(&self, job_id: &str, outcome: AnalysisOutcome) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|j| j.job_id == job_id) {
            self.aggregator.append(outcome);
            true
        } else {
            false
        }
    }
}

/// Applies a terminal or transitional state only while the job is still
/// active. Keeps a racing `cancel()` from being overwritten and terminal
/// states from regressing.
fn transition(state_tx: &watch::Sender<JobState>, next: JobState) -> bool {
    state_tx.send_if_modified(|state| {
        if state.is_active() {
            *state = next;
            true
        } else {
            false
        }
    })
}

pub struct BatchCoordinator {
    shared: Arc<Shared>,
    mode: DispatchMode,
}

impl BatchCoordinator {
    /// Builds a coordinator over an initialized engine.
    ///
    /// Initializes the engine if the caller has not; a failed initialization
    /// fails coordinator startup — no job can run without the engine.
    pub fn new(
        engine: Arc<EngineClient>,
        mode: DispatchMode,
        progress_capacity: usize,
    ) -> Result<Self, EngineError> {
        engine.initialize()?;
        Ok(Self {
            shared: Arc::new(Shared {
                engine,
                aggregator: Arc::new(ResultAggregator::new()),
                bridge: Arc::new(ProgressBridge::new(progress_capacity)),
                slot: Mutex::new(None),
            }),
            mode,
        })
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.mode
    }

    /// Current lifecycle state; `Idle` before the first submission.
    pub fn state(&self) -> JobState {
        let slot = self.shared.slot.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(job) => job.state_tx.borrow().clone(),
            None => JobState::Idle,
        }
    }

    /// Submits a new batch job.
    ///
    /// Fails with `JobAlreadyActive` while a prior job is Running or
    /// Cancelling; a prior terminal job is replaced. Returns immediately —
    /// dispatch happens on a background thread.
    pub fn submit(
        &self,
        paths: Vec<String>,
        options: ProcessingOptions,
    ) -> Result<JobHandle, CoordinatorError> {
        if paths.is_empty() {
            return Err(CoordinatorError::EmptyBatch);
        }
        options.validate()?;

        let mut slot = self.shared.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.as_mut() {
            if previous.state_tx.borrow().is_active() {
                return Err(CoordinatorError::JobAlreadyActive);
            }
            // Reap the previous dispatch thread if it finished. An abandoned
            // bulk thread may still be blocked inside the engine call and is
            // detached instead — the new job must not wait for it.
            if let Some(handle) = previous.dispatch.take() {
                if handle.is_finished() {
                    if handle.join().is_err() {
                        error!("Previous dispatch thread panicked");
                    }
                } else {
                    debug!("Detaching abandoned dispatch thread for job {}", previous.job_id);
                }
            }
        }

        let job = Job::new(paths, options);
        info!(
            "Submitting job {} ({} documents, {:?} dispatch)",
            job.id,
            job.total(),
            self.mode
        );

        self.shared.aggregator.clear();
        self.shared.bridge.begin_job(&job.id, job.total());

        let (state_tx, state_rx) = watch::channel(JobState::Running);
        let cancel = Arc::new(AtomicBool::new(false));

        let handle = JobHandle::new(
            job.id.clone(),
            state_rx,
            Arc::clone(&self.shared.aggregator),
            Arc::clone(&self.shared.bridge),
        );

        let spawned = {
            let shared = Arc::clone(&self.shared);
            let state_tx = state_tx.clone();
            let cancel = Arc::clone(&cancel);
            let mode = self.mode;
            std::thread::Builder::new()
                .name("demojibake-dispatch".to_string())
                .spawn(move || match mode {
                    DispatchMode::Iterative => run_iterative(&shared, &job, &state_tx, &cancel),
                    DispatchMode::Bulk => run_bulk(&shared, &job, &state_tx, &cancel),
                })
        };
        let dispatch = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                // The job never ran; leave no bridge armed for it.
                error!("Failed to spawn dispatch thread: {}", e);
                self.shared.bridge.retire_job(handle.id());
                return Err(CoordinatorError::DispatchSpawn { source: e });
            }
        };

        *slot = Some(ActiveJob {
            job_id: handle.id().to_string(),
            state_tx,
            cancel,
            dispatch: Some(dispatch),
        });

        Ok(handle)
    }

    /// Requests cancellation of the active job. Advisory and cooperative:
    /// the engine offers no preemption, so in-flight work completes and its
    /// outcomes are retained. Returns immediately; no-op without an active
    /// job.
    pub fn cancel(&self) {
        let slot = self.shared.slot.lock().unwrap_or_else(|e| e.into_inner());
        let Some(job) = slot.as_ref() else {
            return;
        };
        if !job.state_tx.borrow().is_active() {
            return;
        }

        job.cancel.store(true, Ordering::Release);
        match self.mode {
            DispatchMode::Iterative => {
                // The loop observes the flag before the next item and settles
                // on Cancelled itself.
                transition(&job.state_tx, JobState::Cancelling);
                info!("Cancellation requested for job {}", job.job_id);
            }
            DispatchMode::Bulk => {
                // The engine keeps running; the job is abandoned. Late
                // callbacks are still recorded until a new job takes over,
                // but the observer sees no further progress events.
                transition(&job.state_tx, JobState::Cancelled);
                self.shared.bridge.retire_job(&job.job_id);
                info!("Job {} abandoned (bulk dispatch)", job.job_id);
            }
        }
    }

    /// Blocks until the active dispatch thread finishes. Test and teardown
    /// helper; the observer normally awaits the job handle instead.
    pub fn join_active(&self) {
        let handle = {
            let mut slot = self.shared.slot.lock().unwrap_or_else(|e| e.into_inner());
            slot.as_mut().and_then(|j| j.dispatch.take())
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Dispatch thread panicked");
            }
        }
    }
}

/// Iterative dispatch: one engine call per document, loop isolation for
/// per-item failures.
fn run_iterative(
    shared: &Arc<Shared>,
    job: &Job,
    state_tx: &watch::Sender<JobState>,
    cancel: &AtomicBool,
) {
    let _span = info_span!("dispatch", job_id = %job.id, mode = "iterative").entered();
    let total = job.total();

    for path in &job.paths {
        if cancel.load(Ordering::Acquire) {
            info!(
                "Job {} cancelled after {} of {} documents",
                job.id,
                shared.aggregator.len(),
                total
            );
            shared.bridge.retire_job(&job.id);
            transition(state_tx, JobState::Cancelled);
            return;
        }

        let outcome = match shared.engine.analyze_document(path, &job.options) {
            Ok(outcome) => outcome,
            Err(e) => {
                // Per-item failure never aborts the job.
                debug!("Document '{}' failed: {}", path, e);
                AnalysisOutcome::error(path, &e.to_string())
            }
        };

        let status = outcome.status.to_string();
        shared.aggregator.append(outcome);
        shared.bridge.publish(&job.id, path, &status);
    }

    // A cancel that raced the last item still wins.
    if cancel.load(Ordering::Acquire) {
        shared.bridge.retire_job(&job.id);
        transition(state_tx, JobState::Cancelled);
        return;
    }

    debug_assert_eq!(shared.aggregator.len(), total);
    info!("Job {} completed ({} documents)", job.id, total);
    transition(state_tx, JobState::Completed);
}

/// Bulk dispatch: one engine call for the whole collection, progress arriving
/// from engine-owned threads.
fn run_bulk(
    shared: &Arc<Shared>,
    job: &Job,
    state_tx: &watch::Sender<JobState>,
    cancel: &AtomicBool,
) {
    let _span = info_span!("dispatch", job_id = %job.id, mode = "bulk").entered();
    let expected = job.total();

    let callback = {
        let cb = Arc::new(SharedCallback {
            shared: Arc::clone(shared),
            job_id: job.id.clone(),
            expected,
        });
        Arc::new(move |current: usize, total: usize, path: &str, status: &str| {
            cb.on_progress(current, total, path, status);
        }) as crate::engine::ProgressCallback
    };

    let status = match shared
        .engine
        .process_collection(&job.paths, &job.options, callback)
    {
        Ok(status) => status,
        Err(e) => {
            error!("Bulk call failed before reaching the engine: {}", e);
            shared.bridge.retire_job(&job.id);
            transition(
                state_tx,
                JobState::Failed(FailureCause {
                    status: None,
                    message: e.to_string(),
                }),
            );
            return;
        }
    };

    if cancel.load(Ordering::Acquire) {
        // cancel() already moved the job to Cancelled and retired the
        // bridge; outcomes recorded before and after the flag are retained.
        debug!("Bulk call returned after abandonment of job {}", job.id);
        return;
    }

    if status == BATCH_SUCCESS {
        let recorded = shared.aggregator.len();
        if recorded != expected {
            // The per-item callback contract is best-effort; a shortfall is
            // a logged discrepancy, not a failure.
            tracing::warn!(
                job_id = %job.id,
                recorded,
                expected,
                "bulk callback count does not match submission count"
            );
        }
        info!("Job {} completed (bulk, {} callbacks)", job.id, recorded);
        transition(state_tx, JobState::Completed);
    } else {
        warn!("Job {} failed: engine returned status {}", job.id, status);
        shared.bridge.retire_job(&job.id);
        transition(
            state_tx,
            JobState::Failed(FailureCause {
                status: Some(status),
                message: CoordinatorError::BatchFatal { status }.to_string(),
            }),
        );
    }
}

struct SharedCallback {
    shared: Arc<Shared>,
    job_id: String,
    expected: usize,
}

impl SharedCallback {
    /// Invoked from engine-owned threads. Touches only the aggregator and
    /// the bridge, both built for foreign callers.
    fn on_progress(&self, _current: usize, total: usize, path: &str, status: &str) {
        if total != self.expected {
            debug!(
                "Engine reported total {} for job {} (submitted {})",
                total, self.job_id, self.expected
            );
        }

        let recorded = self
            .shared
            .append_if_current(&self.job_id, AnalysisOutcome::from_callback(path, status));
        if !recorded {
            debug!(
                "Absorbing late callback for stale job {} ('{}')",
                self.job_id, path
            );
        }

        self.shared.bridge.publish(&self.job_id, path, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineApi, ProgressCallback};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn success_payload(path: &str) -> String {
        format!(
            r#"{{"path":"{}","originalEncoding":"UTF-8","status":"success","processingTime":1,"confidence":0.9,"issuesFound":0,"correctionsApplied":0}}"#,
            path
        )
    }

    /// Engine that answers immediately. Bulk mode invokes the callback once
    /// per path in submission order and returns the configured status.
    struct QuickEngine {
        bulk_status: i32,
        bulk_callbacks: bool,
    }

    impl QuickEngine {
        fn ok() -> Self {
            Self {
                bulk_status: 0,
                bulk_callbacks: true,
            }
        }

        fn bulk_fatal(status: i32) -> Self {
            Self {
                bulk_status: status,
                bulk_callbacks: false,
            }
        }
    }

    impl EngineApi for QuickEngine {
        fn initialize(&self) -> i32 {
            1
        }

        fn analyze_document(&self, path: &str, _options: &str) -> Result<String, EngineError> {
            Ok(success_payload(path))
        }

        fn process_collection(
            &self,
            paths_json: &str,
            _options: &str,
            callback: ProgressCallback,
        ) -> i32 {
            if self.bulk_callbacks {
                let paths: Vec<String> = serde_json::from_str(paths_json).unwrap();
                let total = paths.len();
                for (i, path) in paths.iter().enumerate() {
                    callback(i + 1, total, path, "success");
                }
            }
            self.bulk_status
        }

        fn dictionary_metrics(&self) -> Result<String, EngineError> {
            Ok("{}".to_string())
        }

        fn enrich_dictionary(&self, _vocabulary: &str) -> i32 {
            0
        }

        fn shutdown(&self) {}
    }

    /// Bulk engine that hands its first callback to the test instead of
    /// invoking it, so the test can fire it after the job has been replaced.
    struct CapturedEngine {
        captured: Mutex<Option<ProgressCallback>>,
        calls: AtomicUsize,
    }

    impl CapturedEngine {
        fn new() -> Self {
            Self {
                captured: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }

        fn take_captured(&self) -> ProgressCallback {
            self.captured.lock().unwrap().take().unwrap()
        }
    }

    impl EngineApi for CapturedEngine {
        fn initialize(&self) -> i32 {
            1
        }

        fn analyze_document(&self, path: &str, _options: &str) -> Result<String, EngineError> {
            Ok(success_payload(path))
        }

        fn process_collection(
            &self,
            paths_json: &str,
            _options: &str,
            callback: ProgressCallback,
        ) -> i32 {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                *self.captured.lock().unwrap() = Some(callback);
            } else {
                let paths: Vec<String> = serde_json::from_str(paths_json).unwrap();
                let total = paths.len();
                for (i, path) in paths.iter().enumerate() {
                    callback(i + 1, total, path, "success");
                }
            }
            0
        }

        fn dictionary_metrics(&self) -> Result<String, EngineError> {
            Ok("{}".to_string())
        }

        fn enrich_dictionary(&self, _vocabulary: &str) -> i32 {
            0
        }

        fn shutdown(&self) {}
    }

    /// Engine whose analysis blocks until released through a channel.
    struct GatedEngine {
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl GatedEngine {
        fn new() -> (Self, mpsc::Sender<()>) {
            let (tx, rx) = mpsc::channel();
            (
                Self {
                    gate: Mutex::new(rx),
                },
                tx,
            )
        }
    }

    impl EngineApi for GatedEngine {
        fn initialize(&self) -> i32 {
            1
        }

        fn analyze_document(&self, path: &str, _options: &str) -> Result<String, EngineError> {
            let gate = self.gate.lock().unwrap();
            let _ = gate.recv();
            Ok(success_payload(path))
        }

        fn process_collection(&self, _p: &str, _o: &str, _cb: ProgressCallback) -> i32 {
            0
        }

        fn dictionary_metrics(&self) -> Result<String, EngineError> {
            Ok("{}".to_string())
        }

        fn enrich_dictionary(&self, _vocabulary: &str) -> i32 {
            0
        }

        fn shutdown(&self) {}
    }

    fn coordinator(engine: impl EngineApi + 'static, mode: DispatchMode) -> BatchCoordinator {
        let client = Arc::new(EngineClient::new(Arc::new(engine)));
        BatchCoordinator::new(client, mode, 64).unwrap()
    }

    fn paths(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_initial_state_is_idle() {
        let coordinator = coordinator(QuickEngine::ok(), DispatchMode::Iterative);
        assert_eq!(coordinator.state(), JobState::Idle);
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let coordinator = coordinator(QuickEngine::ok(), DispatchMode::Iterative);
        let err = coordinator
            .submit(vec![], ProcessingOptions::default())
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::EmptyBatch));
        assert_eq!(coordinator.state(), JobState::Idle);
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let coordinator = coordinator(QuickEngine::ok(), DispatchMode::Iterative);
        let options = ProcessingOptions::default().with_confidence_threshold(2.0);
        let err = coordinator.submit(paths(&["a.txt"]), options).unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidOptions(_)));
    }

    #[test]
    fn test_submit_while_running_is_rejected_without_mutation() {
        let (engine, release) = GatedEngine::new();
        let coordinator = coordinator(engine, DispatchMode::Iterative);

        let handle = coordinator
            .submit(paths(&["a.txt"]), ProcessingOptions::default())
            .unwrap();

        let err = coordinator
            .submit(paths(&["b.txt"]), ProcessingOptions::default())
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::JobAlreadyActive));
        // The running job was not disturbed.
        assert_eq!(handle.state(), JobState::Running);

        release.send(()).unwrap();
        coordinator.join_active();
        assert_eq!(coordinator.state(), JobState::Completed);
    }

    #[tokio::test]
    async fn test_iterative_job_completes_and_slot_is_reusable() {
        let coordinator = coordinator(QuickEngine::ok(), DispatchMode::Iterative);

        let mut handle = coordinator
            .submit(paths(&["a.txt", "b.txt"]), ProcessingOptions::default())
            .unwrap();
        assert_eq!(handle.wait_terminal().await, JobState::Completed);
        assert_eq!(handle.snapshot().len(), 2);

        // A terminal job may be replaced.
        let mut next = coordinator
            .submit(paths(&["c.txt"]), ProcessingOptions::default())
            .unwrap();
        assert_ne!(next.id(), handle.id());
        assert_eq!(next.wait_terminal().await, JobState::Completed);
        assert_eq!(next.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_fatal_status_fails_job_with_cause() {
        let coordinator = coordinator(QuickEngine::bulk_fatal(2), DispatchMode::Bulk);

        let mut handle = coordinator
            .submit(paths(&["a.txt", "b.txt"]), ProcessingOptions::default())
            .unwrap();

        match handle.wait_terminal().await {
            JobState::Failed(cause) => {
                assert_eq!(cause.status, Some(2));
                assert!(!cause.message.is_empty());
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert!(handle.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_job_records_callback_outcomes() {
        let coordinator = coordinator(QuickEngine::ok(), DispatchMode::Bulk);

        let mut handle = coordinator
            .submit(
                paths(&["a.txt", "b.txt", "c.txt"]),
                ProcessingOptions::default(),
            )
            .unwrap();
        assert_eq!(handle.wait_terminal().await, JobState::Completed);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.iter().all(|o| o.is_success()));
    }

    #[tokio::test]
    async fn test_late_bulk_callback_cannot_pollute_the_next_job() {
        let engine = Arc::new(CapturedEngine::new());
        let client = Arc::new(EngineClient::new(engine.clone() as Arc<dyn EngineApi>));
        let coordinator = BatchCoordinator::new(client, DispatchMode::Bulk, 64).unwrap();

        // First job finishes without its callback ever firing.
        let mut first = coordinator
            .submit(paths(&["a.txt"]), ProcessingOptions::default())
            .unwrap();
        assert_eq!(first.wait_terminal().await, JobState::Completed);
        let late = engine.take_captured();

        let mut second = coordinator
            .submit(paths(&["x.txt", "y.txt"]), ProcessingOptions::default())
            .unwrap();
        assert_eq!(second.wait_terminal().await, JobState::Completed);

        // The replaced job's callback fires now; it must be absorbed, not
        // recorded against the second job.
        late(1, 1, "a.txt", "success");

        let snapshot = second.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|o| o.path != "a.txt"));
    }

    #[test]
    fn test_dispatch_spawn_failure_is_not_an_engine_status() {
        let err = CoordinatorError::DispatchSpawn {
            source: std::io::Error::new(std::io::ErrorKind::WouldBlock, "no threads left"),
        };
        assert!(err.to_string().contains("spawn dispatch thread"));
        assert!(!matches!(err, CoordinatorError::BatchFatal { .. }));
    }

    #[test]
    fn test_cancel_without_active_job_is_noop() {
        let coordinator = coordinator(QuickEngine::ok(), DispatchMode::Iterative);
        coordinator.cancel();
        assert_eq!(coordinator.state(), JobState::Idle);
    }
}
