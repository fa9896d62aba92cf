//! Shared test doubles for coordinator integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use demojibake::error::EngineError;
use demojibake::{EngineApi, ProgressCallback};

/// Per-path scripted behavior of the fake engine.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Well-formed result payload with the given confidence and time.
    Success { confidence: f64, time_ms: u64 },
    /// Well-formed payload with a "warning" status string.
    Warning,
    /// Payload carrying an `error` key, as the real engine reports analysis
    /// failures.
    ErrorPayload(&'static str),
    /// Payload that is not valid result JSON.
    Malformed,
    /// The call itself fails before producing a payload.
    CallError(&'static str),
}

/// Fake engine with per-path scripted responses.
///
/// Bulk calls drive the progress callback from a thread the engine owns, in
/// submission order, then return the configured status. An optional gate
/// blocks each call until released, for exercising cancellation races.
pub struct ScriptedEngine {
    scripts: HashMap<String, Behavior>,
    gate: Option<Mutex<mpsc::Receiver<()>>>,
    bulk_status: i32,
    bulk_callbacks: bool,
    init_status: i32,
    init_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            gate: None,
            bulk_status: 0,
            bulk_callbacks: true,
            init_status: 1,
            init_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_behavior(mut self, path: &str, behavior: Behavior) -> Self {
        self.scripts.insert(path.to_string(), behavior);
        self
    }

    /// Makes every call block until a unit is sent through the returned
    /// sender.
    pub fn gated(mut self) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        self.gate = Some(Mutex::new(rx));
        (self, tx)
    }

    /// Bulk calls return `status` without invoking the callback at all.
    pub fn bulk_fatal(mut self, status: i32) -> Self {
        self.bulk_status = status;
        self.bulk_callbacks = false;
        self
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    fn await_gate(&self) {
        if let Some(gate) = &self.gate {
            let rx = gate.lock().unwrap();
            let _ = rx.recv();
        }
    }

    fn payload_for(&self, path: &str) -> Result<String, EngineError> {
        match self.scripts.get(path).cloned().unwrap_or(Behavior::Success {
            confidence: 0.9,
            time_ms: 10,
        }) {
            Behavior::Success {
                confidence,
                time_ms,
            } => Ok(result_payload(path, "success", confidence, time_ms)),
            Behavior::Warning => Ok(result_payload(path, "warning", 0.5, 10)),
            Behavior::ErrorPayload(detail) => Ok(format!(r#"{{"error":"{}"}}"#, detail)),
            Behavior::Malformed => Ok("not json at all".to_string()),
            Behavior::CallError(reason) => Err(EngineError::CallFailed {
                path: path.to_string(),
                reason: reason.to_string(),
            }),
        }
    }

    fn status_for(&self, path: &str) -> &'static str {
        match self.scripts.get(path) {
            Some(Behavior::Warning) => "warning",
            Some(Behavior::ErrorPayload(_)) | Some(Behavior::CallError(_)) => {
                "error: scripted failure"
            }
            _ => "success",
        }
    }
}

impl EngineApi for ScriptedEngine {
    fn initialize(&self) -> i32 {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.init_status
    }

    fn analyze_document(&self, path: &str, _options_json: &str) -> Result<String, EngineError> {
        self.await_gate();
        self.payload_for(path)
    }

    fn process_collection(
        &self,
        paths_json: &str,
        _options_json: &str,
        callback: ProgressCallback,
    ) -> i32 {
        self.await_gate();

        if self.bulk_callbacks {
            let paths: Vec<String> = serde_json::from_str(paths_json).unwrap();
            let total = paths.len();
            let statuses: Vec<(String, &'static str)> = paths
                .iter()
                .map(|p| (p.clone(), self.status_for(p)))
                .collect();

            // The real engine reports progress from its own worker threads.
            let reporter = std::thread::spawn(move || {
                for (i, (path, status)) in statuses.iter().enumerate() {
                    callback(i + 1, total, path, status);
                }
            });
            reporter.join().unwrap();
        }

        self.bulk_status
    }

    fn dictionary_metrics(&self) -> Result<String, EngineError> {
        Ok(r#"{"totalWords": 0}"#.to_string())
    }

    fn enrich_dictionary(&self, vocabulary_json: &str) -> i32 {
        let terms: Vec<String> = serde_json::from_str(vocabulary_json).unwrap_or_default();
        terms.len() as i32
    }

    fn shutdown(&self) {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn result_payload(path: &str, status: &str, confidence: f64, time_ms: u64) -> String {
    format!(
        r#"{{"path":"{}","originalEncoding":"ISO-8859-1","status":"{}","processingTime":{},"confidence":{},"issuesFound":1,"correctionsApplied":1}}"#,
        path, status, time_ms, confidence
    )
}

pub fn paths(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(2));
    }
    panic!("condition not met within timeout");
}
