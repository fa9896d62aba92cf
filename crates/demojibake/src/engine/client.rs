//! Adapter between coordinator-level calls and the engine wire contract.
//!
//! Owns the engine's process-wide lifecycle: exactly one `Initialize` reaches
//! the engine, and `Shutdown` is idempotent even after a failed
//! initialization. No job-specific state lives here.

use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::coordinator::outcome::WireOutcome;
use crate::coordinator::{AnalysisOutcome, ProcessingOptions};
use crate::engine::api::{EngineApi, ProgressCallback, INIT_SUCCESS};
use crate::error::EngineError;

// Lifecycle states of the engine handle.
const UNINITIALIZED: u8 = 0;
const READY: u8 = 1;
const SHUT_DOWN: u8 = 2;
const FAILED: u8 = 3;

pub struct EngineClient {
    api: Arc<dyn EngineApi>,
    state: AtomicU8,
    // Serializes first-time initialization; state reads stay lock-free.
    init_lock: Mutex<()>,
    failed_status: AtomicI32,
}

impl EngineClient {
    /// Wraps an engine without initializing it. Call [`EngineClient::initialize`]
    /// before any analysis call.
    pub fn new(api: Arc<dyn EngineApi>) -> Self {
        Self {
            api,
            state: AtomicU8::new(UNINITIALIZED),
            init_lock: Mutex::new(()),
            failed_status: AtomicI32::new(0),
        }
    }

    /// Initializes the engine. The underlying engine sees at most one
    /// `Initialize` call, even under concurrent callers; repeat calls on a
    /// ready client are no-ops. A failed initialization is sticky and keeps
    /// reporting the engine's original failure status.
    pub fn initialize(&self) -> Result<(), EngineError> {
        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        match self.state.load(Ordering::Acquire) {
            READY => return Ok(()),
            SHUT_DOWN => return Err(EngineError::NotInitialized),
            FAILED => {
                return Err(EngineError::Unavailable {
                    status: self.failed_status.load(Ordering::Acquire),
                })
            }
            _ => {}
        }

        let status = self.api.initialize();
        if status == INIT_SUCCESS {
            self.state.store(READY, Ordering::Release);
            info!("Analysis engine initialized");
            Ok(())
        } else {
            self.failed_status.store(status, Ordering::Release);
            self.state.store(FAILED, Ordering::Release);
            warn!("Analysis engine initialization failed with status {}", status);
            Err(EngineError::Unavailable { status })
        }
    }

    /// Shuts the engine down. Safe to call repeatedly and after a failed
    /// initialize; only a ready engine is actually shut down.
    pub fn shutdown(&self) {
        if self
            .state
            .compare_exchange(READY, SHUT_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!("Shutting down analysis engine");
            self.api.shutdown();
        } else {
            debug!("Engine shutdown skipped: engine was never ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    fn ensure_ready(&self) -> Result<(), EngineError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    /// Analyzes a single document and parses the engine's result payload.
    ///
    /// Engine-reported failures (`{"error": ...}` payloads) and malformed
    /// payloads surface as distinct error variants so the coordinator can
    /// synthesize an error outcome and keep the batch going.
    pub fn analyze_document(
        &self,
        path: &str,
        options: &ProcessingOptions,
    ) -> Result<AnalysisOutcome, EngineError> {
        self.ensure_ready()?;

        let options_json = serde_json::to_string(options).map_err(|e| EngineError::CallFailed {
            path: path.to_string(),
            reason: format!("options serialization failed: {}", e),
        })?;

        let payload = self.api.analyze_document(path, &options_json)?;
        parse_result_payload(path, &payload)
    }

    /// Submits the whole collection to the engine's concurrent entry point.
    /// Blocks until the engine returns; progress arrives via `callback` from
    /// engine-owned threads. Returns the engine's raw status code.
    pub fn process_collection(
        &self,
        paths: &[String],
        options: &ProcessingOptions,
        callback: ProgressCallback,
    ) -> Result<i32, EngineError> {
        self.ensure_ready()?;

        let paths_json = serde_json::to_string(paths).map_err(|e| EngineError::CallFailed {
            path: String::new(),
            reason: format!("paths serialization failed: {}", e),
        })?;
        let options_json = serde_json::to_string(options).map_err(|e| EngineError::CallFailed {
            path: String::new(),
            reason: format!("options serialization failed: {}", e),
        })?;

        Ok(self.api.process_collection(&paths_json, &options_json, callback))
    }

    /// Fetches the language dictionary metrics payload. The payload is
    /// free-form; it is parsed only as far as valid JSON for display.
    pub fn dictionary_metrics(&self) -> Result<serde_json::Value, EngineError> {
        self.ensure_ready()?;
        let payload = self.api.dictionary_metrics()?;
        serde_json::from_str(&payload).map_err(EngineError::MalformedMetrics)
    }

    /// Adds vocabulary terms to the engine's language dictionary. Returns the
    /// number of terms the engine accepted.
    pub fn enrich_dictionary(&self, terms: &[String]) -> Result<u32, EngineError> {
        self.ensure_ready()?;
        let vocabulary_json =
            serde_json::to_string(terms).map_err(|e| EngineError::CallFailed {
                path: String::new(),
                reason: format!("vocabulary serialization failed: {}", e),
            })?;

        let status = self.api.enrich_dictionary(&vocabulary_json);
        if status < 0 {
            Err(EngineError::DictionaryRejected { status })
        } else {
            Ok(status as u32)
        }
    }

    /// Loads a vocabulary file (one term per line, blank lines ignored) and
    /// feeds it to the engine's language dictionary. Startup helper for the
    /// configured `dictionaryPath`. Returns the accepted count.
    pub fn enrich_dictionary_from_file(
        &self,
        path: &std::path::Path,
    ) -> Result<u32, EngineError> {
        self.ensure_ready()?;

        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::CallFailed {
                path: path.display().to_string(),
                reason: format!("reading vocabulary file failed: {}", e),
            })?;

        let terms: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        info!(
            "Enriching dictionary with {} terms from {}",
            terms.len(),
            path.display()
        );
        self.enrich_dictionary(&terms)
    }
}

impl Drop for EngineClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Parses a raw result payload into a domain outcome.
fn parse_result_payload(path: &str, payload: &str) -> Result<AnalysisOutcome, EngineError> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| EngineError::MalformedResult {
            path: path.to_string(),
            source: e,
        })?;

    if let Some(detail) = value.get("error").and_then(|v| v.as_str()) {
        return Err(EngineError::AnalysisFailed {
            path: path.to_string(),
            detail: detail.to_string(),
        });
    }

    let wire: WireOutcome =
        serde_json::from_value(value).map_err(|e| EngineError::MalformedResult {
            path: path.to_string(),
            source: e,
        })?;

    Ok(AnalysisOutcome::from(wire))
}
