//! Raw wire contract of the character encoding analysis engine.
//!
//! The engine is a natively compiled component. Every payload crossing this
//! boundary is a JSON string; every status is a plain integer. The trait
//! mirrors the exported symbols one-to-one so that the same adapter logic in
//! [`crate::engine::EngineClient`] runs against the real library and against
//! scripted test engines.

use std::sync::Arc;

use crate::error::EngineError;

/// Status returned by `Initialize` on success.
pub const INIT_SUCCESS: i32 = 1;

/// Status returned by the bulk entry point on success.
pub const BATCH_SUCCESS: i32 = 0;

/// Progress callback invoked by the engine during bulk processing.
///
/// Arguments: processed count, total documents, current document path,
/// analysis status. The engine invokes this from threads it owns; the
/// callback must be cheap and must never block on the observer.
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &str, &str) + Send + Sync>;

/// One-to-one mapping of the engine's exported functions.
///
/// Implementations: the FFI bindings behind the `native-engine` feature, and
/// scripted fakes in tests.
pub trait EngineApi: Send + Sync {
    /// `Initialize() -> statusCode`; 1 = success, anything else = failure.
    fn initialize(&self) -> i32;

    /// `AnalyzeDocumentEncoding(path, optionsJson) -> resultJson`.
    ///
    /// Returns the raw JSON payload. The engine reports its own failures as
    /// an `{"error": ...}` payload; `Err` is reserved for the call itself
    /// failing (e.g. a null return from the native library).
    fn analyze_document(&self, path: &str, options_json: &str) -> std::result::Result<String, EngineError>;

    /// `ProcessDocumentCollectionConcurrently(pathsJson, optionsJson, cb) -> statusCode`.
    ///
    /// Blocks until the whole collection has been processed. The callback may
    /// be invoked zero or more times from engine-owned threads, once per
    /// completed document, in completion order.
    fn process_collection(
        &self,
        paths_json: &str,
        options_json: &str,
        callback: ProgressCallback,
    ) -> i32;

    /// `RetrieveLanguageDictionaryMetrics() -> metricsJson` (free-form).
    fn dictionary_metrics(&self) -> std::result::Result<String, EngineError>;

    /// `EnrichLanguageDictionary(vocabularyTermsJson) -> statusCode`.
    ///
    /// The engine returns the number of accepted terms; negative = failure.
    fn enrich_dictionary(&self, vocabulary_json: &str) -> i32;

    /// `Shutdown()`: releases all engine-held resources. Idempotent.
    fn shutdown(&self);
}
