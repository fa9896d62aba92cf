//! FFI bindings to the demojibake shared library (`native-engine` feature).
//!
//! Memory ownership: every `*mut c_char` the engine returns is caller-owned
//! and must be released through `ReleaseAllocatedMemory` exactly once.
//! [`EngineString`] enforces that on every exit path, including early returns
//! on malformed payloads.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::sync::Mutex;

use log::warn;

use crate::engine::api::{EngineApi, ProgressCallback};
use crate::error::EngineError;

type RawProgressCallback =
    extern "C" fn(current: c_int, total: c_int, filename: *const c_char, status: *const c_char);

#[link(name = "demojibake")]
extern "C" {
    fn InitializeEncodingEngine() -> c_int;
    fn AnalyzeDocumentEncoding(
        document_path: *const c_char,
        analysis_options: *const c_char,
    ) -> *mut c_char;
    fn ProcessDocumentCollectionConcurrently(
        document_paths_json: *const c_char,
        analysis_options: *const c_char,
        callback: RawProgressCallback,
    ) -> c_int;
    fn RetrieveLanguageDictionaryMetrics() -> *mut c_char;
    fn EnrichLanguageDictionary(vocabulary_terms: *const c_char) -> c_int;
    fn ReleaseAllocatedMemory(memory_ptr: *mut c_char);
    fn GracefulEngineShutdown();
}

/// Guard for an engine-allocated, caller-owned string.
struct EngineString {
    ptr: *mut c_char,
}

impl EngineString {
    /// Returns `None` for a null pointer (engine call failure).
    fn from_raw(ptr: *mut c_char) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            Some(Self { ptr })
        }
    }

    fn to_string_lossy(&self) -> String {
        // Safety: ptr is non-null per from_raw and the engine returns
        // NUL-terminated strings.
        unsafe { CStr::from_ptr(self.ptr).to_string_lossy().into_owned() }
    }
}

impl Drop for EngineString {
    fn drop(&mut self) {
        // Safety: ptr was allocated by the engine and released exactly once.
        unsafe { ReleaseAllocatedMemory(self.ptr) };
    }
}

// The wire contract's progress callback has no user-data parameter, so the
// active closure is routed through a process-wide slot for the duration of a
// bulk call. The coordinator allows only one active job, matching the
// engine's process-wide handle.
static ACTIVE_CALLBACK: Mutex<Option<ProgressCallback>> = Mutex::new(None);

extern "C" fn progress_trampoline(
    current: c_int,
    total: c_int,
    filename: *const c_char,
    status: *const c_char,
) {
    let callback = match ACTIVE_CALLBACK.lock() {
        Ok(guard) => guard.clone(),
        Err(_) => return,
    };
    let Some(callback) = callback else { return };

    let filename = if filename.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(filename).to_string_lossy().into_owned() }
    };
    let status = if status.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(status).to_string_lossy().into_owned() }
    };

    callback(current.max(0) as usize, total.max(0) as usize, &filename, &status);
}

/// Engine implementation linked against the native shared library.
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn to_cstring(value: &str, what: &str) -> Result<CString, EngineError> {
    CString::new(value).map_err(|e| EngineError::CallFailed {
        path: value.to_string(),
        reason: format!("{} contains interior NUL byte: {}", what, e),
    })
}

impl EngineApi for NativeEngine {
    fn initialize(&self) -> i32 {
        unsafe { InitializeEncodingEngine() }
    }

    fn analyze_document(&self, path: &str, options_json: &str) -> Result<String, EngineError> {
        let c_path = to_cstring(path, "document path")?;
        let c_options = to_cstring(options_json, "options payload")?;

        let raw = unsafe { AnalyzeDocumentEncoding(c_path.as_ptr(), c_options.as_ptr()) };
        let payload = EngineString::from_raw(raw).ok_or_else(|| EngineError::CallFailed {
            path: path.to_string(),
            reason: "engine returned a null result".to_string(),
        })?;

        Ok(payload.to_string_lossy())
    }

    fn process_collection(
        &self,
        paths_json: &str,
        options_json: &str,
        callback: ProgressCallback,
    ) -> i32 {
        let c_paths = match to_cstring(paths_json, "paths payload") {
            Ok(c) => c,
            Err(_) => return -2,
        };
        let c_options = match to_cstring(options_json, "options payload") {
            Ok(c) => c,
            Err(_) => return -2,
        };

        if let Ok(mut slot) = ACTIVE_CALLBACK.lock() {
            if slot.is_some() {
                warn!("Bulk call started while a previous callback was still registered");
            }
            *slot = Some(callback);
        }

        let status = unsafe {
            ProcessDocumentCollectionConcurrently(
                c_paths.as_ptr(),
                c_options.as_ptr(),
                progress_trampoline,
            )
        };

        if let Ok(mut slot) = ACTIVE_CALLBACK.lock() {
            *slot = None;
        }

        status
    }

    fn dictionary_metrics(&self) -> Result<String, EngineError> {
        let raw = unsafe { RetrieveLanguageDictionaryMetrics() };
        let payload = EngineString::from_raw(raw).ok_or_else(|| EngineError::CallFailed {
            path: String::new(),
            reason: "engine returned null dictionary metrics".to_string(),
        })?;
        Ok(payload.to_string_lossy())
    }

    fn enrich_dictionary(&self, vocabulary_json: &str) -> i32 {
        match to_cstring(vocabulary_json, "vocabulary payload") {
            Ok(c_vocab) => unsafe { EnrichLanguageDictionary(c_vocab.as_ptr()) },
            Err(_) => -1,
        }
    }

    fn shutdown(&self) {
        unsafe { GracefulEngineShutdown() }
    }
}
