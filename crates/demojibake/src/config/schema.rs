use serde::{Deserialize, Serialize};

use crate::coordinator::{DispatchMode, ProcessingOptions};

/// Top-level configuration file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Config format version; currently only "1.0".
    pub version: String,

    /// How submitted batches reach the engine.
    #[serde(default = "default_dispatch_mode")]
    pub dispatch_mode: DispatchMode,

    /// Default processing options applied when a submission supplies none.
    #[serde(default)]
    pub options: ProcessingOptions,

    #[serde(default)]
    pub progress: ProgressConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    /// Vocabulary file for
    /// [`EngineClient::enrich_dictionary_from_file`](crate::engine::EngineClient::enrich_dictionary_from_file)
    /// at startup, one term per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary_path: Option<String>,
}

fn default_dispatch_mode() -> DispatchMode {
    DispatchMode::Iterative
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressConfig {
    /// Buffer capacity of the progress bridge. Oldest events are dropped on
    /// overflow.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    /// File extensions considered text documents, with leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Descend into subdirectories.
    #[serde(default = "default_recursive")]
    pub recursive: bool,

    /// Directory names skipped entirely.
    #[serde(default = "default_exclude_directories")]
    pub exclude_directories: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    [".txt", ".md", ".csv", ".log", ".xml", ".html", ".json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_recursive() -> bool {
    true
}

fn default_exclude_directories() -> Vec<String> {
    [
        ".git",
        ".svn",
        ".hg",
        "node_modules",
        "bin",
        "target",
        "dist",
        "build",
        "out",
        ".idea",
        ".vscode",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            recursive: default_recursive(),
            exclude_directories: default_exclude_directories(),
        }
    }
}
