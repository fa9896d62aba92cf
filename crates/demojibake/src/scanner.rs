use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::ScanError;

/// Collects candidate documents for a batch submission.
pub struct DocumentScanner {
    config: ScanConfig,
}

impl DocumentScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ScanConfig::default())
    }

    /// Walks `root` and returns paths of documents whose extension is
    /// configured, in sorted order. Excluded directory names are skipped
    /// entirely, including their subtrees.
    pub fn scan<P: AsRef<Path>>(&self, root: P) -> Result<Vec<PathBuf>, ScanError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut walker = WalkDir::new(root).min_depth(1);
        if !self.config.recursive {
            walker = walker.max_depth(1);
        }

        let mut documents = Vec::new();

        let mut iter = walker.into_iter();
        loop {
            let entry = match iter.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    let path = e
                        .path()
                        .map(|p| p.to_path_buf())
                        .unwrap_or_else(|| root.to_path_buf());
                    return Err(ScanError::WalkFailed { path, source: e });
                }
            };

            let path = entry.path();

            if entry.file_type().is_dir() {
                if self.is_excluded_dir(path) {
                    debug!("Skipping excluded directory: {}", path.display());
                    iter.skip_current_dir();
                }
                continue;
            }

            if self.has_configured_extension(path) {
                debug!("Found document: {}", path.display());
                documents.push(path.to_path_buf());
            }
        }

        documents.sort();

        info!(
            "Scanned {} documents in {}",
            documents.len(),
            root.display()
        );
        Ok(documents)
    }

    fn is_excluded_dir(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| self.config.exclude_directories.iter().any(|d| d == name))
            .unwrap_or(false)
    }

    fn has_configured_extension(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let dotted = format!(".{}", ext.to_ascii_lowercase());
                self.config.extensions.iter().any(|e| e == &dotted)
            }
            None => false,
        }
    }
}
