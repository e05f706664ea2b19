//! Source documents and the corpus directory scan.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// One plain-text document, identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub raw: String,
}

impl Document {
    pub fn new(file_name: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            raw: raw.into(),
        }
    }

    /// Normalized lines: carriage returns stripped, each line trimmed,
    /// empty lines removed.
    pub fn lines(&self) -> Vec<String> {
        self.raw
            .replace('\r', "")
            .split('\n')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Whether the corpus directory existed when it was scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Missing,
    Present,
}

/// A document that could not be read and was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub file_name: String,
    pub reason: String,
}

/// Result of scanning the corpus directory.
#[derive(Debug, Clone)]
pub struct CorpusScan {
    pub state: SourceState,
    /// Readable documents in file-name order.
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedDocument>,
}

impl CorpusScan {
    pub fn missing() -> Self {
        Self {
            state: SourceState::Missing,
            documents: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Read every eligible document under `dir`.
    ///
    /// A missing (or unlistable) directory is reported as
    /// [`SourceState::Missing`]; unreadable files are recorded in `skipped`.
    pub fn read_dir(dir: &Path) -> Self {
        let names = match list_documents(dir) {
            Some(names) => names,
            None => return Self::missing(),
        };

        let mut documents = Vec::with_capacity(names.len());
        let mut skipped = Vec::new();
        for name in names {
            match std::fs::read(dir.join(&name)) {
                Ok(bytes) => {
                    let raw = String::from_utf8_lossy(&bytes).into_owned();
                    documents.push(Document::new(name, raw));
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Skipping unreadable document");
                    skipped.push(SkippedDocument {
                        file_name: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(
            dir = %dir.display(),
            documents = documents.len(),
            skipped = skipped.len(),
            "Corpus scanned"
        );

        Self {
            state: SourceState::Present,
            documents,
            skipped,
        }
    }
}

/// File names of eligible documents (`*.txt`, any case) in sorted order,
/// or `None` when the directory does not exist or cannot be listed.
pub fn list_documents(dir: &Path) -> Option<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if dir.exists() {
                warn!(dir = %dir.display(), error = %e, "Corpus directory unreadable");
            } else {
                debug!(dir = %dir.display(), "Corpus directory missing");
            }
            return None;
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| !t.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.to_lowercase().ends_with(".txt"))
        .collect();
    names.sort();
    Some(names)
}
