//! Essence distillation.
//!
//! For every document, in file-name order, the distiller emits a block made
//! of the document's first lines, up to a fixed number of keyword lines and
//! its last lines. Blocks are appended greedily until the next one would
//! push the essence past the character budget.

use crate::document::{CorpusScan, Document, SourceState};
use crate::scorer::KeywordPattern;
use atlas_core::error::KnowledgeError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Header placed at the top of every essence.
pub const PREAMBLE: &str = "=== CORPUS ESSENCE (local distillation) ===\n";

#[derive(Debug, Clone)]
pub struct DistillSettings {
    /// Hard cap on the essence length, in characters.
    pub budget: usize,
    pub head_lines: usize,
    pub key_lines: usize,
    pub tail_lines: usize,
    pub keywords: KeywordPattern,
}

/// An essence together with how much of the corpus made it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistilledEssence {
    pub text: String,
    /// Length of `text` in characters.
    pub chars: usize,
    pub documents_included: usize,
    pub documents_total: usize,
}

impl DistilledEssence {
    pub fn truncated(&self) -> bool {
        self.documents_included < self.documents_total
    }
}

/// What [`Distiller::distill_to_artifact`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistillOutcome {
    /// The artifact was replaced.
    Written(DistilledEssence),
    /// The corpus directory is missing; the artifact was not touched.
    SourceMissing,
}

pub struct Distiller {
    settings: DistillSettings,
}

impl Distiller {
    pub fn new(settings: DistillSettings) -> Self {
        Self { settings }
    }

    /// The block for one document.
    fn block(&self, doc: &Document) -> String {
        let lines = doc.lines();
        let s = &self.settings;

        let head = lines.iter().take(s.head_lines).cloned().collect::<Vec<_>>().join("\n");
        let keys = lines
            .iter()
            .filter(|l| s.keywords.is_match(l))
            .take(s.key_lines)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        let tail = lines[lines.len().saturating_sub(s.tail_lines)..].join("\n");

        format!("\n\n--- {} ---\n{head}\n{keys}\n{tail}\n", doc.file_name)
    }

    /// Distill already-read documents, in the order given.
    pub fn distill_documents(&self, documents: &[Document]) -> DistilledEssence {
        let budget = self.settings.budget;
        let preamble_chars = PREAMBLE.chars().count();

        if preamble_chars > budget {
            return DistilledEssence {
                text: String::new(),
                chars: 0,
                documents_included: 0,
                documents_total: documents.len(),
            };
        }

        let mut text = String::from(PREAMBLE);
        let mut chars = preamble_chars;
        let mut included = 0;
        for doc in documents {
            let block = self.block(doc);
            let block_chars = block.chars().count();
            if chars + block_chars > budget {
                debug!(file = %doc.file_name, chars, budget, "Essence budget reached");
                break;
            }
            text.push_str(&block);
            chars += block_chars;
            included += 1;
        }

        DistilledEssence {
            text,
            chars,
            documents_included: included,
            documents_total: documents.len(),
        }
    }

    /// Distill a scan. `None` when the corpus directory was missing.
    pub fn distill(&self, scan: &CorpusScan) -> Option<DistilledEssence> {
        match scan.state {
            SourceState::Missing => None,
            SourceState::Present => Some(self.distill_documents(&scan.documents)),
        }
    }

    /// Distill `scan` and atomically replace the essence artifact.
    ///
    /// A missing corpus leaves the existing artifact in place.
    pub fn distill_to_artifact(
        &self,
        scan: &CorpusScan,
        artifact: &Path,
    ) -> Result<DistillOutcome, KnowledgeError> {
        let Some(essence) = self.distill(scan) else {
            warn!(artifact = %artifact.display(), "Corpus missing, essence artifact left untouched");
            return Ok(DistillOutcome::SourceMissing);
        };

        write_atomic(artifact, &essence.text)?;
        info!(
            artifact = %artifact.display(),
            chars = essence.chars,
            included = essence.documents_included,
            total = essence.documents_total,
            "Essence written"
        );
        Ok(DistillOutcome::Written(essence))
    }
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), KnowledgeError> {
    let io_err = |p: &Path, e: std::io::Error| KnowledgeError::Io {
        path: p.display().to_string(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let tmp = temp_path(path);
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        io_err(path, e)
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "essence".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read the essence artifact. A missing or unreadable file is an empty essence.
pub fn read_essence(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            debug!(path = %path.display(), chars = text.chars().count(), "Essence loaded");
            text
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No essence artifact yet");
            String::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Essence artifact unreadable");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn settings(budget: usize) -> DistillSettings {
        DistillSettings {
            budget,
            head_lines: 8,
            key_lines: 12,
            tail_lines: 6,
            keywords: KeywordPattern::new(&[
                "Piecz(e|ę)ć",
                "Ksi(ę|e)ga",
                "Brama",
                "Zakl(ę|e)cie",
                "Forteca",
                "Lyr",
                "Kael",
                "Nexus",
                "Cień",
                "Rytua(ł|l)",
            ])
            .unwrap(),
        }
    }

    fn numbered(name: &str, n: usize) -> Document {
        let body: Vec<String> = (1..=n).map(|i| format!("line {i}")).collect();
        Document::new(name, body.join("\n"))
    }

    #[test]
    fn block_has_head_keys_and_tail() {
        let doc = Document::new(
            "a.txt",
            "one\r\ntwo\n\n  Brama opens  \nfour\nfive\nsix\nseven\neight\nnine\nKael speaks\nten",
        );
        let distiller = Distiller::new(DistillSettings {
            head_lines: 2,
            tail_lines: 1,
            ..settings(60_000)
        });
        assert_eq!(
            distiller.block(&doc),
            "\n\n--- a.txt ---\none\ntwo\nBrama opens\nKael speaks\nten\n"
        );
    }

    #[test]
    fn key_lines_are_capped_and_ordered() {
        let lines: Vec<String> = (0..20).map(|i| format!("Nexus {i}")).collect();
        let doc = Document::new("k.txt", lines.join("\n"));
        let distiller = Distiller::new(DistillSettings {
            head_lines: 0,
            tail_lines: 0,
            ..settings(60_000)
        });
        let block = distiller.block(&doc);
        let keys: Vec<&str> = block.lines().filter(|l| l.starts_with("Nexus")).collect();
        assert_eq!(keys.len(), 12);
        assert_eq!(keys[0], "Nexus 0");
        assert_eq!(keys[11], "Nexus 11");
    }

    #[test]
    fn budget_is_never_exceeded() {
        let docs: Vec<Document> = (0..50).map(|i| numbered(&format!("{i:02}.txt"), 40)).collect();
        for budget in [0, 10, PREAMBLE.len(), 200, 1_000, 5_000, 60_000] {
            let essence = Distiller::new(settings(budget)).distill_documents(&docs);
            assert!(essence.text.chars().count() <= budget, "budget {budget}");
            assert_eq!(essence.chars, essence.text.chars().count());
        }
    }

    #[test]
    fn preamble_larger_than_budget_gives_empty_essence() {
        let essence = Distiller::new(settings(5)).distill_documents(&[numbered("a.txt", 3)]);
        assert!(essence.text.is_empty());
        assert_eq!(essence.documents_included, 0);
    }

    #[test]
    fn adding_documents_only_extends_the_essence() {
        let docs: Vec<Document> = (0..30).map(|i| numbered(&format!("{i:02}.txt"), 30)).collect();
        let distiller = Distiller::new(settings(3_000));

        let mut previous = distiller.distill_documents(&[]);
        assert_eq!(previous.text, PREAMBLE);
        for n in 1..=docs.len() {
            let current = distiller.distill_documents(&docs[..n]);
            assert!(current.text.starts_with(&previous.text));
            assert!(current.documents_included >= previous.documents_included);
            previous = current;
        }
        assert!(previous.truncated());
    }

    #[test]
    fn first_block_that_does_not_fit_stops_processing() {
        // a huge document followed by a tiny one: the tiny one is not used
        let big = Document::new("a.txt", "x".repeat(10_000));
        let tiny = Document::new("b.txt", "y");
        let essence = Distiller::new(settings(500)).distill_documents(&[big, tiny]);
        assert_eq!(essence.text, PREAMBLE);
        assert_eq!(essence.documents_included, 0);
    }

    #[test]
    fn budget_counts_characters_not_bytes() {
        let doc = Document::new("ę.txt", "żółć");
        let distiller = Distiller::new(settings(60_000));
        let block_chars = distiller.block(&doc).chars().count();
        let exact = PREAMBLE.chars().count() + block_chars;

        let essence = Distiller::new(settings(exact)).distill_documents(std::slice::from_ref(&doc));
        assert_eq!(essence.documents_included, 1);
        assert_eq!(essence.chars, exact);
    }

    #[test]
    fn missing_corpus_leaves_artifact_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("core_summary.txt");
        fs::write(&artifact, "previous essence").unwrap();

        let scan = CorpusScan::read_dir(&dir.path().join("docx_txt"));
        let outcome = Distiller::new(settings(60_000))
            .distill_to_artifact(&scan, &artifact)
            .unwrap();
        assert_eq!(outcome, DistillOutcome::SourceMissing);
        assert_eq!(fs::read_to_string(&artifact).unwrap(), "previous essence");
    }

    #[test]
    fn artifact_written_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docx_txt");
        fs::create_dir(&docs).unwrap();
        fs::write(docs.join("a.txt"), "Alpha beta. Pieczęć gamma.").unwrap();
        let artifact = dir.path().join("out").join("core_summary.txt");

        let scan = CorpusScan::read_dir(&docs);
        let outcome = Distiller::new(settings(60_000))
            .distill_to_artifact(&scan, &artifact)
            .unwrap();
        let DistillOutcome::Written(essence) = outcome else {
            panic!("expected essence to be written");
        };
        assert_eq!(read_essence(&artifact), essence.text);
        assert!(essence.text.contains("--- a.txt ---"));
        assert!(!temp_path(&artifact).exists());
    }

    #[test]
    fn missing_essence_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_essence(&dir.path().join("none.txt")), "");
    }
}
