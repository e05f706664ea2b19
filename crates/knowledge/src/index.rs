//! In-memory corpus index.
//!
//! The index is immutable once built. A rebuild produces a new index that the
//! owner swaps in by reference, so readers only ever see a complete one.

use crate::chunker::chunk;
use crate::document::{CorpusScan, Document, SkippedDocument, SourceState};
use crate::scorer::Scorer;
use atlas_core::error::KnowledgeError;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// One retrievable window of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub source_file: String,
    pub text: String,
}

/// A chunk paired with its score for one query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingSettings {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            size: 900,
            overlap: 150,
        }
    }
}

/// What a rebuild saw.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub source: SourceState,
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// All chunks of the corpus in file-name order, then in-document order.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    chunks: Vec<Chunk>,
    scorer: Scorer,
}

impl CorpusIndex {
    /// An index with no chunks; every query returns nothing.
    pub fn empty(scorer: Scorer) -> Self {
        Self {
            chunks: Vec::new(),
            scorer,
        }
    }

    /// Build an index from already-read documents.
    ///
    /// Documents with empty text contribute no chunks.
    pub fn from_documents(
        documents: &[Document],
        chunking: ChunkingSettings,
        scorer: Scorer,
    ) -> Result<Self, KnowledgeError> {
        let mut chunks = Vec::new();
        for doc in documents.iter().filter(|d| !d.raw.is_empty()) {
            for text in chunk(&doc.raw, chunking.size, chunking.overlap)? {
                chunks.push(Chunk {
                    source_file: doc.file_name.clone(),
                    text,
                });
            }
        }
        Ok(Self { chunks, scorer })
    }

    /// Build an index from a scan, reporting what was included.
    pub fn from_scan(
        scan: &CorpusScan,
        chunking: ChunkingSettings,
        scorer: Scorer,
    ) -> Result<(Self, RebuildReport), KnowledgeError> {
        let index = Self::from_documents(&scan.documents, chunking, scorer)?;
        let report = RebuildReport {
            source: scan.state,
            documents: scan.documents.len(),
            chunks: index.len(),
            skipped: scan.skipped.clone(),
        };
        info!(
            source = ?report.source,
            documents = report.documents,
            chunks = report.chunks,
            skipped = report.skipped.len(),
            "Corpus index built"
        );
        Ok((index, report))
    }

    /// Read `dir` and build a fresh index from it.
    ///
    /// A missing directory yields an empty index, not an error.
    pub fn rebuild(
        dir: &Path,
        chunking: ChunkingSettings,
        scorer: Scorer,
    ) -> Result<(Self, RebuildReport), KnowledgeError> {
        Self::from_scan(&CorpusScan::read_dir(dir), chunking, scorer)
    }

    /// The `k` best chunks for `query`, highest score first.
    ///
    /// Equal scores keep index order.
    pub fn top_k(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        if self.chunks.is_empty() || k == 0 {
            return Vec::new();
        }

        let terms = Scorer::query_terms(query);
        let mut scored: Vec<(usize, f64)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i, self.scorer.score_with(&terms, &c.text)))
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::KeywordPattern;
    use std::fs;

    fn scorer() -> Scorer {
        let ranking = KeywordPattern::new(&[
            "piecz", "księg", "bram", "ritua", "fortec", "cieni", "nexus", "lyr", "kael",
        ])
        .unwrap();
        Scorer::new(ranking, 3.0)
    }

    fn small() -> ChunkingSettings {
        ChunkingSettings { size: 40, overlap: 10 }
    }

    fn index_of(docs: &[Document]) -> CorpusIndex {
        CorpusIndex::from_documents(docs, small(), scorer()).unwrap()
    }

    #[test]
    fn keyword_document_scores_above_unrelated_one() {
        let keyword_doc = Document::new("a.txt", "Alpha beta. Pieczęć gamma.");
        let solo = CorpusIndex::from_documents(
            std::slice::from_ref(&keyword_doc),
            ChunkingSettings::default(),
            scorer(),
        )
        .unwrap();

        let hits = solo.top_k("gamma", 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.source_file, "a.txt");
        assert_eq!(hits[0].chunk.text, "Alpha beta. Pieczęć gamma.");
        assert!(hits[0].score > 0.0);

        let unrelated = CorpusIndex::from_documents(
            &[Document::new("b.txt", "Weather report for the coastal region today.")],
            ChunkingSettings::default(),
            scorer(),
        )
        .unwrap();
        let other = unrelated.top_k("gamma", 1);
        assert_eq!(other.len(), 1);
        assert!(other[0].score < hits[0].score);
    }

    #[test]
    fn never_more_than_k() {
        let text = "word ".repeat(200);
        let index = index_of(&[Document::new("a.txt", text)]);
        assert!(index.len() > 5);
        assert_eq!(index.top_k("word", 5).len(), 5);
        assert!(index.top_k("word", 0).is_empty());
    }

    #[test]
    fn returns_everything_when_index_smaller_than_k() {
        let index = index_of(&[
            Document::new("a.txt", "one"),
            Document::new("b.txt", "two"),
        ]);
        assert_eq!(index.top_k("anything", 8).len(), 2);
    }

    #[test]
    fn sorted_descending_with_stable_ties() {
        let index = index_of(&[
            Document::new("a.txt", "nothing here"),
            Document::new("b.txt", "gamma gamma"),
            Document::new("c.txt", "nothing there"),
            Document::new("d.txt", "gamma once"),
        ]);
        let hits = index.top_k("gamma", 10);
        let order: Vec<_> = hits.iter().map(|h| h.chunk.source_file.as_str()).collect();
        assert_eq!(order, vec!["b.txt", "d.txt", "a.txt", "c.txt"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = CorpusIndex::empty(scorer());
        assert!(index.top_k("gamma", 8).is_empty());

        let index = index_of(&[]);
        assert!(index.is_empty());
        assert!(index.top_k("", 8).is_empty());
    }

    #[test]
    fn empty_documents_contribute_no_chunks() {
        let index = index_of(&[Document::new("empty.txt", ""), Document::new("b.txt", "x")]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.chunks()[0].source_file, "b.txt");
    }

    #[test]
    fn chunks_follow_file_then_offset_order() {
        let index = index_of(&[
            Document::new("a.txt", "a".repeat(100)),
            Document::new("b.txt", "b".repeat(10)),
        ]);
        let files: Vec<_> = index.chunks().iter().map(|c| c.source_file.as_str()).collect();
        assert_eq!(files, vec!["a.txt", "a.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn rebuild_from_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (index, report) =
            CorpusIndex::rebuild(&dir.path().join("docx_txt"), small(), scorer()).unwrap();
        assert!(index.is_empty());
        assert_eq!(report.source, SourceState::Missing);
        assert!(index.top_k("gamma", 8).is_empty());
    }

    #[test]
    fn rebuild_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second document").unwrap();
        fs::write(dir.path().join("a.txt"), "first document").unwrap();
        fs::write(dir.path().join("notes.md"), "not indexed").unwrap();

        let (index, report) = CorpusIndex::rebuild(dir.path(), small(), scorer()).unwrap();
        assert_eq!(report.source, SourceState::Present);
        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks, 2);
        assert_eq!(index.chunks()[0].source_file, "a.txt");
    }

    #[test]
    fn invalid_chunking_fails_rebuild() {
        let result = CorpusIndex::from_documents(
            &[Document::new("a.txt", "text")],
            ChunkingSettings { size: 10, overlap: 10 },
            scorer(),
        );
        assert!(matches!(result, Err(KnowledgeError::InvalidChunking { .. })));
    }
}
