//! Knowledge layer for Atlas.
//!
//! Turns a directory of plain-text documents into two artifacts:
//!
//! - a [`CorpusIndex`] of overlapping chunks, queried per request with a
//!   token-overlap score plus a keyword bonus;
//! - a bounded-size essence produced by the [`Distiller`].
//!
//! Everything here is synchronous and side-effect free except the directory
//! scan and the essence artifact write; callers on an async runtime run
//! rebuilds on a blocking thread.

pub mod chunker;
pub mod distiller;
pub mod document;
pub mod index;
pub mod scorer;

pub use chunker::chunk;
pub use distiller::{
    DistillOutcome, DistillSettings, DistilledEssence, Distiller, PREAMBLE, read_essence, write_atomic,
};
pub use document::{CorpusScan, Document, SkippedDocument, SourceState, list_documents};
pub use index::{Chunk, ChunkingSettings, CorpusIndex, RebuildReport, ScoredChunk};
pub use scorer::{KeywordPattern, Scorer, tokenize};
