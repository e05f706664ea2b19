//! Per-request prompt context assembly.
//!
//! # Message order
//!
//! | # | Layer | Source |
//! |---|-------|--------|
//! | 1 | Persona | Essence if usable, otherwise the fixed persona |
//! | 2 | Retrieved | Top-k corpus chunks, or an explicit "no hits" note |
//! | 3 | Memory | Most recent long-term memory entries, oldest first |
//! | 4 | History | Turns supplied by the caller, oldest first |
//! | 5 | User | The current message (with inline images) |

pub mod assembler;
pub mod token;

pub use assembler::{
    AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler, LayerStats,
    PersonaSource, format_hits,
};
