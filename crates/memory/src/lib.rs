//! Conversation memory implementations for Atlas.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::FileBackend;
pub use in_memory::InMemoryBackend;

/// Drop the oldest entries so at most `cap` remain.
pub(crate) fn enforce_cap<T>(entries: &mut Vec<T>, cap: usize) {
    if entries.len() > cap {
        let excess = entries.len() - cap;
        entries.drain(..excess);
    }
}
