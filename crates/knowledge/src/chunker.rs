//! Fixed-size overlapping chunker.
//!
//! Offsets and lengths are counted in Unicode scalar values, so a chunk
//! boundary never lands inside a multi-byte UTF-8 sequence.

use atlas_core::error::KnowledgeError;

/// Split `text` into windows of `size` chars, each starting `size - overlap`
/// chars after the previous one. The last window ends at the end of `text`.
///
/// Text shorter than `size` (including `""`) yields exactly one chunk equal
/// to the text.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, KnowledgeError> {
    if overlap == 0 || overlap >= size {
        return Err(KnowledgeError::InvalidChunking { size, overlap });
    }

    // byte offset of every char, plus the end of the string
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = bounds.len() - 1;
    let step = size - overlap;

    let mut chunks = Vec::with_capacity(char_len / step + 1);
    let mut start = 0;
    loop {
        let end = (start + size).min(char_len);
        chunks.push(text[bounds[start]..bounds[end]].to_string());
        if start + size >= char_len {
            break;
        }
        start += step;
    }
    Ok(chunks)
}
