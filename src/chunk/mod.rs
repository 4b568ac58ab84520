//! Fixed-size character chunking
//!
//! Text is split into windows of `size` characters (Unicode scalar values,
//! never bytes) where consecutive windows share `overlap` characters. The
//! final window holds whatever remains, so every character of the input
//! lands in at least one chunk.

use crate::config::ChunkConfig;
use crate::error::{Error, Result};
use blake3::Hasher;

/// A text chunk with its position in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk text
    pub text: String,

    /// Character start position in the source text
    pub char_start: usize,

    /// Character end position in the source text (exclusive)
    pub char_end: usize,

    /// Chunk index (0-based)
    pub index: usize,

    /// Blake3 hash of the chunk text
    pub hash: String,
}

impl TextChunk {
    pub fn compute_hash(text: &str) -> String {
        let mut hasher = Hasher::new();
        hasher.update(text.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

fn check_window(size: usize, overlap: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::Config("chunk size must be positive".to_string()));
    }
    if overlap >= size {
        return Err(Error::Config(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, size
        )));
    }
    Ok(())
}

/// Character offsets `(start, end)` of each chunk window over `char_count` characters
pub fn chunk_spans(char_count: usize, size: usize, overlap: usize) -> Result<Vec<(usize, usize)>> {
    check_window(size, overlap)?;

    let step = size - overlap;
    let mut spans = Vec::with_capacity(char_count / step + 1);
    let mut offset = 0;

    loop {
        if char_count - offset <= size {
            spans.push((offset, char_count));
            break;
        }
        spans.push((offset, offset + size));
        offset += step;
    }

    Ok(spans)
}

/// Split `text` into overlapping chunks of at most `size` characters
///
/// Empty text yields a single empty chunk.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(chunk_with_spans(text, size, overlap)?
        .into_iter()
        .map(|c| c.text)
        .collect())
}

/// Chunk text with the configured window
pub fn chunk_document(text: &str, config: &ChunkConfig) -> Result<Vec<TextChunk>> {
    chunk_with_spans(text, config.size, config.overlap)
}

fn chunk_with_spans(text: &str, size: usize, overlap: usize) -> Result<Vec<TextChunk>> {
    // Byte offset of every character, plus the end of the string
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let chunks = chunk_spans(char_count, size, overlap)?
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| {
            let slice = &text[boundaries[start]..boundaries[end]];
            TextChunk {
                hash: TextChunk::compute_hash(slice),
                text: slice.to_string(),
                char_start: start,
                char_end: end,
                index,
            }
        })
        .collect();

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_empty_text_yields_one_empty_chunk() {
        let chunks = chunk_text("", 4000, 1000).unwrap();
        assert_eq!(chunks, vec![String::new()]);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("hello world", 4000, 1000).unwrap();
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_exact_size_is_single_chunk() {
        let text = "x".repeat(4000);
        let chunks = chunk_text(&text, 4000, 1000).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_default_window_over_ten_thousand_chars() {
        let text: String = (0..10_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let spans = chunk_spans(10_000, 4000, 1000).unwrap();
        assert_eq!(spans, vec![(0, 4000), (3000, 7000), (6000, 10_000)]);

        let chunks = chunk_text(&text, 4000, 1000).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4000));
        assert_eq!(reconstruct(&chunks, 1000), text);
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let text: String = (0..50).map(|i| char::from(b'0' + (i % 10) as u8)).collect();
        let chunks = chunk_text(&text, 20, 5).unwrap();

        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 5).collect();
            let head: String = pair[1].chars().take(5).collect();
            assert_eq!(tail, head);
        }
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn test_multibyte_characters_are_counted_as_chars() {
        let text = "é漢🙂".repeat(7);
        let chunks = chunk_text(&text, 5, 2).unwrap();

        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn test_reconstruction_across_windows() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(13);
        for (size, overlap) in [(7, 0), (10, 3), (64, 63), (100, 50), (1000, 10)] {
            let chunks = chunk_text(&text, size, overlap).unwrap();
            assert_eq!(reconstruct(&chunks, overlap), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn test_invalid_window_is_config_error() {
        assert!(matches!(chunk_text("abc", 10, 10), Err(Error::Config(_))));
        assert!(matches!(chunk_text("abc", 10, 11), Err(Error::Config(_))));
        assert!(matches!(chunk_text("abc", 0, 0), Err(Error::Config(_))));
    }

    #[test]
    fn test_chunk_document_positions_and_hashes() {
        let config = ChunkConfig {
            size: 10,
            overlap: 2,
        };
        let chunks = chunk_document("abcdefghijklmnopqrstuvwxyz", &config).unwrap();

        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks[0].char_end, 10);
        assert_eq!(chunks[1].char_start, 8);
        assert_eq!(chunks.last().unwrap().char_end, 26);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[0].hash, TextChunk::compute_hash("abcdefghij"));
        assert_ne!(chunks[0].hash, chunks[1].hash);
    }
}
