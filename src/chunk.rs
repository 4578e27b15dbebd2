//! Overlapping-window text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters,
//! where each chunk starts `chunk_size - overlap` characters after the
//! previous one so consecutive chunks share `overlap` characters of context.
//!
//! The cut position prefers a semantic boundary found by looking back from
//! the hard limit: a paragraph break (`\n\n`), then a sentence end, then any
//! whitespace. The lookback never extends past the next chunk's start, so
//! snapping can shorten a chunk but can never open a gap between spans —
//! the union of spans always covers the source text exactly.
//!
//! All offsets are character offsets, not bytes. Splitting is fully
//! deterministic: the same text and parameters always produce the same
//! chunk list.

use crate::error::{QaError, Result};
use crate::models::Chunk;

/// Split `text` into overlapping chunks for `document_id`.
///
/// # Errors
///
/// Returns [`QaError::InvalidConfiguration`] unless
/// `chunk_size > overlap >= 0` and `chunk_size > 0`.
///
/// # Edge cases
///
/// - Empty or whitespace-only text produces zero chunks.
/// - Text shorter than `chunk_size` produces exactly one chunk.
/// - The final chunk ends at the end of the text, whatever its length.
pub fn split(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(QaError::InvalidConfiguration(
            "chunk_size must be > 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(QaError::InvalidConfiguration(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    if text.chars().all(char::is_whitespace) {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let stride = chunk_size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    loop {
        let hard_end = (start + chunk_size).min(len);
        let end = if hard_end == len {
            len
        } else {
            // Snapping floor: the next chunk starts at start + stride, and
            // the cut must not move before it or text would be skipped.
            snap_boundary(&chars, start + stride, hard_end)
        };

        chunks.push(Chunk {
            document_id: document_id.to_string(),
            chunk_index: index,
            text: chars[start..end].iter().collect(),
            char_start: start,
            char_end: end,
        });
        index += 1;

        if hard_end == len {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

/// Find the best cut position in `(floor, limit]`, scanning backwards from
/// `limit`. Preference order: paragraph break, sentence end, whitespace.
/// Falls back to the hard limit when the window contains no boundary.
fn snap_boundary(chars: &[char], floor: usize, limit: usize) -> usize {
    let mut sentence: Option<usize> = None;
    let mut word: Option<usize> = None;

    let mut pos = limit;
    while pos > floor {
        if pos >= 2 && chars[pos - 1] == '\n' && chars[pos - 2] == '\n' {
            return pos;
        }
        if sentence.is_none() && is_sentence_end(chars, pos) {
            sentence = Some(pos);
        }
        if word.is_none() && chars[pos - 1].is_whitespace() {
            word = Some(pos);
        }
        pos -= 1;
    }

    sentence.or(word).unwrap_or(limit)
}

/// A cut position `pos` ends a sentence when the preceding character is a
/// terminator and the following character (if any) is whitespace.
fn is_sentence_end(chars: &[char], pos: usize) -> bool {
    if pos == 0 {
        return false;
    }
    let terminator = matches!(chars[pos - 1], '.' | '!' | '?');
    terminator && (pos == chars.len() || chars[pos].is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_spans(text: &str, chunks: &[Chunk]) -> String {
        // Reconstruct the text from spans, dropping each chunk's overlap
        // with the previous one.
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::new();
        let mut covered = 0usize;
        for chunk in chunks {
            assert!(chunk.char_start <= covered, "gap before chunk {}", chunk.chunk_index);
            if chunk.char_end > covered {
                out.extend(&chars[covered..chunk.char_end]);
                covered = chunk.char_end;
            }
        }
        out
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(split("d", "", 100, 20).unwrap().is_empty());
        assert!(split("d", "   \n\n  ", 100, 20).unwrap().is_empty());
    }

    #[test]
    fn short_text_produces_one_chunk() {
        let chunks = split("d", "hello world", 100, 20).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks[0].char_end, 11);
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(matches!(
            split("d", "x", 0, 0),
            Err(QaError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            split("d", "x", 100, 100),
            Err(QaError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            split("d", "x", 100, 200),
            Err(QaError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn spans_cover_text_exactly() {
        let text = "The quick brown fox. Jumps over the lazy dog. \
                    Pack my box with five dozen liquor jugs. How vexingly \
                    quick daft zebras jump!"
            .repeat(8);
        let chunks = split("d", &text, 120, 30).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(join_spans(&text, &chunks), text);
        for chunk in &chunks {
            assert!(chunk.char_start < chunk.char_end);
            assert!(chunk.char_end - chunk.char_start <= 120);
        }
    }

    #[test]
    fn starts_advance_by_stride() {
        // 2500 chars, chunk_size=1000, overlap=200: starts at 0, 800, 1600.
        let text = "a".repeat(2500);
        let chunks = split("d", &text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks[1].char_start, 800);
        assert_eq!(chunks[2].char_start, 1600);
        assert_eq!(chunks[2].char_end, 2500);
    }

    #[test]
    fn deterministic_output() {
        let text = "Sentence one. Sentence two.\n\nA new paragraph with more \
                    text in it. And another sentence to push past the limit."
            .repeat(5);
        let a = split("d", &text, 80, 20).unwrap();
        let b = split("d", &text, 80, 20).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn prefers_paragraph_boundary() {
        // Paragraph break falls inside the lookback window.
        let text = format!("{}\n\n{}", "a".repeat(95), "b".repeat(200));
        let chunks = split("d", &text, 100, 20).unwrap();
        assert_eq!(chunks[0].char_end, 97, "cut should land after the \\n\\n");
    }

    #[test]
    fn prefers_sentence_over_word_boundary() {
        let text = format!("Intro words here. Tail words{}", " x".repeat(200));
        let chunks = split("d", &text, 40, 20).unwrap();
        // Window for the first cut is (20, 40]; sentence end at 18 is out of
        // range, so the cut snaps to whitespace instead of mid-word.
        let first = &chunks[0];
        let last_char = first.text.chars().last().unwrap();
        assert!(last_char.is_whitespace() || !chunks[1].text.starts_with(char::is_alphanumeric));
    }

    #[test]
    fn hard_cut_when_no_boundary_in_window() {
        let text = "x".repeat(500);
        let chunks = split("d", &text, 100, 25).unwrap();
        assert_eq!(chunks[0].char_end, 100);
        assert_eq!(chunks[1].char_start, 75);
        assert_eq!(join_spans(&text, &chunks), text);
    }

    #[test]
    fn overlap_shares_context() {
        let text = "abcdefghij".repeat(30);
        let chunks = split("d", &text, 100, 40).unwrap();
        let first: Vec<char> = chunks[0].text.chars().collect();
        let second: Vec<char> = chunks[1].text.chars().collect();
        // Second chunk starts 60 in; first chunk runs to at least 60.
        assert_eq!(chunks[1].char_start, 60);
        assert!(chunks[0].char_end > 60);
        let shared = chunks[0].char_end - 60;
        assert_eq!(&first[first.len() - shared..], &second[..shared]);
    }

    #[test]
    fn multibyte_text_counts_characters() {
        let text = "héllo wörld ünïcode tèxt ".repeat(20);
        let chunks = split("d", &text, 50, 10).unwrap();
        assert_eq!(join_spans(&text, &chunks), text);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 50);
        }
    }
}
