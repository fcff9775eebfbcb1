//! Text segmentation strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`SlidingWindowChunker`] - fixed-size windows with overlap that prefer to
//!   end on a sentence boundary
//! - [`ParagraphChunker`] - paragraph-aware splitting bounded by a minimum and
//!   maximum chunk size, falling back to sentence packing for long paragraphs
//!
//! All offsets and sizes are measured in characters, not bytes.

use crate::document::Chunk;

/// How far back from a tentative window end to look for a sentence break.
const SENTENCE_LOOKBACK: usize = 100;

/// A strategy for splitting raw text into chunks.
///
/// Segmentation has no failure mode: empty input yields an empty `Vec`, and
/// identical input and parameters always yield identical output.
pub trait Chunker: Send + Sync {
    /// Split `text` into chunks with sequential, 0-based indices.
    fn chunk(&self, text: &str) -> Vec<Chunk>;
}

/// Remove C0 control characters other than tab, newline and carriage return.
pub fn strip_control_chars(text: &str) -> String {
    text.chars().filter(|c| !is_stripped_control(*c)).collect()
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}')
}

/// Strip control characters, then collapse every whitespace run to one space
/// and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    strip_control_chars(text).split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_sentence_break(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\n')
}

/// Splits text into fixed-size windows with configurable overlap.
///
/// Whitespace is normalized before segmentation. When a window does not reach
/// the end of the text, its end is pulled back to just after the rightmost
/// `.`, `!`, `?` or newline within the last 100 characters, if any.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{Chunker, SlidingWindowChunker};
///
/// let chunker = SlidingWindowChunker::new(500, 50);
/// let chunks = chunker.chunk(&text);
/// ```
#[derive(Debug, Clone)]
pub struct SlidingWindowChunker {
    chunk_size: usize,
    overlap: usize,
}

impl SlidingWindowChunker {
    /// Create a new `SlidingWindowChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: target number of characters per chunk
    /// * `overlap`: number of characters shared by consecutive windows
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size, overlap }
    }
}

impl Chunker for SlidingWindowChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = normalize_whitespace(text).chars().collect();
        let len = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let end = (start + self.chunk_size).min(len);

            let mut actual_end = end;
            if end < len {
                let search_start = start.max(end.saturating_sub(SENTENCE_LOOKBACK));
                let window = &chars[search_start..end];
                if let Some(pos) = window.iter().rposition(|c| is_sentence_break(*c)) {
                    actual_end = search_start + pos + 1;
                }
            }

            let slice: String = chars[start..actual_end].iter().collect();
            let trimmed = slice.trim();
            if !trimmed.is_empty() {
                chunks.push(Chunk {
                    text: trimmed.to_string(),
                    index: chunks.len(),
                    start_offset: start,
                    end_offset: actual_end,
                });
            }

            // The +1 floor guarantees progress when overlap >= window length.
            start = if actual_end < len {
                (start + 1).max(actual_end.saturating_sub(self.overlap))
            } else {
                actual_end
            };
        }

        chunks
    }
}

/// Splits text on paragraph boundaries, keeping paragraphs whose size falls
/// within `[min_chunk_size, max_chunk_size]`.
///
/// Paragraphs shorter than the minimum are dropped. Paragraphs longer than
/// the maximum are split into sentences that are packed greedily into
/// sub-chunks of at most `max_chunk_size` characters; sub-chunks shorter than
/// the minimum are dropped as well. A single sentence longer than the maximum
/// is kept whole.
///
/// Offsets are approximate: they advance by each paragraph's trimmed length
/// and do not count the newlines and whitespace removed between paragraphs.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    max_chunk_size: usize,
    min_chunk_size: usize,
}

impl ParagraphChunker {
    /// Create a new `ParagraphChunker`.
    ///
    /// # Arguments
    ///
    /// * `max_chunk_size`: largest paragraph emitted without sentence splitting
    /// * `min_chunk_size`: smallest paragraph or sub-chunk that is kept
    pub fn new(max_chunk_size: usize, min_chunk_size: usize) -> Self {
        Self { max_chunk_size, min_chunk_size }
    }

    fn push(&self, chunks: &mut Vec<Chunk>, text: &str, start_offset: usize) {
        let trimmed = text.trim();
        let len = trimmed.chars().count();
        if len == 0 || len < self.min_chunk_size {
            return;
        }
        chunks.push(Chunk {
            text: trimmed.to_string(),
            index: chunks.len(),
            start_offset,
            end_offset: start_offset + len,
        });
    }

    fn split_long_paragraph(&self, chunks: &mut Vec<Chunk>, paragraph: &str, offset: usize) {
        let mut buffer = String::new();
        let mut buffer_len = 0;
        let mut buffer_start = offset;
        let mut consumed = 0;

        for sentence in split_sentences(paragraph) {
            let sentence_len = sentence.chars().count();
            if buffer_len > 0 && buffer_len + 1 + sentence_len > self.max_chunk_size {
                self.push(chunks, &buffer, buffer_start);
                buffer.clear();
                buffer_len = 0;
            }
            if buffer_len == 0 {
                buffer_start = offset + consumed;
            } else {
                buffer.push(' ');
                buffer_len += 1;
            }
            buffer.push_str(sentence);
            buffer_len += sentence_len;
            consumed += sentence_len + 1;
        }

        if buffer_len > 0 {
            self.push(chunks, &buffer, buffer_start);
        }
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let cleaned = strip_control_chars(text);
        let mut chunks = Vec::new();
        let mut offset = 0;

        for paragraph in cleaned.split('\n').map(str::trim).filter(|p| !p.is_empty()) {
            let len = paragraph.chars().count();
            if len > self.max_chunk_size {
                self.split_long_paragraph(&mut chunks, paragraph, offset);
            } else {
                self.push(&mut chunks, paragraph, offset);
            }
            offset += len;
        }

        chunks
    }
}

/// Split after `.`, `!` or `?` when followed by whitespace. The whitespace
/// itself is dropped; empty pieces are skipped.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((_, c)) = iter.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let Some(&(next_i, next)) = iter.peek() else { break };
        if !next.is_whitespace() {
            continue;
        }
        let sentence = text[start..next_i].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = next_i;
        while let Some(&(_, ws)) = iter.peek() {
            if !ws.is_whitespace() {
                break;
            }
            iter.next();
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(SlidingWindowChunker::new(100, 10).chunk("").is_empty());
        assert!(ParagraphChunker::new(100, 10).chunk("").is_empty());
        assert!(SlidingWindowChunker::new(100, 10).chunk("   \n\t ").is_empty());
    }

    #[test]
    fn normalize_collapses_whitespace_and_strips_controls() {
        assert_eq!(normalize_whitespace("  a\n\n b\t\x01c  "), "a b c");
        assert_eq!(strip_control_chars("a\x07b\nc\td"), "ab\nc\td");
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = SlidingWindowChunker::new(500, 50).chunk("Hello world.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello world.");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 12);
    }

    #[test]
    fn window_prefers_sentence_break() {
        let text = "First sentence here. Second sentence that runs long";
        let chunks = SlidingWindowChunker::new(30, 0).chunk(text);
        assert_eq!(chunks[0].text, "First sentence here.");
        assert_eq!(chunks[0].end_offset, 20);
        assert_eq!(chunks[1].start_offset, 20);
    }

    #[test]
    fn window_without_break_cuts_at_size() {
        let text = "a".repeat(25);
        let chunks = SlidingWindowChunker::new(10, 2).chunk(&text);
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_offset).collect();
        assert_eq!(starts, vec![0, 8, 16]);
        assert_eq!(chunks[0].end_offset, 10);
        assert_eq!(chunks.last().unwrap().end_offset, 25);
    }

    #[test]
    fn overlap_larger_than_window_still_terminates() {
        let text = "a. b. c. d. e. f.";
        let chunks = SlidingWindowChunker::new(3, 2).chunk(text);
        assert!(!chunks.is_empty());
        for pair in chunks.windows(2) {
            assert!(pair[0].start_offset < pair[1].start_offset);
        }
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let text = "héllo wörld. ñandú";
        let chunks = SlidingWindowChunker::new(100, 0).chunk(text);
        assert_eq!(chunks[0].end_offset, text.chars().count());
    }

    #[test]
    fn paragraph_bounds_are_inclusive() {
        let chunker = ParagraphChunker::new(20, 5);
        let chunks = chunker.chunk("abcde\nabcd\n\nabcdefghij");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcde", "abcdefghij"]);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn dropped_paragraph_still_advances_offset() {
        let chunks = ParagraphChunker::new(50, 5).chunk("abc\nlonger paragraph");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_offset, 3);
        assert_eq!(chunks[0].end_offset, 3 + "longer paragraph".len());
    }

    #[test]
    fn long_paragraph_packs_sentences() {
        let paragraph = "One two three. Four five six! Seven eight nine? Ten.";
        let chunks = ParagraphChunker::new(30, 3).chunk(paragraph);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["One two three. Four five six!", "Seven eight nine? Ten."]);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 30);
        }
        assert_eq!(chunks[1].start_offset, 30);
    }

    #[test]
    fn short_tail_sentence_is_dropped() {
        let paragraph = "This sentence is long enough. Ok.";
        let chunks = ParagraphChunker::new(30, 10).chunk(paragraph);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["This sentence is long enough."]);
    }

    #[test]
    fn sentence_split_requires_trailing_whitespace() {
        assert_eq!(split_sentences("v1.2 is out. Go!"), vec!["v1.2 is out.", "Go!"]);
        assert_eq!(split_sentences("Wait...  what?"), vec!["Wait...", "what?"]);
    }

    #[test]
    fn segmentation_is_deterministic() {
        let text = "Alpha beta. Gamma delta!\nEpsilon zeta? Eta theta.";
        let a = SlidingWindowChunker::new(12, 4).chunk(text);
        let b = SlidingWindowChunker::new(12, 4).chunk(text);
        assert_eq!(a, b);
    }
}
