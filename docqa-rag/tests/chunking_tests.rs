//! Property tests for the segmentation strategies.

use docqa_rag::chunking::{Chunker, ParagraphChunker, SlidingWindowChunker, normalize_whitespace};
use proptest::prelude::*;

/// Prose-like text: words, sentence punctuation, newlines and stray controls.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            8 => "[a-zA-Z]{1,10}",
            3 => Just(" ".to_string()),
            1 => Just(". ".to_string()),
            1 => Just("! ".to_string()),
            1 => Just("?".to_string()),
            1 => Just("\n".to_string()),
            1 => Just("\n\n".to_string()),
            1 => Just("\t\u{1}".to_string()),
            1 => Just("é".to_string()),
        ],
        0..200,
    )
    .prop_map(|parts| parts.concat())
}

/// *For any* text and `0 <= overlap < chunk_size`, the sliding window SHALL
/// emit chunks whose spans cover every non-whitespace character of the
/// cleaned text, with strictly increasing start offsets and non-empty spans.
mod prop_sliding_window {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_cover_cleaned_text(
            text in arb_text(),
            (chunk_size, overlap) in (1usize..300).prop_flat_map(|size| (Just(size), 0..size)),
        ) {
            let cleaned: Vec<char> = normalize_whitespace(&text).chars().collect();
            let chunks = SlidingWindowChunker::new(chunk_size, overlap).chunk(&text);

            if cleaned.is_empty() {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.index, i);
                prop_assert!(chunk.start_offset < chunk.end_offset);
                prop_assert!(chunk.end_offset <= cleaned.len());
                let span: String = cleaned[chunk.start_offset..chunk.end_offset].iter().collect();
                prop_assert_eq!(chunk.text.as_str(), span.trim());
            }
            for pair in chunks.windows(2) {
                prop_assert!(pair[0].start_offset < pair[1].start_offset);
            }
            for (pos, c) in cleaned.iter().enumerate() {
                if c.is_whitespace() {
                    continue;
                }
                prop_assert!(
                    chunks.iter().any(|ch| ch.start_offset <= pos && pos < ch.end_offset),
                    "character {} at {} not covered", c, pos
                );
            }
        }

        #[test]
        fn windows_never_exceed_chunk_size(
            text in arb_text(),
            (chunk_size, overlap) in (1usize..300).prop_flat_map(|size| (Just(size), 0..size)),
        ) {
            for chunk in SlidingWindowChunker::new(chunk_size, overlap).chunk(&text) {
                prop_assert!(chunk.end_offset - chunk.start_offset <= chunk_size);
            }
        }
    }
}

/// *For any* `min_chunk_size`, a paragraph of exactly that length SHALL be
/// kept and one a character shorter SHALL be dropped.
mod prop_paragraph_bounds {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn minimum_is_inclusive(min in 1usize..80, extra in 1usize..80) {
            let max = min + extra;
            let kept = "k".repeat(min);
            let dropped = "d".repeat(min - 1);
            let text = format!("{dropped}\n\n{kept}\n");

            let chunks = ParagraphChunker::new(max, min).chunk(&text);
            prop_assert_eq!(chunks.len(), 1);
            prop_assert_eq!(&chunks[0].text, &kept);
            prop_assert_eq!(chunks[0].index, 0);
        }

        #[test]
        fn sub_chunks_respect_bounds_unless_single_sentence(
            sentences in proptest::collection::vec("[a-z]{1,12}( [a-z]{1,12}){0,4}[.!?]", 1..30),
            max in 20usize..120,
        ) {
            let min = 5;
            let paragraph = sentences.join(" ");
            let chunks = ParagraphChunker::new(max, min).chunk(&paragraph);
            for chunk in &chunks {
                let len = chunk.text.chars().count();
                prop_assert!(len >= min);
                prop_assert!(len <= max || sentences.iter().any(|s| s == &chunk.text));
            }
        }
    }
}

#[test]
fn strategies_are_deterministic() {
    let text = "Lorem ipsum dolor sit amet. Consectetur adipiscing elit!\n\n\
                Sed do eiusmod tempor incididunt? Ut labore et dolore magna aliqua.";
    let window = SlidingWindowChunker::new(40, 10);
    let paragraph = ParagraphChunker::new(40, 10);
    assert_eq!(window.chunk(text), window.chunk(text));
    assert_eq!(paragraph.chunk(text), paragraph.chunk(text));
}
