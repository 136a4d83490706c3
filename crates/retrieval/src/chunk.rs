//! Overlapping word-window chunker.
//!
//! Splits text into windows of `window` words that advance by
//! `window - overlap` words, so adjacent chunks share `overlap` words of
//! context and every word lands in at least one chunk.
//!
//! # Algorithm
//!
//! 1. Split the text on Unicode whitespace.
//! 2. Emit `words[i .. i + window]` (clamped to the end) at `i = 0`.
//! 3. Stop once a window reaches the last word; otherwise advance `i` by
//!    `window - overlap` and repeat.
//!
//! For `L` words this yields `ceil((L - overlap) / (window - overlap))`
//! chunks when `L > window`, exactly one when `0 < L <= window`, and none
//! for empty text. The last chunk may be shorter than `window`.
//!
//! # Example
//!
//! ```rust
//! use stepwise_retrieval::chunk::chunk_words;
//!
//! let chunks = chunk_words("a b c d e f g", 4, 2);
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[1].text, "c d e f");
//! assert_eq!(chunks[2].offset, 4);
//! ```

/// One window of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordChunk {
    /// 0-based position in the document's chunk sequence
    pub index: usize,
    /// Word offset of the first word
    pub offset: usize,
    /// Number of words in this chunk
    pub words: usize,
    /// Words joined by single spaces
    pub text: String,
}

/// Split `text` into overlapping word windows.
///
/// `window` is clamped to at least 1 and `overlap` to at most `window - 1`,
/// so the loop always advances. Configuration validation rejects those
/// values earlier; the clamps only keep this function total.
pub fn chunk_words(text: &str, window: usize, overlap: usize) -> Vec<WordChunk> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let window = window.max(1);
    let step = window - overlap.min(window - 1);

    let mut chunks = Vec::new();
    let mut i = 0;
    loop {
        let end = (i + window).min(words.len());
        chunks.push(WordChunk {
            index: chunks.len(),
            offset: i,
            words: end - i,
            text: words[i..end].join(" "),
        });
        if end >= words.len() {
            break;
        }
        i += step;
    }
    chunks
}

/// Expected chunk count for `len` words.
pub fn expected_chunks(len: usize, window: usize, overlap: usize) -> usize {
    if len == 0 {
        0
    } else if len <= window {
        1
    } else {
        (len - overlap).div_ceil(window - overlap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_words("", 800, 150).is_empty());
        assert!(chunk_words(" \n\t ", 800, 150).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_words("hello   world\nagain", 800, 150);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world again");
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[0].words, 3);
    }

    #[test]
    fn exactly_one_window() {
        assert_eq!(chunk_words(&doc(800), 800, 150).len(), 1);
    }

    #[test]
    fn count_matches_formula() {
        for &(w, o) in &[(800, 150), (10, 3), (5, 0), (4, 3)] {
            for len in [1, w - 1, w, w + 1, 2 * w, 3 * w + 7, 2000] {
                let chunks = chunk_words(&doc(len), w, o);
                assert_eq!(
                    chunks.len(),
                    expected_chunks(len, w, o),
                    "len={len} w={w} o={o}"
                );
            }
        }
    }

    #[test]
    fn windows_advance_by_window_minus_overlap() {
        let chunks = chunk_words(&doc(2000), 800, 150);
        let offsets: Vec<usize> = chunks.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 650, 1300]);
        assert_eq!(chunks[2].words, 700);
    }

    #[test]
    fn adjacent_chunks_share_overlap() {
        let chunks = chunk_words(&doc(30), 10, 3);
        for pair in chunks.windows(2) {
            let a: Vec<&str> = pair[0].text.split(' ').collect();
            let b: Vec<&str> = pair[1].text.split(' ').collect();
            assert_eq!(&a[a.len() - 3..], &b[..3]);
        }
    }

    #[test]
    fn every_word_is_covered() {
        let len = 1234;
        let chunks = chunk_words(&doc(len), 100, 25);
        let mut covered = vec![false; len];
        for c in &chunks {
            for slot in covered.iter_mut().skip(c.offset).take(c.words) {
                *slot = true;
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn degenerate_parameters_still_terminate() {
        assert_eq!(chunk_words(&doc(5), 0, 0).len(), 5);
        assert_eq!(chunk_words(&doc(5), 2, 9).len(), 4);
    }
}
