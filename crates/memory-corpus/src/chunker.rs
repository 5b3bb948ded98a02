//! Sentence-window chunking.
//!
//! A document body is split into sentences and grouped into fixed-size
//! windows. Each chunk carries a `From note '<title>' (<file>):` header so
//! a retrieved chunk still says where it came from.

use std::sync::Arc;

use memory_types::CORPUS_HEADER_PREFIX;
use unicode_segmentation::UnicodeSegmentation;

/// Splits text into sentences.
pub trait Segmenter: Send + Sync {
    fn sentences(&self, text: &str) -> Vec<String>;
}

/// Unicode (UAX #29) sentence boundaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnicodeSegmenter;

impl Segmenter for UnicodeSegmenter {
    fn sentences(&self, text: &str) -> Vec<String> {
        text.unicode_sentences()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Groups sentences into header-prefixed chunks.
#[derive(Clone)]
pub struct Chunker {
    sentences_per_chunk: usize,
    segmenter: Arc<dyn Segmenter>,
}

impl Chunker {
    pub fn new(sentences_per_chunk: usize, segmenter: Arc<dyn Segmenter>) -> Self {
        Self {
            sentences_per_chunk: sentences_per_chunk.max(1),
            segmenter,
        }
    }

    pub fn sentences_per_chunk(&self) -> usize {
        self.sentences_per_chunk
    }

    /// Sentence windows without a header.
    pub fn windows(&self, text: &str) -> Vec<String> {
        self.segmenter
            .sentences(text)
            .chunks(self.sentences_per_chunk)
            .map(|window| window.join(" "))
            .collect()
    }

    /// Header-prefixed chunks for one document. An empty body yields none.
    pub fn chunk(&self, body: &str, title: &str, file_name: &str) -> Vec<String> {
        self.windows(body)
            .into_iter()
            .map(|window| format!("{}{}' ({}):\n{}", CORPUS_HEADER_PREFIX, title, file_name, window))
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(5, Arc::new(UnicodeSegmenter))
    }
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("sentences_per_chunk", &self.sentences_per_chunk)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_sentences() {
        let sentences = UnicodeSegmenter.sentences("One fish. Two fish!  Red fish? Blue fish.");
        assert_eq!(sentences, vec!["One fish.", "Two fish!", "Red fish?", "Blue fish."]);
    }

    #[test]
    fn test_short_document_is_one_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.chunk("One. Two. Three.", "Alpha", "Alpha.md");
        assert_eq!(chunks, vec!["From note 'Alpha' (Alpha.md):\nOne. Two. Three.".to_string()]);
    }

    #[test]
    fn test_long_document_splits_on_window() {
        let chunker = Chunker::new(2, Arc::new(UnicodeSegmenter));
        let chunks = chunker.chunk("A one. A two. A three. A four. A five.", "Notes", "notes.md");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "From note 'Notes' (notes.md):\nA one. A two.");
        assert_eq!(chunks[2], "From note 'Notes' (notes.md):\nA five.");
    }

    #[test]
    fn test_empty_body_has_no_chunks() {
        let chunker = Chunker::default();
        assert!(chunker.chunk("", "Empty", "empty.md").is_empty());
        assert!(chunker.chunk("   \n\n ", "Empty", "empty.md").is_empty());
    }

    #[test]
    fn test_zero_window_is_clamped() {
        let chunker = Chunker::new(0, Arc::new(UnicodeSegmenter));
        assert_eq!(chunker.sentences_per_chunk(), 1);
        assert_eq!(chunker.windows("A. B.").len(), 2);
    }

    #[test]
    fn test_custom_segmenter() {
        struct Lines;
        impl Segmenter for Lines {
            fn sentences(&self, text: &str) -> Vec<String> {
                text.lines().map(str::to_string).collect()
            }
        }

        let chunker = Chunker::new(1, Arc::new(Lines));
        let chunks = chunker.chunk("first\nsecond", "T", "t.md");
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].ends_with("\nsecond"));
    }
}
