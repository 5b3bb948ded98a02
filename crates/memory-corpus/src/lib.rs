//! # memory-corpus
//!
//! The note vault as seen by the sync engine.
//!
//! - [`DocumentSource`] walks the vault and parses notes
//! - [`ChangeDetector`] fingerprints files and reports what changed
//! - [`Chunker`] turns a note body into header-prefixed sentence windows

pub mod chunker;
pub mod detector;
pub mod error;
pub mod source;

pub use chunker::{Chunker, Segmenter, UnicodeSegmenter};
pub use detector::{content_hash, ChangeDetector, CorpusDiff, CorpusSnapshot, FileFingerprint};
pub use error::CorpusError;
pub use source::{parse_document, Document, DocumentSource, NoteSummary, PREVIEW_CHARS};
