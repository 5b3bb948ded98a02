//! Memory record type.
//!
//! A record is one embedded unit of memory: the exact text that was
//! embedded, its vector, and the origin tag that says where it came from.

use serde::{Deserialize, Serialize};

/// Header prefix the chunker puts in front of every corpus-derived chunk.
///
/// Only used to classify records from legacy memory files that predate the
/// explicit `origins` array. Live code must use [`Origin`] instead.
pub const CORPUS_HEADER_PREFIX: &str = "From note '";

/// Where a memory record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Hand-seeded or user-asserted fact. Never removed by a sync pass.
    Personal,
    /// Produced by scanning the document corpus. Rebuilt wholesale on change.
    Corpus,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Personal => "personal",
            Origin::Corpus => "corpus",
        }
    }

    /// Infer the origin of a legacy record from its text.
    pub fn infer_legacy(text: &str) -> Self {
        if text.starts_with(CORPUS_HEADER_PREFIX) {
            Origin::Corpus
        } else {
            Origin::Personal
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored unit of memory.
///
/// `vector` is produced once at insertion time and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// The exact string that was embedded
    pub text: String,
    /// Fixed-dimension embedding of `text`
    pub vector: Vec<f32>,
    /// Personal vs corpus-derived
    pub origin: Origin,
}

impl MemoryRecord {
    pub fn new(text: impl Into<String>, vector: Vec<f32>, origin: Origin) -> Self {
        Self {
            text: text.into(),
            vector,
            origin,
        }
    }

    pub fn personal(text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self::new(text, vector, Origin::Personal)
    }

    pub fn corpus(text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self::new(text, vector, Origin::Corpus)
    }

    pub fn is_personal(&self) -> bool {
        self.origin == Origin::Personal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_serialization() {
        assert_eq!(
            serde_json::to_string(&Origin::Personal).unwrap(),
            "\"personal\""
        );
        assert_eq!(serde_json::to_string(&Origin::Corpus).unwrap(), "\"corpus\"");

        let origin: Origin = serde_json::from_str("\"corpus\"").unwrap();
        assert_eq!(origin, Origin::Corpus);
    }

    #[test]
    fn test_infer_legacy_origin() {
        assert_eq!(
            Origin::infer_legacy("From note 'Alpha' (Alpha.md):\nSome text."),
            Origin::Corpus
        );
        assert_eq!(Origin::infer_legacy("I like tea."), Origin::Personal);
    }

    #[test]
    fn test_record_constructors() {
        let record = MemoryRecord::personal("I like tea.", vec![1.0, 0.0]);
        assert!(record.is_personal());
        assert_eq!(record.origin.to_string(), "personal");

        let record = MemoryRecord::corpus("From note 'A' (A.md):\nx", vec![0.0, 1.0]);
        assert!(!record.is_personal());
    }
}
