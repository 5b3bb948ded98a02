//! Vector memory store.
//!
//! An ordered list of texts and origins next to a [`FlatIndex`]. Position
//! `i` in the text list and position `i` in the index always describe the
//! same record: the only mutators push or drop both halves together.

use memory_types::{MemoryRecord, Origin};

use crate::error::VectorError;
use crate::index::FlatIndex;

/// Borrowed view of one stored record.
#[derive(Debug, Clone, Copy)]
pub struct RecordRef<'a> {
    pub position: usize,
    pub text: &'a str,
    pub vector: &'a [f32],
    pub origin: Origin,
}

impl RecordRef<'_> {
    pub fn to_record(&self) -> MemoryRecord {
        MemoryRecord::new(self.text.to_string(), self.vector.to_vec(), self.origin)
    }
}

/// A search match.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub position: usize,
    pub score: f32,
    pub text: String,
    pub origin: Origin,
}

/// Column-wise copy of a store, the shape persisted to disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreParts {
    pub texts: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
    pub origins: Vec<Origin>,
}

/// Ordered (text, vector, origin) records with similarity search.
#[derive(Debug, Clone)]
pub struct VectorMemoryStore {
    texts: Vec<String>,
    origins: Vec<Origin>,
    index: FlatIndex,
}

impl VectorMemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            texts: Vec::new(),
            origins: Vec::new(),
            index: FlatIndex::new(dimension),
        }
    }

    /// Rebuild a store from persisted columns.
    ///
    /// Fails with [`VectorError::Misaligned`] when the columns differ in
    /// length, and with [`VectorError::DimensionMismatch`] when a vector
    /// does not have `dimension` components.
    pub fn from_parts(dimension: usize, parts: StoreParts) -> Result<Self, VectorError> {
        let StoreParts {
            texts,
            vectors,
            origins,
        } = parts;
        if texts.len() != vectors.len() || texts.len() != origins.len() {
            return Err(VectorError::Misaligned {
                texts: texts.len(),
                vectors: vectors.len(),
                origins: origins.len(),
            });
        }

        let mut index = FlatIndex::new(dimension);
        for vector in &vectors {
            index.add(vector)?;
        }

        Ok(Self {
            texts,
            origins,
            index,
        })
    }

    pub fn to_parts(&self) -> StoreParts {
        StoreParts {
            texts: self.texts.clone(),
            vectors: self.records().map(|r| r.vector.to_vec()).collect(),
            origins: self.origins.clone(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn size(&self) -> usize {
        self.assert_aligned();
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Append one record.
    pub fn add(
        &mut self,
        text: impl Into<String>,
        vector: &[f32],
        origin: Origin,
    ) -> Result<usize, VectorError> {
        let position = self.index.add(vector)?;
        self.texts.push(text.into());
        self.origins.push(origin);
        self.assert_aligned();
        Ok(position)
    }

    pub fn add_record(&mut self, record: MemoryRecord) -> Result<usize, VectorError> {
        self.add(record.text, &record.vector, record.origin)
    }

    /// Remove every record matching `predicate`. Survivors keep their
    /// relative order. Returns the number removed.
    pub fn remove_by_predicate<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&RecordRef<'_>) -> bool,
    {
        let keep: Vec<bool> = self.records().map(|r| !predicate(&r)).collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return 0;
        }

        let mut flags = keep.iter();
        self.texts.retain(|_| *flags.next().unwrap_or(&true));
        let mut flags = keep.iter();
        self.origins.retain(|_| *flags.next().unwrap_or(&true));
        self.index.retain_positions(&keep);

        self.assert_aligned();
        removed
    }

    /// Up to `k` records by descending similarity to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>, VectorError> {
        Ok(self
            .index
            .search(query, k)?
            .into_iter()
            .map(|hit| ScoredRecord {
                position: hit.position,
                score: hit.score,
                text: self.texts[hit.position].clone(),
                origin: self.origins[hit.position],
            })
            .collect())
    }

    pub fn get(&self, position: usize) -> Option<RecordRef<'_>> {
        let vector = self.index.vector(position)?;
        Some(RecordRef {
            position,
            text: &self.texts[position],
            vector,
            origin: self.origins[position],
        })
    }

    pub fn records(&self) -> impl Iterator<Item = RecordRef<'_>> + '_ {
        (0..self.texts.len()).filter_map(move |i| self.get(i))
    }

    pub fn contains_text(&self, text: &str) -> bool {
        self.texts.iter().any(|t| t == text)
    }

    pub fn count_by_origin(&self, origin: Origin) -> usize {
        self.origins.iter().filter(|o| **o == origin).count()
    }

    /// A copy holding only the records of `origin`, in their original order.
    pub fn retain_origin(&self, origin: Origin) -> Self {
        let mut copy = self.clone();
        copy.remove_by_predicate(|r| r.origin != origin);
        copy
    }

    fn assert_aligned(&self) {
        debug_assert_eq!(self.texts.len(), self.index.len());
        debug_assert_eq!(self.texts.len(), self.origins.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn unit(x: f32, y: f32) -> Vec<f32> {
        let n = (x * x + y * y).sqrt();
        vec![x / n, y / n]
    }

    #[test]
    fn test_add_and_search() {
        let mut store = VectorMemoryStore::new(2);
        store.add("east", &unit(1.0, 0.0), Origin::Personal).unwrap();
        store.add("north", &unit(0.0, 1.0), Origin::Corpus).unwrap();

        let hits = store.search(&unit(0.1, 1.0), 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "north");
        assert_eq!(hits[0].origin, Origin::Corpus);
    }

    #[test]
    fn test_search_empty_store() {
        let store = VectorMemoryStore::new(2);
        assert!(store.search(&unit(1.0, 0.0), 5).unwrap().is_empty());
    }

    #[test]
    fn test_k_is_clamped() {
        let mut store = VectorMemoryStore::new(2);
        store.add("a", &unit(1.0, 0.0), Origin::Personal).unwrap();
        store.add("b", &unit(1.0, 1.0), Origin::Personal).unwrap();
        assert_eq!(store.search(&unit(1.0, 0.0), 50).unwrap().len(), 2);
    }

    #[test]
    fn test_rejected_add_leaves_store_unchanged() {
        let mut store = VectorMemoryStore::new(2);
        assert!(store.add("bad", &[1.0, 0.0, 0.0], Origin::Personal).is_err());
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_remove_by_predicate_keeps_order() {
        let mut store = VectorMemoryStore::new(2);
        store.add("p1", &unit(1.0, 0.0), Origin::Personal).unwrap();
        store.add("c1", &unit(0.0, 1.0), Origin::Corpus).unwrap();
        store.add("p2", &unit(1.0, 1.0), Origin::Personal).unwrap();
        store.add("c2", &unit(1.0, -1.0), Origin::Corpus).unwrap();

        let removed = store.remove_by_predicate(|r| r.origin == Origin::Corpus);
        assert_eq!(removed, 2);

        let texts: Vec<_> = store.records().map(|r| r.text).collect();
        assert_eq!(texts, vec!["p1", "p2"]);
        assert_eq!(store.get(1).unwrap().vector, &unit(1.0, 1.0)[..]);
    }

    #[test]
    fn test_positions_stay_aligned_under_random_operations() {
        let mut rng = rand::rng();
        let mut store = VectorMemoryStore::new(2);

        for step in 0..200 {
            if rng.random_bool(0.8) {
                let angle: f32 = rng.random_range(0.0..std::f32::consts::TAU);
                let origin = if rng.random_bool(0.5) {
                    Origin::Personal
                } else {
                    Origin::Corpus
                };
                store
                    .add(format!("{}:{}", step, angle), &[angle.cos(), angle.sin()], origin)
                    .unwrap();
            } else {
                let cut: f32 = rng.random_range(0.0..std::f32::consts::TAU);
                store.remove_by_predicate(|r| r.vector[1].atan2(r.vector[0]) > cut - 3.2);
            }

            // Every record's text encodes the angle of its own vector
            for record in store.records() {
                let angle: f32 = record.text.split(':').nth(1).unwrap().parse().unwrap();
                assert!((record.vector[0] - angle.cos()).abs() < 1e-6);
            }
            for hit in store.search(&[1.0, 0.0], 10).unwrap() {
                assert!(hit.position < store.size());
            }
        }
    }

    #[test]
    fn test_parts_round_trip() {
        let mut store = VectorMemoryStore::new(2);
        store.add("a", &unit(1.0, 0.0), Origin::Personal).unwrap();
        store.add("b", &unit(0.0, 1.0), Origin::Corpus).unwrap();

        let parts = store.to_parts();
        let rebuilt = VectorMemoryStore::from_parts(2, parts.clone()).unwrap();
        assert_eq!(rebuilt.to_parts(), parts);
    }

    #[test]
    fn test_from_parts_rejects_misaligned() {
        let parts = StoreParts {
            texts: vec!["a".to_string(), "b".to_string()],
            vectors: vec![vec![1.0, 0.0]],
            origins: vec![Origin::Personal, Origin::Personal],
        };
        assert!(matches!(
            VectorMemoryStore::from_parts(2, parts),
            Err(VectorError::Misaligned {
                texts: 2,
                vectors: 1,
                origins: 2
            })
        ));
    }

    #[test]
    fn test_retain_origin_and_counts() {
        let mut store = VectorMemoryStore::new(2);
        store.add("p", &unit(1.0, 0.0), Origin::Personal).unwrap();
        store.add("c", &unit(0.0, 1.0), Origin::Corpus).unwrap();

        assert_eq!(store.count_by_origin(Origin::Corpus), 1);
        let personal = store.retain_origin(Origin::Personal);
        assert_eq!(personal.size(), 1);
        assert!(personal.contains_text("p"));
        assert_eq!(store.size(), 2);
    }
}
