//! Flat inner-product index.
//!
//! Vectors live in one contiguous buffer in insertion order, so position
//! `i` in the index is always the `i`-th vector added. Search is exact:
//! every vector is scored and ties keep insertion order.

use crate::error::VectorError;

/// Result of a vector search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// Position of the vector in insertion order
    pub position: usize,
    /// Inner product with the query (cosine for unit vectors)
    pub score: f32,
}

impl SearchResult {
    pub fn new(position: usize, score: f32) -> Self {
        Self { position, score }
    }
}

/// Exact inner-product index over fixed-dimension vectors.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
    len: usize,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
            len: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Append a vector and return its position.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, VectorError> {
        self.check_dimension(vector)?;
        self.data.extend_from_slice(vector);
        self.len += 1;
        Ok(self.len - 1)
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len {
            return None;
        }
        let start = position * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// Keep the vectors whose flag is `true`, compacting positions.
    ///
    /// `keep` must have one flag per stored vector.
    pub fn retain_positions(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.len);
        let dim = self.dimension;
        let mut write = 0;
        for (read, &kept) in keep.iter().enumerate() {
            if kept {
                if read != write {
                    self.data
                        .copy_within(read * dim..(read + 1) * dim, write * dim);
                }
                write += 1;
            }
        }
        self.data.truncate(write * dim);
        self.len = write;
    }

    /// Top `k` positions by descending inner product.
    ///
    /// `k` is clamped to the index size. An empty index returns no results.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, VectorError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        let mut scored: Vec<SearchResult> = (0..self.len)
            .map(|position| {
                let start = position * self.dimension;
                let score = self.data[start..start + self.dimension]
                    .iter()
                    .zip(query)
                    .map(|(a, b)| a * b)
                    .sum();
                SearchResult::new(position, score)
            })
            .collect();

        // sort_by is stable, so equal scores stay in insertion order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k.min(self.len));
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_returns_positions() {
        let mut index = FlatIndex::new(2);
        assert_eq!(index.add(&[1.0, 0.0]).unwrap(), 0);
        assert_eq!(index.add(&[0.0, 1.0]).unwrap(), 1);
        assert_eq!(index.len(), 2);
        assert_eq!(index.vector(1), Some(&[0.0, 1.0][..]));
        assert_eq!(index.vector(2), None);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = FlatIndex::new(3);
        assert!(matches!(
            index.add(&[1.0, 0.0]),
            Err(VectorError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_ranks_by_inner_product() {
        let mut index = FlatIndex::new(2);
        index.add(&[0.0, 1.0]).unwrap();
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[0.6, 0.8]).unwrap();

        let results = index.search(&[1.0, 0.0], 10).unwrap();
        let positions: Vec<_> = results.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 2, 0]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = FlatIndex::new(2);
        for _ in 0..4 {
            index.add(&[1.0, 0.0]).unwrap();
        }
        let positions: Vec<_> = index
            .search(&[1.0, 0.0], 3)
            .unwrap()
            .iter()
            .map(|r| r.position)
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_index_search_is_empty() {
        let index = FlatIndex::new(4);
        assert!(index.search(&[1.0, 0.0, 0.0, 0.0], 5).unwrap().is_empty());
        // Dimension is not checked when there is nothing to compare against
        assert!(index.search(&[1.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_retain_positions_compacts() {
        let mut index = FlatIndex::new(1);
        for v in [1.0, 2.0, 3.0, 4.0] {
            index.add(&[v]).unwrap();
        }
        index.retain_positions(&[false, true, false, true]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.vector(0), Some(&[2.0][..]));
        assert_eq!(index.vector(1), Some(&[4.0][..]));
    }
}
