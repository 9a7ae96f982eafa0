// Vector index module
// Append-only exact nearest-neighbor index over one session's chunk embeddings


pub mod codec;

use itertools::Itertools;
use std::cmp::Ordering;
use tracing::debug;

use crate::{RagError, Result};

/// One search hit: position of the vector (== chunk position) and its score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPosition {
    pub position: usize,
    pub score: f32,
}

/// Flat inner-product index.
///
/// Vectors are L2-normalized on insertion and queries are normalized before
/// scoring, so scores are cosine similarities in `[-1, 1]`. Storage is a
/// single row-major buffer; position `i` occupies
/// `data[i * dimension..(i + 1) * dimension]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    generation: u64,
    data: Vec<f32>,
}

impl VectorIndex {
    /// An index with no vectors yet
    #[inline]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            generation: 0,
            data: Vec::new(),
        }
    }

    /// Build a new index sized to the dimension of the first batch
    #[inline]
    pub fn create(embeddings: &[Vec<f32>]) -> Result<Self> {
        let first = embeddings.first().ok_or_else(|| {
            RagError::Embedding("Cannot create an index from an empty batch".to_string())
        })?;
        if first.is_empty() {
            return Err(RagError::Dimension {
                expected: 1,
                actual: 0,
            });
        }

        let mut index = Self::with_dimension(first.len());
        index.append(embeddings)?;
        debug!(
            "Created index with {} vectors of dimension {}",
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    /// Used by the codec; `data.len()` must be a multiple of `dimension`
    pub(crate) fn from_parts(dimension: usize, generation: u64, data: Vec<f32>) -> Self {
        Self {
            dimension,
            generation,
            data,
        }
    }

    /// Add vectors to the end. The whole batch is validated first, so a
    /// dimension mismatch leaves the index untouched.
    #[inline]
    pub fn append(&mut self, embeddings: &[Vec<f32>]) -> Result<()> {
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(RagError::Dimension {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.data.reserve(embeddings.len() * self.dimension);
        for embedding in embeddings {
            let norm = l2_norm(embedding);
            if norm > 0.0 {
                self.data.extend(embedding.iter().map(|value| value / norm));
            } else {
                self.data.extend_from_slice(embedding);
            }
        }
        Ok(())
    }

    /// Exact top-k by descending score; ties resolve to the lower position.
    /// Returns at most `min(k, len)` hits and never fails on an empty index.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPosition>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(RagError::Dimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let norm = l2_norm(query);
        let query: Vec<f32> = if norm > 0.0 {
            query.iter().map(|value| value / norm).collect()
        } else {
            query.to_vec()
        };

        let hits = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| ScoredPosition {
                position,
                score: dot(vector, &query),
            })
            .k_smallest_by(k, rank_order)
            .collect();

        Ok(hits)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Generation counter of the last committed write
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Stored (normalized) vector at `position`
    #[inline]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    pub(crate) fn raw_data(&self) -> &[f32] {
        &self.data
    }

    /// Size of the serialized form in bytes
    #[inline]
    pub fn serialized_size(&self) -> usize {
        codec::HEADER_LEN + self.data.len() * size_of::<f32>()
    }
}

/// Higher score first, then lower position
fn rank_order(a: &ScoredPosition, b: &ScoredPosition) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.position.cmp(&b.position))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).fold(0.0, |acc, (x, y)| x.mul_add(*y, acc))
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().fold(0.0_f32, |acc, x| x.mul_add(*x, acc)).sqrt()
}
