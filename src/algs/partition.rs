//! Contiguous block decomposition of a 1-D state vector.
//!
//! Chunk `k` of a domain of `N` points split across `P` workers covers global
//! indices `k*N/P .. (k+1)*N/P`. Uneven splits are rejected rather than padded.

use std::ops::Range;

use crate::heat_error::HeatError;

/// Shape of an even contiguous decomposition. Only [`ChunkLayout::new`]
/// builds one, so `chunk_len` is always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLayout {
    global_len: usize,
    workers: usize,
    chunk_len: usize,
}

impl ChunkLayout {
    /// Layout for `global_len` points on `workers` workers.
    pub fn new(global_len: usize, workers: usize) -> Result<Self, HeatError> {
        if workers == 0 {
            return Err(HeatError::NoWorkers);
        }
        if global_len == 0 {
            return Err(HeatError::EmptyDomain);
        }
        if global_len % workers != 0 {
            return Err(HeatError::IndivisibleDomain {
                len: global_len,
                workers,
            });
        }
        Ok(Self {
            global_len,
            workers,
            chunk_len: global_len / workers,
        })
    }

    pub fn global_len(&self) -> usize {
        self.global_len
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Points per worker.
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// First global index owned by `rank`.
    pub fn offset(&self, rank: usize) -> usize {
        rank * self.chunk_len
    }

    /// Global indices owned by `rank`.
    pub fn range(&self, rank: usize) -> Range<usize> {
        let start = self.offset(rank);
        start..start + self.chunk_len
    }

    /// Rank owning global index `i`.
    pub fn owner(&self, i: usize) -> Option<usize> {
        (i < self.global_len).then(|| i / self.chunk_len)
    }
}

/// Split `full` into `workers` equal contiguous chunks in ascending order.
pub fn scatter_chunks(full: &[f64], workers: usize) -> Result<Vec<Vec<f64>>, HeatError> {
    let layout = ChunkLayout::new(full.len(), workers)?;
    Ok(full
        .chunks_exact(layout.chunk_len())
        .map(<[f64]>::to_vec)
        .collect())
}

/// Concatenate rank-ordered chunks into one state vector.
pub fn gather_chunks<T: AsRef<[f64]>>(chunks: &[T]) -> Result<Vec<f64>, HeatError> {
    let first = chunks.first().ok_or(HeatError::NoWorkers)?.as_ref().len();
    if first == 0 {
        return Err(HeatError::EmptyDomain);
    }
    let mut full = Vec::with_capacity(first * chunks.len());
    for (rank, chunk) in chunks.iter().enumerate() {
        let chunk = chunk.as_ref();
        if chunk.len() != first {
            return Err(HeatError::ChunkLength {
                rank,
                expected: first,
                found: chunk.len(),
            });
        }
        full.extend_from_slice(chunk);
    }
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_ranges_tile_the_domain() {
        let layout = ChunkLayout::new(12, 4).unwrap();
        assert_eq!(layout.chunk_len(), 3);
        assert_eq!(layout.range(0), 0..3);
        assert_eq!(layout.range(3), 9..12);
        assert_eq!(layout.owner(8), Some(2));
        assert_eq!(layout.owner(12), None);
    }

    #[test]
    fn layout_shape_is_only_reachable_through_validation() {
        let layout = ChunkLayout::new(4, 4).unwrap();
        assert_eq!(
            (layout.global_len(), layout.workers(), layout.chunk_len()),
            (4, 4, 1)
        );
        assert_eq!(layout.owner(1), Some(1));
        assert_eq!(layout.owner(4), None);
        // the zero-width layout a caller might try to describe is refused
        assert_eq!(ChunkLayout::new(0, 4), Err(HeatError::EmptyDomain));
    }

    #[test]
    fn scatter_preserves_order() {
        let full: Vec<f64> = (0..6).map(f64::from).collect();
        let chunks = scatter_chunks(&full, 3).unwrap();
        assert_eq!(chunks, vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]]);
        assert_eq!(gather_chunks(&chunks).unwrap(), full);
    }

    #[test]
    fn uneven_split_is_a_shape_error() {
        let err = scatter_chunks(&[0.0; 10], 3).unwrap_err();
        assert_eq!(err, HeatError::IndivisibleDomain { len: 10, workers: 3 });
        assert!(err.is_shape_error());
        assert_eq!(scatter_chunks(&[0.0; 4], 0).unwrap_err(), HeatError::NoWorkers);
        assert_eq!(scatter_chunks(&[], 2).unwrap_err(), HeatError::EmptyDomain);
    }

    #[test]
    fn gather_rejects_ragged_chunks() {
        let err = gather_chunks(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(
            err,
            HeatError::ChunkLength {
                rank: 1,
                expected: 2,
                found: 1
            }
        );
        let none: [Vec<f64>; 0] = [];
        assert_eq!(gather_chunks(&none).unwrap_err(), HeatError::NoWorkers);
    }
}
