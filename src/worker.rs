//! Per-worker identity passed explicitly into every distributed operation.

use crate::algs::communicator::Communicator;
use crate::heat_error::HeatError;
use crate::params::BoundaryCondition;
use crate::stencil::DomainEdges;

/// Rank that builds and assembles full-domain vectors.
pub const ROOT_RANK: usize = 0;

/// A worker's rank, group size and communication handle.
#[derive(Debug)]
pub struct WorkerContext<C: Communicator> {
    comm: C,
    rank: usize,
    size: usize,
}

impl<C: Communicator> WorkerContext<C> {
    /// Wrap `comm`, checking that it describes a valid rank.
    pub fn new(comm: C) -> Result<Self, HeatError> {
        let (rank, size) = (comm.rank(), comm.size());
        if size == 0 {
            return Err(HeatError::NoWorkers);
        }
        if rank >= size {
            return Err(HeatError::InvalidRank { rank, size });
        }
        Ok(Self { comm, rank, size })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn is_root(&self) -> bool {
        self.rank == ROOT_RANK
    }

    /// Global domain edges owned by this worker's chunk.
    pub fn edges(&self) -> DomainEdges {
        DomainEdges::of_rank(self.rank, self.size)
    }

    /// Rank holding the chunk to the left, if any.
    pub fn left_neighbor(&self, boundary: BoundaryCondition) -> Option<usize> {
        if self.rank > 0 {
            Some(self.rank - 1)
        } else if boundary.is_periodic() {
            Some(self.size - 1)
        } else {
            None
        }
    }

    /// Rank holding the chunk to the right, if any.
    pub fn right_neighbor(&self, boundary: BoundaryCondition) -> Option<usize> {
        if self.rank + 1 < self.size {
            Some(self.rank + 1)
        } else if boundary.is_periodic() {
            Some(0)
        } else {
            None
        }
    }
}
