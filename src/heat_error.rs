//! HeatError: unified error type for heat-halo public APIs
//!
//! Every fallible operation in the crate returns this type. Errors are terminal
//! for a solve: workers run in lockstep, so nothing is retried or recovered
//! locally.

use thiserror::Error;

/// Unified error type for serial and distributed heat solves.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HeatError {
    /// A state vector must hold at least one point.
    #[error("Shape error: state vector is empty")]
    EmptyDomain,
    /// A decomposition needs at least one worker.
    #[error("Shape error: worker count must be positive")]
    NoWorkers,
    /// `len` points cannot be split into equal chunks across `workers`.
    #[error("Shape error: domain of {len} points is not divisible by {workers} workers")]
    IndivisibleDomain { len: usize, workers: usize },
    /// A chunk (or a buffer paired with it) has the wrong length.
    #[error("Shape error: chunk from rank {rank} has length {found}, expected {expected}")]
    ChunkLength {
        rank: usize,
        expected: usize,
        found: usize,
    },
    /// `dt` exceeds the forward-Euler stability limit `0.5 * dx^2`.
    #[error("Stability violation: dt = {dt:e} exceeds 0.5*dx^2 = {limit:e} (dx = {dx:e})")]
    StabilityViolation { dt: f64, dx: f64, limit: f64 },
    /// A transfer with `neighbor` did not complete.
    #[error("Communication failure with rank {neighbor}: {reason}")]
    CommunicationFailure { neighbor: usize, reason: String },
    /// A halo record arrived for a different time step than the one being computed.
    #[error("Communication failure with rank {neighbor}: halo for step {found} arrived while exchanging step {expected}")]
    StaleHalo {
        neighbor: usize,
        expected: u64,
        found: u64,
    },
    /// Problem parameters are not usable (non-positive or non-finite).
    #[error("Invalid problem parameters: {0}")]
    InvalidParams(String),
    /// A worker context claims a rank outside its group.
    #[error("Invalid worker context: rank {rank} in a group of {size}")]
    InvalidRank { rank: usize, size: usize },
    /// The MPI environment could not be initialised.
    #[error("MPI initialization failed")]
    MpiInit,
}

impl HeatError {
    /// True for the shape-error family (domain/chunk length problems).
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            HeatError::EmptyDomain
                | HeatError::NoWorkers
                | HeatError::IndivisibleDomain { .. }
                | HeatError::ChunkLength { .. }
        )
    }

    /// True when a transfer between workers failed or delivered out-of-order data.
    pub fn is_communication_failure(&self) -> bool {
        matches!(
            self,
            HeatError::CommunicationFailure { .. } | HeatError::StaleHalo { .. }
        )
    }

    pub(crate) fn comm(neighbor: usize, reason: impl Into<String>) -> Self {
        HeatError::CommunicationFailure {
            neighbor,
            reason: reason.into(),
        }
    }
}
