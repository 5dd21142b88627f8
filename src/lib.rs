#![cfg_attr(docsrs, feature(doc_cfg))]
//! # heat-halo
//!
//! heat-halo solves the 1-D heat equation `u_t = u_xx` with the explicit
//! forward-Euler / central-difference scheme, either on one process or with the
//! domain split into contiguous chunks across a group of workers that exchange
//! one halo value per side every step.
//!
//! ## Features
//! - Serial reference solver ([`serial::solve_serial`])
//! - Even contiguous decomposition with exact scatter/gather ([`algs::partition`])
//! - Halo exchange over a pluggable [`Communicator`](algs::communicator::Communicator):
//!   `NoComm` (one worker), `LocalComm` (threads of one process) and `MpiComm`
//!   (feature `mpi-support`)
//! - Dirichlet or periodic boundaries
//! - Distributed results that agree with the serial solver **bit for bit**
//!
//! ## Determinism
//!
//! Every point of the grid is updated by the same floating-point expression in
//! both solvers, halo values travel as raw IEEE-754 bits, and each halo record
//! carries the step it belongs to, so a decomposed solve either reproduces the
//! serial result exactly or fails with an error.
//!
//! ## Usage
//!
//! ```
//! use heat_halo::prelude::*;
//!
//! let n = 96;
//! let u0 = step_function(n, n / 4);
//! let params = ProblemParams::reference(n, 100);
//! let config = SolverConfig::default();
//!
//! let serial = solve_serial(&u0, &params, &config).unwrap();
//! let parallel = run_local(4, &u0, &params, &config).unwrap();
//! assert_eq!(serial, parallel);
//! ```
//!
//! With MPI, every rank builds a [`WorkerContext`](worker::WorkerContext) over
//! `MpiComm` and calls [`driver::solve_distributed`]; rank 0 supplies the
//! initial condition and receives the full solution.

pub mod algs;
pub mod driver;
pub mod heat_error;
pub mod parallel;
pub mod params;
pub mod serial;
pub mod stencil;
pub mod worker;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm, Wait};
    pub use crate::algs::distribute::{gather, scatter};
    pub use crate::algs::halo::exchange_halo;
    pub use crate::algs::partition::{ChunkLayout, gather_chunks, scatter_chunks};
    pub use crate::driver::{l2_distance, max_value, run_local, solve_distributed, step_function};
    pub use crate::heat_error::HeatError;
    pub use crate::parallel::{ChunkSolver, WorkerPhase, solve_chunk};
    pub use crate::params::{BoundaryCondition, ProblemParams, SolverConfig, StabilityPolicy};
    pub use crate::serial::{solve_serial, solve_serial_in_place};
    pub use crate::stencil::{DomainEdges, Halo, step_chunk, step_serial};
    pub use crate::worker::WorkerContext;
}
