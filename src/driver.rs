//! Full-domain drivers built on the per-worker solver.
//!
//! [`solve_distributed`] is what every rank of a group calls: the root scatters
//! the initial condition, each worker advances its chunk, and the root gathers
//! the result. [`run_local`] runs a whole group as threads of this process over
//! [`LocalComm`], which is how the distributed path is checked against
//! [`solve_serial`](crate::serial::solve_serial).

use crate::algs::communicator::{Communicator, LocalComm};
use crate::algs::distribute::{gather, scatter};
use crate::heat_error::HeatError;
use crate::parallel::solve_chunk;
use crate::params::{ProblemParams, SolverConfig};
use crate::worker::WorkerContext;

/// Scatter `initial` from the root, solve, and gather on the root.
///
/// `initial` is only read on the root. Returns `Some(solution)` on the root
/// and `None` on every other rank.
pub fn solve_distributed<C: Communicator>(
    ctx: &WorkerContext<C>,
    initial: Option<&[f64]>,
    params: &ProblemParams,
    config: &SolverConfig,
) -> Result<Option<Vec<f64>>, HeatError> {
    let tags = config.collective_tags();
    let chunk = scatter(ctx, initial, tags)?;
    let chunk = solve_chunk(ctx, chunk, params, config)?;
    gather(ctx, &chunk, tags)
}

/// Solve on `workers` in-process workers and return the gathered solution.
///
/// Each worker runs on its own scoped thread (workers block in the halo
/// exchange, so they cannot share a bounded pool). If any worker fails, the
/// error of the lowest failing rank is returned.
pub fn run_local(
    workers: usize,
    initial: &[f64],
    params: &ProblemParams,
    config: &SolverConfig,
) -> Result<Vec<f64>, HeatError> {
    if workers == 0 {
        return Err(HeatError::NoWorkers);
    }
    let timeout = config.comm_timeout();
    let results: Vec<Result<Option<Vec<f64>>, HeatError>> = std::thread::scope(|s| {
        let handles: Vec<_> = LocalComm::world(workers)
            .into_iter()
            .map(|comm| {
                let comm = comm.with_timeout(timeout);
                s.spawn(move || {
                    let ctx = WorkerContext::new(comm)?;
                    let input = ctx.is_root().then_some(initial);
                    solve_distributed(&ctx, input, params, config)
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| {
                h.join()
                    .unwrap_or_else(|_| Err(HeatError::comm(rank, "worker thread panicked")))
            })
            .collect()
    });

    let mut root = None;
    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Ok(Some(full)) => root = Some(full),
            Ok(None) => {}
            Err(err) => {
                log::warn!("run_local: rank {rank} failed: {err}");
                return Err(err);
            }
        }
    }
    root.ok_or_else(|| HeatError::comm(0, "root returned no solution"))
}

/// Step initial condition: `1.0` for `i < width`, `0.0` elsewhere.
pub fn step_function(n: usize, width: usize) -> Vec<f64> {
    (0..n).map(|i| if i < width { 1.0 } else { 0.0 }).collect()
}

/// Euclidean distance between two state vectors of equal length.
pub fn l2_distance(a: &[f64], b: &[f64]) -> Result<f64, HeatError> {
    if a.len() != b.len() {
        return Err(HeatError::ChunkLength {
            rank: 0,
            expected: a.len(),
            found: b.len(),
        });
    }
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt())
}

/// Largest value of `u` (`-inf` when empty).
pub fn max_value(u: &[f64]) -> f64 {
    u.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}
