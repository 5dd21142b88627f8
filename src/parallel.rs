//! Per-worker driver of a distributed solve.
//!
//! A worker alternates between exchanging halos and stepping its chunk:
//!
//! ```text
//! Idle -> ExchangingHalo -> Stepping -> ExchangingHalo -> ... -> Done
//! ```
//!
//! with exactly `nt` exchange/step pairs. The exchange for step `t` always
//! sends the chunk as it stood after step `t-1`, and a worker cannot start
//! step `t` before both of its halos for step `t` have arrived.

use crate::algs::communicator::{Communicator, HaloTags};
use crate::algs::halo::exchange_halo;
use crate::heat_error::HeatError;
use crate::params::{ProblemParams, SolverConfig};
use crate::stencil::{Halo, step_chunk};
use crate::worker::WorkerContext;

/// Where a worker is in its solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WorkerPhase {
    Idle,
    /// Waiting for the halos of `step`.
    ExchangingHalo { step: usize },
    /// Halos for `step` received; the update has not run yet.
    Stepping { step: usize, halo: Halo },
    Done,
}

/// State machine advancing one worker's chunk through a solve.
pub struct ChunkSolver<'a, C: Communicator> {
    ctx: &'a WorkerContext<C>,
    params: ProblemParams,
    config: SolverConfig,
    tags: HaloTags,
    cur: Vec<f64>,
    next: Vec<f64>,
    phase: WorkerPhase,
    steps_done: usize,
}

impl<'a, C: Communicator> ChunkSolver<'a, C> {
    /// Prepare a solve of `chunk`. Parameters are checked here, before any
    /// communication, so every worker rejects bad input on its own.
    pub fn new(
        ctx: &'a WorkerContext<C>,
        chunk: Vec<f64>,
        params: ProblemParams,
        config: SolverConfig,
    ) -> Result<Self, HeatError> {
        if chunk.is_empty() {
            return Err(HeatError::EmptyDomain);
        }
        params.check(config.stability)?;
        let next = vec![0.0; chunk.len()];
        let tags = config.halo_tags();
        Ok(Self {
            ctx,
            params,
            config,
            tags,
            cur: chunk,
            next,
            phase: WorkerPhase::Idle,
            steps_done: 0,
        })
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    pub fn steps_done(&self) -> usize {
        self.steps_done
    }

    /// Current chunk state.
    pub fn chunk(&self) -> &[f64] {
        &self.cur
    }

    /// Move to the next phase. Returns the new phase.
    pub fn advance(&mut self) -> Result<WorkerPhase, HeatError> {
        let phase = self.phase;
        self.phase = match phase {
            WorkerPhase::Idle if self.params.nt == 0 => WorkerPhase::Done,
            WorkerPhase::Idle => WorkerPhase::ExchangingHalo { step: 0 },
            WorkerPhase::ExchangingHalo { step } => {
                let halo = exchange_halo(
                    self.ctx,
                    &self.cur,
                    step as u64,
                    self.config.boundary,
                    self.tags,
                )?;
                WorkerPhase::Stepping { step, halo }
            }
            WorkerPhase::Stepping { step, halo } => {
                step_chunk(
                    &self.cur,
                    halo,
                    self.ctx.edges(),
                    &self.params,
                    self.config.boundary,
                    &mut self.next,
                )?;
                std::mem::swap(&mut self.cur, &mut self.next);
                self.steps_done += 1;
                if self.steps_done == self.params.nt {
                    WorkerPhase::Done
                } else {
                    WorkerPhase::ExchangingHalo { step: step + 1 }
                }
            }
            WorkerPhase::Done => WorkerPhase::Done,
        };
        log::trace!("rank {}: {:?}", self.ctx.rank(), self.phase);
        Ok(self.phase)
    }

    /// Drive the state machine to `Done` and return the final chunk.
    pub fn run(mut self) -> Result<Vec<f64>, HeatError> {
        while self.advance()? != WorkerPhase::Done {}
        Ok(self.cur)
    }
}

/// Advance this worker's `chunk` by `params.nt` steps and return it.
///
/// Every worker of the group must call this with the same parameters and
/// configuration.
pub fn solve_chunk<C: Communicator>(
    ctx: &WorkerContext<C>,
    chunk: Vec<f64>,
    params: &ProblemParams,
    config: &SolverConfig,
) -> Result<Vec<f64>, HeatError> {
    log::debug!(
        "rank {}/{}: solving chunk of {} points for {} steps",
        ctx.rank(),
        ctx.size(),
        chunk.len(),
        params.nt
    );
    let out = ChunkSolver::new(ctx, chunk, *params, config.clone())?.run()?;
    log::debug!("rank {}: done", ctx.rank());
    Ok(out)
}
