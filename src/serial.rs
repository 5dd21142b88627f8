//! Single-process reference solver.

use crate::heat_error::HeatError;
use crate::params::{ProblemParams, SolverConfig};
use crate::stencil::step_serial;

/// Advance `u0` by `params.nt` steps and return the final state.
///
/// `nt == 0` returns an exact copy of the input.
pub fn solve_serial(
    u0: &[f64],
    params: &ProblemParams,
    config: &SolverConfig,
) -> Result<Vec<f64>, HeatError> {
    let mut u = u0.to_vec();
    solve_serial_in_place(&mut u, params, config)?;
    Ok(u)
}

/// Like [`solve_serial`], overwriting `u` with the final state.
///
/// On error `u` is left untouched.
pub fn solve_serial_in_place(
    u: &mut [f64],
    params: &ProblemParams,
    config: &SolverConfig,
) -> Result<(), HeatError> {
    if u.is_empty() {
        return Err(HeatError::EmptyDomain);
    }
    params.check(config.stability)?;
    log::debug!(
        "serial solve: n={} nt={} nu={} boundary={:?}",
        u.len(),
        params.nt,
        params.nu(),
        config.boundary
    );
    if params.nt == 0 {
        return Ok(());
    }

    // ping-pong between two scratch buffers, then copy the result back once
    let mut cur = u.to_vec();
    let mut next = vec![0.0; u.len()];
    for _ in 0..params.nt {
        step_serial(&cur, params, config.boundary, &mut next)?;
        std::mem::swap(&mut cur, &mut next);
    }
    u.copy_from_slice(&cur);
    Ok(())
}
