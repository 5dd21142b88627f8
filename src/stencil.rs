//! Forward-Euler / central-difference update for the 1-D heat equation.
//!
//! `u'[i] = u[i] + nu * (u[i-1] - 2 u[i] + u[i+1])`
//!
//! One kernel serves both the full-domain stepper ([`step_serial`]) and the
//! per-chunk stepper ([`step_chunk`]); only the source of the out-of-slice
//! neighbours differs. Because the arithmetic is literally the same expression,
//! a decomposed solve reproduces the serial one bit for bit.

use crate::heat_error::HeatError;
use crate::params::{BoundaryCondition, ProblemParams};

/// Values just outside a chunk, borrowed from the neighbouring chunks (or
/// substituted by the boundary condition at the global domain edges).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Halo {
    pub left: f64,
    pub right: f64,
}

impl Halo {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }
}

/// Which global domain edges a chunk touches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DomainEdges {
    /// Chunk starts at global index 0.
    pub left: bool,
    /// Chunk ends at global index `N-1`.
    pub right: bool,
}

impl DomainEdges {
    /// The whole domain in one slice.
    pub const FULL: DomainEdges = DomainEdges {
        left: true,
        right: true,
    };

    /// Edges of chunk `rank` in a group of `size` contiguous chunks.
    pub fn of_rank(rank: usize, size: usize) -> Self {
        Self {
            left: rank == 0,
            right: rank + 1 == size,
        }
    }
}

#[inline(always)]
fn update(left: f64, centre: f64, right: f64, nu: f64) -> f64 {
    centre + nu * (left - 2.0 * centre + right)
}

/// Apply the stencil to every point of `src`, reading `left`/`right` for the
/// neighbours that lie outside the slice. `src` and `dst` have equal length.
fn diffuse_into(src: &[f64], left: f64, right: f64, nu: f64, dst: &mut [f64]) {
    let n = src.len();
    debug_assert_eq!(n, dst.len());
    match n {
        0 => return,
        1 => {
            dst[0] = update(left, src[0], right, nu);
            return;
        }
        _ => {}
    }
    dst[0] = update(left, src[0], src[1], nu);
    diffuse_interior(src, nu, &mut dst[1..n - 1]);
    dst[n - 1] = update(src[n - 2], src[n - 1], right, nu);
}

#[cfg(not(feature = "rayon"))]
fn diffuse_interior(src: &[f64], nu: f64, interior: &mut [f64]) {
    for (out, w) in interior.iter_mut().zip(src.windows(3)) {
        *out = update(w[0], w[1], w[2], nu);
    }
}

#[cfg(feature = "rayon")]
fn diffuse_interior(src: &[f64], nu: f64, interior: &mut [f64]) {
    use rayon::prelude::*;
    const PAR_THRESHOLD: usize = 1 << 14;
    if interior.len() < PAR_THRESHOLD {
        for (out, w) in interior.iter_mut().zip(src.windows(3)) {
            *out = update(w[0], w[1], w[2], nu);
        }
    } else {
        interior
            .par_iter_mut()
            .zip(src.par_windows(3))
            .for_each(|(out, w)| *out = update(w[0], w[1], w[2], nu));
    }
}

fn check_lengths(src: &[f64], dst: &[f64], rank: usize) -> Result<(), HeatError> {
    if src.is_empty() {
        return Err(HeatError::EmptyDomain);
    }
    if src.len() != dst.len() {
        return Err(HeatError::ChunkLength {
            rank,
            expected: src.len(),
            found: dst.len(),
        });
    }
    Ok(())
}

/// Advance the full-domain state `u` by one step into `out`.
///
/// With [`BoundaryCondition::Dirichlet`] the two end points of `out` are set
/// to the fixed value regardless of `u`; with [`BoundaryCondition::Periodic`]
/// they are updated using the wrap-around neighbours.
pub fn step_serial(
    u: &[f64],
    params: &ProblemParams,
    boundary: BoundaryCondition,
    out: &mut [f64],
) -> Result<(), HeatError> {
    check_lengths(u, out, 0)?;
    let halo = match boundary {
        BoundaryCondition::Periodic => Halo::new(u[u.len() - 1], u[0]),
        BoundaryCondition::Dirichlet(v) => Halo::new(v, v),
    };
    step_chunk(u, halo, DomainEdges::FULL, params, boundary, out)
}

/// Advance one worker's chunk by one step into `out`.
///
/// `halo` supplies the neighbours beyond the chunk edges. A Dirichlet value is
/// pinned only on the sides listed in `edges`; interior chunk edges always get
/// a stencil update. Periodic boundaries have no pinned points.
pub fn step_chunk(
    chunk: &[f64],
    halo: Halo,
    edges: DomainEdges,
    params: &ProblemParams,
    boundary: BoundaryCondition,
    out: &mut [f64],
) -> Result<(), HeatError> {
    check_lengths(chunk, out, 0)?;
    diffuse_into(chunk, halo.left, halo.right, params.nu(), out);
    if let Some(v) = boundary.fixed_value() {
        if edges.left {
            out[0] = v;
        }
        if edges.right {
            let last = out.len() - 1;
            out[last] = v;
        }
    }
    Ok(())
}
