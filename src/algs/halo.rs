//! Halo exchange between neighbouring chunks.
//!
//! Each step runs two shift phases over the whole group:
//!
//! 1. *leftward*: send the chunk's first value to the left neighbour, receive
//!    the right halo from the right neighbour;
//! 2. *rightward*: send the chunk's last value to the right neighbour, receive
//!    the left halo from the left neighbour.
//!
//! Every record carries the step index and the sender's chunk length. Both
//! phases always run to completion before anything is validated, so a worker
//! that detects a bad record has still delivered its own values and its
//! neighbours fail on the same step instead of blocking.

use std::mem::size_of;

use crate::algs::communicator::{CommTag, Communicator, HaloTags};
use crate::algs::wire::WireHalo;
use crate::heat_error::HeatError;
use crate::params::BoundaryCondition;
use crate::stencil::Halo;
use crate::worker::WorkerContext;

/// Exchange edge values with the neighbouring workers for step `step`.
///
/// `chunk` must hold this worker's state as it stood at the end of step
/// `step - 1`. Sides without a neighbour (Dirichlet domain edges) get the
/// boundary value; a periodic single worker is its own neighbour.
pub fn exchange_halo<C: Communicator>(
    ctx: &WorkerContext<C>,
    chunk: &[f64],
    step: u64,
    boundary: BoundaryCondition,
    tags: HaloTags,
) -> Result<Halo, HeatError> {
    let (first, last) = match (chunk.first(), chunk.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(HeatError::EmptyDomain),
    };
    let left = ctx.left_neighbor(boundary);
    let right = ctx.right_neighbor(boundary);

    let from_right = shift_edge(ctx, left, right, tags.leftward, step, chunk.len(), first);
    let from_left = shift_edge(ctx, right, left, tags.rightward, step, chunk.len(), last);

    let fixed = boundary.fixed_value().unwrap_or_default();
    let halo = Halo::new(
        decode_halo(from_left, step, chunk.len())?.unwrap_or(fixed),
        decode_halo(from_right, step, chunk.len())?.unwrap_or(fixed),
    );
    log::trace!(
        "rank {} step {}: halo left={} right={}",
        ctx.rank(),
        step,
        halo.left,
        halo.right
    );
    Ok(halo)
}

/// Raw outcome of one shift phase.
enum Received {
    /// No neighbour on the receiving side.
    Nothing,
    /// The worker is its own neighbour; no transfer took place.
    Own(f64),
    Bytes { from: usize, raw: Option<Vec<u8>> },
}

fn shift_edge<C: Communicator>(
    ctx: &WorkerContext<C>,
    send_to: Option<usize>,
    recv_from: Option<usize>,
    tag: CommTag,
    step: u64,
    chunk_len: usize,
    value: f64,
) -> Received {
    if recv_from == Some(ctx.rank()) {
        return Received::Own(value);
    }
    let record = WireHalo::new(step, chunk_len, value);
    let raw = ctx.comm().shift(
        send_to,
        recv_from,
        tag.as_u16(),
        record.as_bytes(),
        size_of::<WireHalo>(),
    );
    match recv_from {
        Some(from) => Received::Bytes { from, raw },
        None => Received::Nothing,
    }
}

fn decode_halo(received: Received, step: u64, chunk_len: usize) -> Result<Option<f64>, HeatError> {
    let (from, raw) = match received {
        Received::Nothing => return Ok(None),
        Received::Own(v) => return Ok(Some(v)),
        Received::Bytes { from, raw } => (from, raw),
    };
    let raw = raw.ok_or_else(|| HeatError::comm(from, format!("no halo value for step {step}")))?;
    let record = WireHalo::decode(&raw).map_err(|e| HeatError::comm(from, e))?;
    if record.step() != step {
        return Err(HeatError::StaleHalo {
            neighbor: from,
            expected: step,
            found: record.step(),
        });
    }
    if record.chunk_len() != chunk_len {
        return Err(HeatError::ChunkLength {
            rank: from,
            expected: chunk_len,
            found: record.chunk_len(),
        });
    }
    Ok(Some(record.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};
    use std::time::Duration;

    fn tags() -> HaloTags {
        HaloTags::from_base(CommTag::new(0x3000))
    }

    /// Run one exchange per worker, with per-rank chunk and step.
    fn exchange_all(
        chunks: &[Vec<f64>],
        steps: &[u64],
        boundary: BoundaryCondition,
    ) -> Vec<Result<Halo, HeatError>> {
        std::thread::scope(|s| {
            let handles: Vec<_> = LocalComm::world(chunks.len())
                .into_iter()
                .map(|comm| {
                    let comm = comm.with_timeout(Duration::from_secs(5));
                    s.spawn(move || {
                        let ctx = WorkerContext::new(comm)?;
                        let r = ctx.rank();
                        exchange_halo(&ctx, &chunks[r], steps[r], boundary, tags())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn dirichlet_halos_come_from_neighbours_and_boundary() {
        let chunks = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let halos = exchange_all(&chunks, &[0, 0, 0], BoundaryCondition::Dirichlet(-1.0));
        assert_eq!(halos[0], Ok(Halo::new(-1.0, 3.0)));
        assert_eq!(halos[1], Ok(Halo::new(2.0, 5.0)));
        assert_eq!(halos[2], Ok(Halo::new(4.0, -1.0)));
    }

    #[test]
    fn periodic_halos_wrap_around() {
        let chunks = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let halos = exchange_all(&chunks, &[7, 7], BoundaryCondition::Periodic);
        assert_eq!(halos[0], Ok(Halo::new(4.0, 3.0)));
        assert_eq!(halos[1], Ok(Halo::new(2.0, 1.0)));
    }

    #[test]
    fn periodic_single_worker_is_its_own_neighbour() {
        let ctx = WorkerContext::new(NoComm).unwrap();
        let halo = exchange_halo(&ctx, &[1.0, 2.0, 3.0], 0, BoundaryCondition::Periodic, tags());
        assert_eq!(halo, Ok(Halo::new(3.0, 1.0)));
        let halo = exchange_halo(&ctx, &[1.0, 2.0, 3.0], 0, BoundaryCondition::default(), tags());
        assert_eq!(halo, Ok(Halo::new(0.0, 0.0)));
    }

    #[test]
    fn out_of_step_records_are_rejected() {
        let chunks = vec![vec![1.0], vec![2.0]];
        let halos = exchange_all(&chunks, &[0, 1], BoundaryCondition::default());
        assert_eq!(
            halos[0],
            Err(HeatError::StaleHalo {
                neighbor: 1,
                expected: 0,
                found: 1
            })
        );
        assert_eq!(
            halos[1],
            Err(HeatError::StaleHalo {
                neighbor: 0,
                expected: 1,
                found: 0
            })
        );
    }

    #[test]
    fn chunk_length_mismatch_fails_both_sides() {
        let chunks = vec![vec![1.0, 2.0], vec![3.0, 4.0, 5.0]];
        let halos = exchange_all(&chunks, &[0, 0], BoundaryCondition::default());
        assert!(halos.iter().all(|h| h.as_ref().is_err_and(HeatError::is_shape_error)));
    }

    #[test]
    fn missing_neighbour_is_a_communication_failure() {
        let comm = LocalComm::world(2)
            .remove(0)
            .with_timeout(Duration::from_millis(50));
        let ctx = WorkerContext::new(comm).unwrap();
        let err = exchange_halo(&ctx, &[1.0], 0, BoundaryCondition::default(), tags()).unwrap_err();
        assert!(err.is_communication_failure());
    }

    #[test]
    fn empty_chunk_is_rejected() {
        let ctx = WorkerContext::new(NoComm).unwrap();
        let err = exchange_halo(&ctx, &[], 0, BoundaryCondition::default(), tags()).unwrap_err();
        assert_eq!(err, HeatError::EmptyDomain);
    }
}
