//! Scatter a full-domain vector from the root and gather chunks back to it.
//!
//! Both operations are collectives: every worker of the group must call them
//! with the same tags. Each chunk travels as a [`WireChunkHdr`] followed by its
//! payload. When the root cannot decompose the input it sends an abort header
//! to every other worker so the whole group fails with the same shape error
//! instead of blocking.

use crate::algs::communicator::{CollectiveTags, Communicator, Wait};
use crate::algs::partition::{ChunkLayout, gather_chunks};
use crate::algs::wire::{WireChunkHdr, decode_f64s, encode_f64s};
use crate::heat_error::HeatError;
use crate::worker::{ROOT_RANK, WorkerContext};
use std::mem::size_of;

/// Distribute `full` (supplied on the root only) in equal contiguous chunks;
/// returns this worker's chunk.
pub fn scatter<C: Communicator>(
    ctx: &WorkerContext<C>,
    full: Option<&[f64]>,
    tags: CollectiveTags,
) -> Result<Vec<f64>, HeatError> {
    if ctx.is_root() {
        scatter_from_root(ctx, full, tags)
    } else {
        receive_chunk(ctx, tags)
    }
}

fn scatter_from_root<C: Communicator>(
    ctx: &WorkerContext<C>,
    full: Option<&[f64]>,
    tags: CollectiveTags,
) -> Result<Vec<f64>, HeatError> {
    let comm = ctx.comm();
    let full = full.unwrap_or(&[]);
    let layout = match ChunkLayout::new(full.len(), ctx.size()) {
        Ok(layout) => layout,
        Err(err) => {
            log::warn!("scatter: aborting, {err}");
            let hdr = WireChunkHdr::abort(full.len());
            let pending: Vec<_> = (0..ctx.size())
                .filter(|&r| r != ROOT_RANK)
                .map(|r| comm.isend(r, tags.scatter_hdr.as_u16(), hdr.as_bytes()))
                .collect();
            for send in pending {
                let _ = send.wait();
            }
            return Err(err);
        }
    };
    log::debug!(
        "scatter: {} points to {} workers ({} each)",
        layout.global_len(),
        layout.workers(),
        layout.chunk_len()
    );

    let mut pending = Vec::with_capacity(2 * ctx.size());
    for r in (0..ctx.size()).filter(|&r| r != ROOT_RANK) {
        let hdr = WireChunkHdr::chunk(layout.chunk_len());
        pending.push(comm.isend(r, tags.scatter_hdr.as_u16(), hdr.as_bytes()));
        let payload = encode_f64s(&full[layout.range(r)]);
        pending.push(comm.isend(r, tags.scatter_data.as_u16(), &payload));
    }
    for send in pending {
        let _ = send.wait();
    }
    Ok(full[layout.range(ROOT_RANK)].to_vec())
}

fn receive_chunk<C: Communicator>(
    ctx: &WorkerContext<C>,
    tags: CollectiveTags,
) -> Result<Vec<f64>, HeatError> {
    let comm = ctx.comm();
    let mut hdr_buf = [0u8; size_of::<WireChunkHdr>()];
    let raw = comm
        .irecv(ROOT_RANK, tags.scatter_hdr.as_u16(), &mut hdr_buf)
        .wait()
        .ok_or_else(|| HeatError::comm(ROOT_RANK, "no scatter header from root"))?;
    let hdr = WireChunkHdr::decode(&raw).map_err(|e| HeatError::comm(ROOT_RANK, e))?;
    if hdr.is_abort() {
        // the abort header carries the global length so every rank reports
        // the same shape error as the root
        return Err(ChunkLayout::new(hdr.chunk_len(), ctx.size())
            .err()
            .unwrap_or_else(|| HeatError::comm(ROOT_RANK, "root aborted the scatter")));
    }
    let len = hdr.chunk_len();
    let mut data_buf = vec![0u8; payload_bytes(len, ROOT_RANK)?];
    let raw = comm
        .irecv(ROOT_RANK, tags.scatter_data.as_u16(), &mut data_buf)
        .wait()
        .ok_or_else(|| HeatError::comm(ROOT_RANK, "no scatter payload from root"))?;
    decode_f64s(&raw, len).map_err(|e| HeatError::comm(ROOT_RANK, e))
}

/// Byte size of a payload of `len` values announced by `from`.
fn payload_bytes(len: usize, from: usize) -> Result<usize, HeatError> {
    len.checked_mul(size_of::<f64>())
        .ok_or_else(|| HeatError::comm(from, format!("header announces {len} values")))
}

/// Collect every worker's chunk on the root, in rank order.
///
/// Returns `Some(full)` on the root and `None` elsewhere.
pub fn gather<C: Communicator>(
    ctx: &WorkerContext<C>,
    chunk: &[f64],
    tags: CollectiveTags,
) -> Result<Option<Vec<f64>>, HeatError> {
    let comm = ctx.comm();
    if !ctx.is_root() {
        let hdr = WireChunkHdr::chunk(chunk.len());
        let h = comm.isend(ROOT_RANK, tags.gather_hdr.as_u16(), hdr.as_bytes());
        let payload = encode_f64s(chunk);
        let d = comm.isend(ROOT_RANK, tags.gather_data.as_u16(), &payload);
        let _ = h.wait();
        let _ = d.wait();
        return Ok(None);
    }

    let mut chunks: Vec<Vec<f64>> = Vec::with_capacity(ctx.size());
    chunks.push(chunk.to_vec());
    let mut maybe_err = None;

    // every sender is drained even after the first failure
    for r in (0..ctx.size()).filter(|&r| r != ROOT_RANK) {
        let mut hdr_buf = [0u8; size_of::<WireChunkHdr>()];
        let hdr = comm
            .irecv(r, tags.gather_hdr.as_u16(), &mut hdr_buf)
            .wait()
            .ok_or_else(|| HeatError::comm(r, "no gather header"))
            .and_then(|raw| WireChunkHdr::decode(&raw).map_err(|e| HeatError::comm(r, e)));
        let hdr = match hdr {
            Ok(hdr) => hdr,
            Err(e) => {
                maybe_err.get_or_insert(e);
                continue;
            }
        };
        let len = hdr.chunk_len();
        let mut data_buf = match payload_bytes(len, r) {
            Ok(bytes) => vec![0u8; bytes],
            Err(e) => {
                maybe_err.get_or_insert(e);
                continue;
            }
        };
        let data = comm
            .irecv(r, tags.gather_data.as_u16(), &mut data_buf)
            .wait()
            .ok_or_else(|| HeatError::comm(r, "no gather payload"))
            .and_then(|raw| decode_f64s(&raw, len).map_err(|e| HeatError::comm(r, e)));
        match data {
            Ok(values) => chunks.push(values),
            Err(e) => {
                maybe_err.get_or_insert(e);
            }
        }
    }
    if let Some(err) = maybe_err {
        return Err(err);
    }

    let full = gather_chunks(&chunks)?;
    log::debug!("gather: assembled {} points from {} workers", full.len(), ctx.size());
    Ok(Some(full))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{CommTag, LocalComm, NoComm};

    fn tags() -> CollectiveTags {
        CollectiveTags::from_base(CommTag::new(0x2000))
    }

    #[test]
    fn single_worker_scatter_gather() {
        let ctx = WorkerContext::new(NoComm).unwrap();
        let full = vec![1.0, 2.0, 3.0];
        let chunk = scatter(&ctx, Some(&full), tags()).unwrap();
        assert_eq!(chunk, full);
        assert_eq!(gather(&ctx, &chunk, tags()).unwrap(), Some(full));
    }

    #[test]
    fn scatter_then_gather_over_three_workers() {
        let full: Vec<f64> = (0..9).map(|i| i as f64 * 0.5).collect();
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = LocalComm::world(3)
                .into_iter()
                .map(|comm| {
                    let full = &full;
                    s.spawn(move || {
                        let ctx = WorkerContext::new(comm)?;
                        let input = ctx.is_root().then_some(full.as_slice());
                        let chunk = scatter(&ctx, input, tags())?;
                        assert_eq!(chunk, full[ctx.rank() * 3..ctx.rank() * 3 + 3]);
                        gather(&ctx, &chunk, tags())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0], Ok(Some(full)));
        assert_eq!(results[1], Ok(None));
        assert_eq!(results[2], Ok(None));
    }

    #[test]
    fn indivisible_input_fails_every_worker_identically() {
        let full = vec![0.0; 10];
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = LocalComm::world(4)
                .into_iter()
                .map(|comm| {
                    let full = &full;
                    s.spawn(move || {
                        let ctx = WorkerContext::new(comm)?;
                        let input = ctx.is_root().then_some(full.as_slice());
                        scatter(&ctx, input, tags())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for r in results {
            assert_eq!(r, Err(HeatError::IndivisibleDomain { len: 10, workers: 4 }));
        }
    }

    #[test]
    fn oversized_header_is_a_communication_failure() {
        let world = LocalComm::world(2);
        let hdr = WireChunkHdr::chunk(usize::MAX / 2);
        world[0].isend(1, tags().scatter_hdr.as_u16(), hdr.as_bytes());
        let ctx1 = WorkerContext::new(world[1].clone()).unwrap();
        let err = scatter(&ctx1, None, tags()).unwrap_err();
        assert!(err.is_communication_failure(), "unexpected {err:?}");

        world[1].isend(0, tags().gather_hdr.as_u16(), hdr.as_bytes());
        let ctx0 = WorkerContext::new(world[0].clone()).unwrap();
        let err = gather(&ctx0, &[1.0], tags()).unwrap_err();
        assert_eq!(
            err,
            HeatError::CommunicationFailure {
                neighbor: 1,
                reason: format!("header announces {} values", usize::MAX / 2),
            }
        );
    }

    #[test]
    fn gather_detects_mismatched_chunk() {
        let mut world = LocalComm::world(2);
        let c1 = world.pop().unwrap();
        let c0 = world.pop().unwrap();
        let ctx1 = WorkerContext::new(c1).unwrap();
        assert_eq!(gather(&ctx1, &[1.0], tags()), Ok(None));
        let ctx0 = WorkerContext::new(c0).unwrap();
        let err = gather(&ctx0, &[1.0, 2.0], tags()).unwrap_err();
        assert_eq!(
            err,
            HeatError::ChunkLength {
                rank: 1,
                expected: 2,
                found: 1
            }
        );
    }
}
