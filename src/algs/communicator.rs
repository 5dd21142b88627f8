//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//!
//! # Delivery contract
//!
//! Every backend must honour the following, and the distributed solver relies
//! on it for correctness:
//!
//! * messages from one source to one destination with the same tag are
//!   delivered **in send order** and never overtake each other;
//! * [`Wait::wait`] on a receive handle **blocks** until the matching message
//!   has arrived, and returns `None` only if the backend gave up (timeout,
//!   missing peer). A backend that returned early with stale data would let a
//!   worker read a neighbour's value from the wrong time step without any
//!   error, so asynchronous "maybe ready" receives are not allowed here.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};

/// Typed message tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(base: u16) -> Self {
        Self(base)
    }
    pub const fn base(self) -> u16 {
        self.0
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    /// Tag `n` slots after this one (wrapping).
    pub const fn offset(self, n: u16) -> Self {
        Self(self.0.wrapping_add(n))
    }
}

/// Tags used by the two shift phases of a halo exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HaloTags {
    /// Values travelling towards lower ranks.
    pub leftward: CommTag,
    /// Values travelling towards higher ranks.
    pub rightward: CommTag,
}

impl HaloTags {
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            leftward: base,
            rightward: base.offset(1),
        }
    }
}

/// Tags used by scatter/gather.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectiveTags {
    pub scatter_hdr: CommTag,
    pub scatter_data: CommTag,
    pub gather_hdr: CommTag,
    pub gather_data: CommTag,
}

impl CollectiveTags {
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            scatter_hdr: base,
            scatter_data: base.offset(1),
            gather_hdr: base.offset(2),
            gather_data: base.offset(3),
        }
    }
}

/// Communication interface (minimal by design). See the module docs for the
/// delivery contract.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Post a send of `buf` to `peer`. The bytes are copied or transmitted
    /// before this returns, so `buf` may be reused immediately.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of at most `buf.len()` bytes from `peer`. The data is
    /// handed back by [`Wait::wait`]; `buf` only fixes the expected length.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// This worker's rank in `0..size()`.
    fn rank(&self) -> usize;
    /// Number of workers in the group.
    fn size(&self) -> usize;

    fn is_no_comm(&self) -> bool {
        false
    }

    /// Block until every worker in the group reached the barrier.
    fn barrier(&self);

    /// Send `send` to `send_to` while receiving `recv_len` bytes from
    /// `recv_from` (either side may be absent). Returns the received bytes, or
    /// `None` if nothing was requested or the receive failed.
    ///
    /// When every worker calls `shift` with the same direction the pattern
    /// cannot deadlock, which is why backends with blocking transfers override
    /// it with a combined send/receive.
    fn shift(
        &self,
        send_to: Option<usize>,
        recv_from: Option<usize>,
        tag: u16,
        send: &[u8],
        recv_len: usize,
    ) -> Option<Vec<u8>> {
        let mut scratch = vec![0u8; recv_len];
        let recv = recv_from.map(|from| self.irecv(from, tag, &mut scratch));
        let sent = send_to.map(|to| self.isend(to, tag, send));
        let got = recv.and_then(Wait::wait);
        if let Some(s) = sent {
            let _ = s.wait();
        }
        got
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op comm for a single worker.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn is_no_comm(&self) -> bool {
        true
    }
    // a group of one is always complete
    fn barrier(&self) {}
}

// --- LocalComm: intra-process / one thread per worker ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Mailbox {
    queues: Mutex<HashMap<Key, VecDeque<Bytes>>>,
    arrived: Condvar,
    gate: Mutex<Gate>,
    released: Condvar,
}

/// Reusable barrier state: arrivals in the current generation.
#[derive(Default)]
struct Gate {
    waiting: usize,
    generation: u64,
}

impl Mailbox {
    fn post(&self, key: Key, data: Bytes) {
        self.queues.lock().entry(key).or_default().push_back(data);
        self.arrived.notify_all();
    }

    fn take(&self, key: Key, deadline: Instant) -> Option<Bytes> {
        let mut queues = self.queues.lock();
        loop {
            if let Some(data) = pop_message(&mut queues, key) {
                return Some(data);
            }
            if self.arrived.wait_until(&mut queues, deadline).timed_out() {
                return pop_message(&mut queues, key);
            }
        }
    }

    /// Wait until `size` callers arrived. Returns `false` if `deadline`
    /// passed first; the caller's arrival is withdrawn in that case.
    fn barrier(&self, size: usize, deadline: Instant) -> bool {
        let mut gate = self.gate.lock();
        let generation = gate.generation;
        gate.waiting += 1;
        if gate.waiting >= size {
            gate.waiting = 0;
            gate.generation = gate.generation.wrapping_add(1);
            self.released.notify_all();
            return true;
        }
        while gate.generation == generation {
            if self.released.wait_until(&mut gate, deadline).timed_out()
                && gate.generation == generation
            {
                gate.waiting -= 1;
                return false;
            }
        }
        true
    }

    #[cfg(test)]
    fn pending_keys(&self) -> usize {
        self.queues.lock().len()
    }
}

/// Pop the oldest message for `key`, dropping the queue once it is empty.
fn pop_message(queues: &mut HashMap<Key, VecDeque<Bytes>>, key: Key) -> Option<Bytes> {
    let queue = queues.get_mut(&key)?;
    let data = queue.pop_front();
    if queue.is_empty() {
        queues.remove(&key);
    }
    data
}

static GLOBAL_MAILBOX: Lazy<Arc<Mailbox>> = Lazy::new(|| Arc::new(Mailbox::default()));

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Receive handle of [`LocalComm`]; the message is collected in `wait`.
pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    len: usize,
    timeout: Duration,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let deadline = Instant::now() + self.timeout;
        match self.mailbox.take(self.key, deadline) {
            Some(bytes) => Some(bytes[..bytes.len().min(self.len)].to_vec()),
            None => {
                log::warn!(
                    "LocalComm: rank {} gave up waiting for rank {} (tag {:#06x}) after {:?}",
                    self.key.1,
                    self.key.0,
                    self.key.2,
                    self.timeout
                );
                None
            }
        }
    }
}

/// In-memory communicator for workers running as threads of one process.
///
/// `LocalComm::new` joins a process-wide mailbox (tests sharing it should use
/// distinct tags and must not run barriers concurrently);
/// [`LocalComm::world`] creates an isolated group with its own barrier.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
    timeout: Duration,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LocalComm {
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            mailbox: GLOBAL_MAILBOX.clone(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// One communicator per rank, sharing a private mailbox.
    pub fn world(size: usize) -> Vec<Self> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                mailbox: mailbox.clone(),
                timeout: DEFAULT_TIMEOUT,
            })
            .collect()
    }

    /// How long `wait` blocks before reporting a missing message.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        self.mailbox
            .post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: self.mailbox.clone(),
            key: (peer, self.rank, tag),
            len: buf.len(),
            timeout: self.timeout,
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    /// Waits at most the receive timeout; a missing worker is logged and the
    /// caller is released.
    fn barrier(&self) {
        if !self.mailbox.barrier(self.size, Instant::now() + self.timeout) {
            log::warn!(
                "LocalComm: rank {} left the barrier after {:?} without the full group of {}",
                self.rank,
                self.timeout,
                self.size
            );
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use crate::heat_error::HeatError;
    use mpi::environment::Universe;
    use mpi::Threading;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// Communicator over `MPI_COMM_WORLD`.
    ///
    /// Transfers are blocking and complete inside `isend`/`irecv`; the
    /// returned handles are already finished. Halo exchanges go through the
    /// [`Communicator::shift`] override, which maps onto `MPI_Sendrecv`.
    ///
    /// # Threads
    ///
    /// `MpiComm` is `Send + Sync` to satisfy [`Communicator`]. MPI is
    /// initialised requesting `Threading::Multiple`; when the library grants
    /// a lower level (see [`MpiComm::threading`]), only one thread at a time
    /// may call into the communicator, which is how the solver drives it.
    pub struct MpiComm {
        pub world: SimpleCommunicator,
        rank: usize,
        size: usize,
        threading: Threading,
        _universe: Universe,
    }

    // SAFETY: with `Threading::Multiple` MPI accepts calls from any thread;
    // below that level callers must serialize access, as documented above.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        pub fn new() -> Result<Self, HeatError> {
            let (universe, threading) =
                mpi::initialize_with_threading(Threading::Multiple).ok_or(HeatError::MpiInit)?;
            if threading != Threading::Multiple {
                log::debug!("MpiComm: MPI granted {threading:?}; use from one thread at a time");
            }
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                rank,
                size,
                threading,
                _universe: universe,
            })
        }

        /// Thread support level granted by the MPI library.
        pub fn threading(&self) -> Threading {
            self.threading
        }
    }

    /// Result of a completed blocking transfer.
    pub struct MpiHandle(Option<Vec<u8>>);

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, tag as i32);
            MpiHandle(None)
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let (mut data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(tag as i32);
            data.truncate(buf.len());
            MpiHandle(Some(data))
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self) {
            self.world.barrier();
        }

        fn shift(
            &self,
            send_to: Option<usize>,
            recv_from: Option<usize>,
            tag: u16,
            send: &[u8],
            recv_len: usize,
        ) -> Option<Vec<u8>> {
            match (send_to, recv_from) {
                (Some(to), Some(from)) => {
                    let mut out = vec![0u8; recv_len];
                    mpi::point_to_point::send_receive_into_with_tags(
                        send,
                        &self.world.process_at_rank(to as i32),
                        tag as i32,
                        &mut out[..],
                        &self.world.process_at_rank(from as i32),
                        tag as i32,
                    );
                    Some(out)
                }
                (Some(to), None) => {
                    self.isend(to, tag, send);
                    None
                }
                (None, Some(from)) => {
                    let mut out = vec![0u8; recv_len];
                    self.irecv(from, tag, &mut out).wait()
                }
                (None, None) => None,
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
