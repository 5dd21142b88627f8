//! Re-export public algorithms.

pub mod communicator;
pub mod distribute;
pub mod halo;
pub mod partition;
pub mod wire;

pub use distribute::{gather, scatter};
pub use halo::exchange_halo;
pub use partition::{ChunkLayout, gather_chunks, scatter_chunks};
