//! Fixed, versioned, little-endian wire types for halo and collective messages.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

// All multi-byte fields in these structs are little-endian on the wire.
// We store them pre-LE with `.to_le()` and decode with `.from_le()`; `f64`
// travels as its IEEE-754 bit pattern so values arrive bit-exact.

// ===== Halo exchange =======================================================

/// One halo value plus the metadata the receiver checks before using it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHalo {
    /// Time step whose start-of-step state the value belongs to.
    pub step_le: u64,
    /// Sender's chunk length.
    pub chunk_len_le: u64,
    pub value_bits_le: u64,
}
const_assert_eq!(size_of::<WireHalo>(), 24);

impl WireHalo {
    pub fn new(step: u64, chunk_len: usize, value: f64) -> Self {
        Self {
            step_le: step.to_le(),
            chunk_len_le: (chunk_len as u64).to_le(),
            value_bits_le: value.to_bits().to_le(),
        }
    }
    pub fn step(&self) -> u64 {
        u64::from_le(self.step_le)
    }
    pub fn chunk_len(&self) -> usize {
        u64::from_le(self.chunk_len_le) as usize
    }
    pub fn value(&self) -> f64 {
        f64::from_bits(u64::from_le(self.value_bits_le))
    }
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
    /// Decode from a received buffer (any alignment).
    pub fn decode(raw: &[u8]) -> Result<Self, String> {
        expect_exact_len(raw.len(), size_of::<Self>())?;
        Ok(bytemuck::pod_read_unaligned(raw))
    }
}

// ===== Scatter / gather ====================================================

/// Header preceding a chunk payload. `status` distinguishes a normal chunk
/// from an abort issued by the root.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireChunkHdr {
    pub version_le: u16,
    pub status_le: u16,
    pub reserved_le: u32, // future use; keep zero
    pub len_le: u64,
}
const_assert_eq!(size_of::<WireChunkHdr>(), 16);

impl WireChunkHdr {
    pub const OK: u16 = 0;
    pub const ABORT: u16 = 1;

    pub fn chunk(len: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            status_le: Self::OK.to_le(),
            reserved_le: 0,
            len_le: (len as u64).to_le(),
        }
    }
    /// Abort header; `len` carries the global length the root rejected.
    pub fn abort(global_len: usize) -> Self {
        Self {
            status_le: Self::ABORT.to_le(),
            ..Self::chunk(global_len)
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn is_abort(&self) -> bool {
        u16::from_le(self.status_le) == Self::ABORT
    }
    pub fn chunk_len(&self) -> usize {
        u64::from_le(self.len_le) as usize
    }
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
    pub fn decode(raw: &[u8]) -> Result<Self, String> {
        expect_exact_len(raw.len(), size_of::<Self>())?;
        let hdr: Self = bytemuck::pod_read_unaligned(raw);
        if hdr.version() != WIRE_VERSION {
            return Err(format!(
                "wire version {} does not match {}",
                hdr.version(),
                WIRE_VERSION
            ));
        }
        Ok(hdr)
    }
}

/// Encode `values` as little-endian IEEE-754 bit patterns.
pub fn encode_f64s(values: &[f64]) -> Vec<u8> {
    let bits: Vec<u64> = values.iter().map(|v| v.to_bits().to_le()).collect();
    cast_slice(&bits).to_vec()
}

/// Inverse of [`encode_f64s`]; `raw` must hold exactly `count` values.
pub fn decode_f64s(raw: &[u8], count: usize) -> Result<Vec<f64>, String> {
    let expected = count
        .checked_mul(size_of::<u64>())
        .ok_or_else(|| format!("{count} values do not fit in a buffer"))?;
    expect_exact_len(raw.len(), expected)?;
    Ok(raw
        .chunks_exact(size_of::<u64>())
        .map(|b| {
            let bits: u64 = bytemuck::pod_read_unaligned(b);
            f64::from_bits(u64::from_le(bits))
        })
        .collect())
}
