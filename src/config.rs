//! Compile-time constants shared across the crate.
//!
//! These are the fixed caps tied to the 64-bit access-set word and the
//! 6-bit segment-id field of the opaque address: widening either
//! requires widening both `WRITTEN`'s bit position and the address
//! layout in lockstep, so they live together here.

/// Size of the segment table. Slot 0 is never used, so that `Region::start`
/// is never a null-like handle.
pub const MAX_SEG: usize = 64;

/// First usable segment id — the bootstrap (non-freeable) segment.
pub const FIRST_SEG: u8 = 1;

/// Maximum number of concurrently admitted read/write transactions per
/// epoch. One bit of the 64-bit access-set word is reserved for the
/// `WRITTEN` flag, leaving 63 transaction-id bits.
pub const MAX_RW_TX: u32 = 63;

/// The id handed to the first read-only transaction of an epoch; read-only
/// ids increase without bound from here.
pub const FIRST_RO_TX: u64 = MAX_RW_TX as u64;

/// Bit 63 of a word's access-set: set means the word has been written this
/// epoch, and the low bits then name the single writer instead of readers.
pub const WRITTEN: u64 = 1 << 63;
