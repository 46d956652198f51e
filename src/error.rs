//! Error and outcome enums shared by `txn` and `region`.
//!
//! Plain hand-written enums with manual `Display`/`Error` impls: this
//! layer is low-level enough that a dependency on `thiserror`/`anyhow`
//! would be overkill for a handful of fieldless variants.

use std::fmt;

/// Failure of `begin`: admission returns this only when read/write
/// capacity (`MAX_RW_TX` concurrently admitted) is exhausted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BeginError {
    CapacityExhausted,
}

impl fmt::Display for BeginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExhausted => {
                write!(f, "read/write transaction capacity exhausted for this epoch")
            }
        }
    }
}

impl std::error::Error for BeginError {}

/// Result of `alloc`: success carries the new segment's address; the
/// other two variants both leave the transaction already aborted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AllocOutcome {
    Success(crate::address::Address),
    NoMem,
    Abort,
}

/// Failure of `Region::create`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CreateError {
    InvalidLayout,
    AllocFailed,
}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLayout => write!(f, "align must be a power of two and size a positive multiple of align"),
            Self::AllocFailed => write!(f, "host allocator failed to provide the first segment"),
        }
    }
}

impl std::error::Error for CreateError {}
