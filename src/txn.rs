//! The public transaction API: thin free functions over `&Region`.
//!
//! Grounded on the teacher's `GlobalAlloc` impl in `allocator.rs` — "a thin
//! public surface that immediately delegates to the owning struct" — but
//! shaped as free functions taking `&Region` rather than methods on a
//! single global instance, since spec.md scopes the FFI glue (and its
//! assumption of one process-wide handle) out of this crate. Every
//! function here is a direct pass-through to the matching `Region` method;
//! the logic lives there, not here.

use crate::address::Address;
use crate::batcher::TxId;
use crate::error::{AllocOutcome, BeginError};
use crate::region::Region;

/// Admit a transaction into the current or next epoch. `is_ro = true`
/// requests a read-only transaction (unbounded); `is_ro = false` requests
/// a read/write transaction, rejected with [`BeginError::CapacityExhausted`]
/// once `MAX_RW_TX` are already outstanding this epoch.
pub fn begin(region: &Region, is_ro: bool) -> Result<TxId, BeginError> {
    region.begin(is_ro)
}

/// Commit `tx`. Always succeeds (spec.md §4.6) — a transaction that made
/// it this far without an op reporting failure has nothing left to abort.
pub fn end(region: &Region, tx: TxId) -> bool {
    region.end(tx)
}

/// Read `len` bytes starting at `src` into `dst`. `len` must be a positive
/// multiple of `region.align()` and the range must lie within `src`'s
/// segment. Returns `false` on conflict-abort, in which case `tx` is
/// already left and must not be used again (not even passed to `end`).
///
/// # Safety
///
/// `dst` must be valid for `len` writes.
pub unsafe fn read(region: &Region, tx: TxId, src: Address, len: u64, dst: *mut u8) -> bool {
    unsafe { region.read(tx, src, len, dst) }
}

/// Write `len` bytes from `src` into `dst`. Symmetric to [`read`]; `tx`
/// must be a read/write transaction.
///
/// # Safety
///
/// `src` must be valid for `len` reads.
pub unsafe fn write(region: &Region, tx: TxId, dst: Address, len: u64, src: *const u8) -> bool {
    unsafe { region.write(tx, dst, len, src) }
}

/// Allocate a new segment of `size` bytes (a positive multiple of
/// `region.align()`). `tx` must be a read/write transaction.
pub fn alloc(region: &Region, tx: TxId, size: usize) -> AllocOutcome {
    region.alloc(tx, size)
}

/// Mark `target`'s segment for deferred free at the next end-of-epoch
/// procedure. Freeing the region's first segment always aborts `tx` and
/// returns `false`.
pub fn free(region: &Region, tx: TxId, target: Address) -> bool {
    region.free(tx, target)
}

/// The opaque handle of the region's non-freeable first segment.
pub fn start(region: &Region) -> Address {
    region.start()
}

/// Byte size of the region's first segment.
pub fn size(region: &Region) -> usize {
    region.size()
}

/// The region's word size, in bytes.
pub fn align(region: &Region) -> usize {
    region.align()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;

    #[test]
    fn accessors_match_create_arguments() {
        let region = Region::create(64, 8).unwrap();
        assert_eq!(size(&region), 64);
        assert_eq!(align(&region), 8);
        assert_eq!(start(&region), region.start());
    }

    #[test]
    fn begin_end_roundtrip_through_free_functions() {
        let region = Region::create(64, 8).unwrap();
        let tx = begin(&region, false).unwrap();
        let data = [9u8; 8];
        assert!(unsafe { write(&region, tx, start(&region), 8, data.as_ptr()) });
        let mut out = [0u8; 8];
        assert!(unsafe { read(&region, tx, start(&region), 8, out.as_mut_ptr()) });
        assert_eq!(out, data);
        assert!(end(&region, tx));
    }

    #[test]
    fn free_of_first_segment_is_rejected() {
        let region = Region::create(64, 8).unwrap();
        let tx = begin(&region, false).unwrap();
        assert!(!free(&region, tx, start(&region)));
    }
}
