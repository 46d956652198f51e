//! Pure conflict predicates over a loaded access-set word.
//!
//! spec.md §4.2 describes a 64-bit per-word access-set: bit 63
//! ([`crate::config::WRITTEN`]) flags a write, and bits 0..62 name the
//! r/w transaction(s) that have touched the word this epoch (a single
//! writer bit when `WRITTEN` is set, any number of reader bits otherwise).
//! These functions take an already-loaded `u64` — the caller
//! (`segment::Segment`) is responsible for holding the word's `SpinLock`
//! for the whole check-then-mutate sequence; that is what makes the
//! combination atomic, not anything in here.

use crate::config::WRITTEN;

/// Bit pattern for a given r/w transaction id.
#[inline]
pub(crate) fn bit(tx: u32) -> u64 {
    debug_assert!(tx < 63, "bit() is undefined for read-only or out-of-range tx ids");
    1u64 << tx
}

/// True if a read by transaction `p` (as `bit(tx)`) conflicts with the
/// current access-set value `a`: some other transaction has written the
/// word this epoch.
#[inline]
pub(crate) fn read_conflicts(a: u64, p: u64) -> bool {
    a >= WRITTEN && (a & p) == 0
}

/// True if a write by transaction `p` conflicts with `a`: either another
/// transaction already wrote the word, or any other transaction has read
/// it this epoch.
#[inline]
pub(crate) fn write_conflicts(a: u64, p: u64) -> bool {
    (a >= WRITTEN && (a & p) == 0) || (a < WRITTEN && (a & !p) != 0)
}

/// New access-set value after a successful read by `p`.
#[inline]
pub(crate) fn mark_read(a: u64, p: u64) -> u64 {
    a | p
}

/// New access-set value after a successful write by `p`.
#[inline]
pub(crate) fn mark_write(_a: u64, p: u64) -> u64 {
    WRITTEN | p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_word_never_conflicts() {
        assert!(!read_conflicts(0, bit(3)));
        assert!(!write_conflicts(0, bit(3)));
    }

    #[test]
    fn read_sees_own_prior_write_without_conflict() {
        let a = mark_write(0, bit(3));
        assert!(!read_conflicts(a, bit(3)));
    }

    #[test]
    fn read_conflicts_with_other_writer() {
        let a = mark_write(0, bit(1));
        assert!(read_conflicts(a, bit(2)));
    }

    #[test]
    fn write_conflicts_with_other_writer() {
        let a = mark_write(0, bit(1));
        assert!(write_conflicts(a, bit(2)));
        assert!(!write_conflicts(a, bit(1)));
    }

    #[test]
    fn write_conflicts_with_any_other_reader() {
        let a = mark_read(0, bit(1));
        let a = mark_read(a, bit(2));
        assert!(write_conflicts(a, bit(3)));
    }

    #[test]
    fn same_tx_can_write_after_its_own_read() {
        let a = mark_read(0, bit(1));
        assert!(!write_conflicts(a, bit(1)));
    }

    #[test]
    fn multiple_readers_do_not_conflict_with_each_other() {
        let a = mark_read(0, bit(1));
        assert!(!read_conflicts(a, bit(2)));
        let a = mark_read(a, bit(2));
        assert!(!read_conflicts(a, bit(1)));
    }

    #[cfg(not(loom))]
    mod quickcheck_props {
        use super::super::*;
        use quickcheck_macros::quickcheck;

        #[quickcheck]
        fn read_conflict_matches_truth_table(raw: u64, tx: u8) -> bool {
            let tx = (tx % 63) as u32;
            let p = bit(tx);
            let expected = raw >= WRITTEN && (raw & p) == 0;
            read_conflicts(raw, p) == expected
        }

        #[quickcheck]
        fn write_conflict_matches_truth_table(raw: u64, tx: u8) -> bool {
            let tx = (tx % 63) as u32;
            let p = bit(tx);
            let expected = (raw >= WRITTEN && (raw & p) == 0) || (raw < WRITTEN && (raw & !p) != 0);
            write_conflicts(raw, p) == expected
        }

        #[quickcheck]
        fn mark_write_always_sets_written_and_own_bit(raw: u64, tx: u8) -> bool {
            let tx = (tx % 63) as u32;
            let p = bit(tx);
            let a = mark_write(raw, p);
            a >= WRITTEN && (a & p) != 0
        }
    }
}
