//! The opaque address: a 64-bit handle encoding `(seg_id, offset)`.
//!
//! Bit-exact layout: `[unused:10 | seg_id:6 | offset:48]`. Same bit-
//! splitting idiom as a radix page-table index, flattened to this single
//! two-field layout instead of a multi-level lookup.

const SEG_ID_SHIFT: u32 = 48;
const SEG_ID_BITS: u32 = 6;
const SEG_ID_MASK: u64 = (1 << SEG_ID_BITS) - 1;
const OFFSET_MASK: u64 = (1 << SEG_ID_SHIFT) - 1;

/// An opaque handle to a byte offset inside some segment of a `Region`.
///
/// Returned by [`crate::region::Region::start`] and `alloc`, and passed to
/// `read`/`write`/`free`. Two `Address` values are equal iff they name the
/// same segment and byte offset.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Address(u64);

impl Address {
    /// Build an address from a segment id and byte offset.
    ///
    /// `seg_id` must fit in 6 bits (`< 64`); `offset` must fit in 48 bits.
    /// Both are invariants the region upholds internally — this is not a
    /// validated public constructor.
    pub(crate) const fn new(seg_id: u8, offset: u64) -> Self {
        debug_assert!((seg_id as u64) <= SEG_ID_MASK);
        debug_assert!(offset <= OFFSET_MASK);
        Self(((seg_id as u64) << SEG_ID_SHIFT) | (offset & OFFSET_MASK))
    }

    #[inline]
    pub(crate) fn seg_id(self) -> u8 {
        ((self.0 >> SEG_ID_SHIFT) & SEG_ID_MASK) as u8
    }

    #[inline]
    pub(crate) fn offset(self) -> u64 {
        self.0 & OFFSET_MASK
    }

    /// Raw bit-exact encoding, for callers that need the C-ABI value.
    pub fn into_raw(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_seg_id_and_offset() {
        let addr = Address::new(5, 128);
        assert_eq!(addr.seg_id(), 5);
        assert_eq!(addr.offset(), 128);
    }

    #[test]
    fn max_seg_id_and_offset() {
        let addr = Address::new(63, OFFSET_MASK);
        assert_eq!(addr.seg_id(), 63);
        assert_eq!(addr.offset(), OFFSET_MASK);
    }

    #[test]
    fn zero_is_zero() {
        let addr = Address::new(0, 0);
        assert_eq!(addr.into_raw(), 0);
    }

    #[test]
    fn distinct_segments_are_distinct_addresses() {
        assert_ne!(Address::new(1, 0), Address::new(2, 0));
        assert_ne!(Address::new(1, 0), Address::new(1, 8));
    }

    #[cfg(not(loom))]
    mod quickcheck_props {
        use super::super::*;
        use quickcheck_macros::quickcheck;

        #[quickcheck]
        fn encode_decode_round_trip(seg_id_raw: u8, offset_raw: u64) -> bool {
            let seg_id = seg_id_raw & (SEG_ID_MASK as u8);
            let offset = offset_raw & OFFSET_MASK;
            let addr = Address::new(seg_id, offset);
            addr.seg_id() == seg_id && addr.offset() == offset
        }
    }
}
