//! Segment nodes: dual (RO/RW) buffers and per-word access-set metadata.
//!
//! A `Segment` is a slab-owned metadata struct describing a contiguous
//! memory range, with the buffers themselves obtained through `platform`.
//! It is not intrusive-linked — the region's segment table (an
//! `AtomicPtr` array) owns lookup, so this struct only needs to own its
//! buffers and per-word metadata.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::platform;
use crate::sync::SpinLock;

/// One word's worth of metadata plus a dual-copy buffer slot.
///
/// `ro`/`rw` are raw word-aligned buffers of `size` bytes (`num_words *
/// word_size`). `aset_locks[w]` guards both `aset[w]` and any mutation of
/// `rw` bytes belonging to word `w` — a `SpinLock` rather than a
/// `std::sync::Mutex` since it is held for only a handful of instructions
/// at a time.
pub(crate) struct Segment {
    seg_id: u8,
    size: usize,
    word_size: usize,
    num_words: usize,
    freed: AtomicBool,
    written: AtomicBool,
    aset_locks: Box<[SpinLock]>,
    aset: Box<[AtomicU64]>,
    ro: *mut u8,
    rw: *mut u8,
}

// `ro`/`rw` are plain heap buffers with no interior aliasing outside the
// per-word locks; every byte range they expose is reached only while the
// corresponding `aset_locks[w]` is held (or during the single-threaded
// end-of-epoch window), so `Segment` is safe to share across threads.
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    /// Allocate a new segment of `size` bytes (a positive multiple of
    /// `word_size`), zero-initialized. Returns `None` on host allocator
    /// failure.
    pub(crate) fn new(seg_id: u8, size: usize, word_size: usize) -> Option<Self> {
        debug_assert!(size > 0 && size.is_multiple_of(word_size));
        let num_words = size / word_size;

        let ro = unsafe { platform::aligned_alloc(size, word_size) };
        if ro.is_null() {
            return None;
        }
        let rw = unsafe { platform::aligned_alloc(size, word_size) };
        if rw.is_null() {
            unsafe { platform::aligned_dealloc(ro, size, word_size) };
            return None;
        }

        let aset_locks = (0..num_words).map(|_| SpinLock::new()).collect();
        let aset = (0..num_words).map(|_| AtomicU64::new(0)).collect();

        Some(Self {
            seg_id,
            size,
            word_size,
            num_words,
            freed: AtomicBool::new(false),
            written: AtomicBool::new(false),
            aset_locks,
            aset,
            ro,
            rw,
        })
    }

    #[inline]
    pub(crate) fn seg_id(&self) -> u8 {
        self.seg_id
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn num_words(&self) -> usize {
        self.num_words
    }

    #[inline]
    pub(crate) fn is_freed(&self) -> bool {
        self.freed.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn mark_freed(&self) {
        self.freed.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_written(&self) -> bool {
        self.written.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn mark_written(&self) {
        self.written.store(true, Ordering::Release);
    }

    /// Word index (and a debug bounds check) for a byte offset/length.
    #[inline]
    pub(crate) fn word_range(&self, offset: u64, len: u64) -> std::ops::Range<usize> {
        debug_assert!(offset.is_multiple_of(self.word_size as u64));
        debug_assert!(len.is_multiple_of(self.word_size as u64));
        let start = (offset as usize) / self.word_size;
        let end = start + (len as usize) / self.word_size;
        debug_assert!(end <= self.num_words);
        start..end
    }

    #[inline]
    pub(crate) fn lock(&self, word: usize) -> &SpinLock {
        &self.aset_locks[word]
    }

    #[inline]
    pub(crate) fn access_set(&self, word: usize) -> &AtomicU64 {
        &self.aset[word]
    }

    /// Raw pointer to byte `offset` of the read-only copy. Caller must hold
    /// no lock for plain reads outside an epoch boundary — `ro` only
    /// mutates during the single-threaded end-of-epoch window.
    #[inline]
    pub(crate) fn ro_ptr(&self, offset: u64) -> *const u8 {
        unsafe { self.ro.add(offset as usize) }
    }

    /// Raw pointer to byte `offset` of the read/write copy. Caller must
    /// hold `aset_locks[w]` for every word the access spans.
    #[inline]
    pub(crate) fn rw_ptr(&self, offset: u64) -> *mut u8 {
        unsafe { self.rw.add(offset as usize) }
    }

    /// Copy `rw` onto `ro` across the whole segment and clear every
    /// per-word access set. Called once per epoch, for segments marked
    /// `written`, from the single-threaded end-of-epoch window — no
    /// locking needed here.
    pub(crate) fn install_snapshot(&self) {
        unsafe {
            std::ptr::copy_nonoverlapping(self.rw, self.ro, self.size);
        }
        self.written.store(false, Ordering::Release);
        self.reset_access_sets();
    }

    /// Clear every per-word access set without touching the buffers —
    /// the path taken for segments that were untouched this epoch (no
    /// `written` flag, nothing to copy) but may still carry stale reader
    /// bits from aborted transactions that already cleared their own bit
    /// individually; this defensive sweep runs unconditionally on every
    /// live segment at end-of-epoch.
    pub(crate) fn reset_access_sets(&self) {
        for cell in self.aset.iter() {
            cell.store(0, Ordering::Relaxed);
        }
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        unsafe {
            platform::aligned_dealloc(self.ro, self.size, self.word_size);
            platform::aligned_dealloc(self.rw, self.size, self.word_size);
        }
    }
}
