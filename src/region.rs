//! `Region`: the single top-level owner tying the batcher, segment table,
//! segment-id stack, and operation log together. One struct owns every
//! tier and exposes a thin method surface over them, rather than module
//! statics, since a DV-STM instance is not a process-wide singleton.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use log::{debug, trace};

use crate::access_set;
use crate::address::Address;
use crate::batcher::{Batcher, TxId};
use crate::config::{FIRST_SEG, MAX_SEG, WRITTEN};
use crate::error::{AllocOutcome, BeginError, CreateError};
use crate::oplog::{LogTable, OpRecord};
use crate::segment::Segment;
use crate::sync::SpinMutex;

/// LIFO pool of unused segment ids: a spin-guarded owned `Vec<u8>` stack
/// rather than a fixed-capacity array plus top index.
struct IdStack {
    ids: SpinMutex<Vec<u8>>,
}

impl IdStack {
    fn new() -> Self {
        let mut ids: Vec<u8> = ((FIRST_SEG + 1)..(MAX_SEG as u8)).collect();
        ids.reverse();
        Self {
            ids: SpinMutex::new(ids),
        }
    }

    fn pop(&self) -> Option<u8> {
        self.ids.lock().pop()
    }

    fn push(&self, id: u8) {
        self.ids.lock().push(id);
    }
}

/// One dual-versioned transactional memory instance.
pub struct Region {
    batcher: Batcher,
    align: usize,
    start: Address,
    size: usize,
    segments: [AtomicPtr<Segment>; MAX_SEG],
    id_stack: IdStack,
    log: LogTable,
}

// `segments` is an array of AtomicPtr (Send+Sync by construction); every
// other field is already Send+Sync (see `sync`, `batcher`). Segment
// access is always mediated by `Acquire`/`Release` on the table slot or
// by the batcher's single-threaded end-of-epoch window.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Create a region with one bootstrap segment of `size` bytes,
    /// `align`-byte words.
    pub fn create(size: usize, align: usize) -> Result<Self, CreateError> {
        if !align.is_power_of_two() || size == 0 || !size.is_multiple_of(align) {
            return Err(CreateError::InvalidLayout);
        }

        let bootstrap = Segment::new(FIRST_SEG, size, align).ok_or(CreateError::AllocFailed)?;

        let segments: [AtomicPtr<Segment>; MAX_SEG] =
            std::array::from_fn(|_| AtomicPtr::new(ptr::null_mut()));
        segments[FIRST_SEG as usize].store(Box::into_raw(Box::new(bootstrap)), Ordering::Release);

        Ok(Self {
            batcher: Batcher::new(),
            align,
            start: Address::new(FIRST_SEG, 0),
            size,
            segments,
            id_stack: IdStack::new(),
            log: LogTable::new(),
        })
    }

    #[inline]
    pub fn start(&self) -> Address {
        self.start
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    fn segment(&self, seg_id: u8) -> Option<&Segment> {
        let ptr = self.segments[seg_id as usize].load(Ordering::Acquire);
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { &*ptr })
        }
    }

    pub fn begin(&self, is_ro: bool) -> Result<TxId, BeginError> {
        self.batcher.enter(is_ro)
    }

    /// Commit. Always succeeds.
    pub fn end(&self, tx: TxId) -> bool {
        self.leave(tx, true);
        true
    }

    /// Read `len` bytes from `src` into `dst`. Returns `false` on
    /// conflict-abort, in which case the transaction is already left and
    /// must not be used again.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for `len` writes; `src` must name a byte range
    /// within one of this region's live segments.
    pub unsafe fn read(&self, tx: TxId, src: Address, len: u64, dst: *mut u8) -> bool {
        let Some(seg) = self.segment(src.seg_id()) else {
            return false;
        };

        if tx.is_read_only() {
            unsafe { ptr::copy_nonoverlapping(seg.ro_ptr(src.offset()), dst, len as usize) };
            return true;
        }

        let p = access_set::bit(tx.rw_index());
        let range = seg.word_range(src.offset(), len);

        for w in range.clone() {
            seg.lock(w).lock();
        }
        let conflict = range
            .clone()
            .any(|w| access_set::read_conflicts(seg.access_set(w).load(Ordering::Relaxed), p));
        if conflict {
            for w in range {
                seg.lock(w).unlock();
            }
            debug!("read conflict: tx={} seg={}", tx.rw_index(), src.seg_id());
            self.leave(tx, false);
            return false;
        }

        unsafe { ptr::copy_nonoverlapping(seg.rw_ptr(src.offset()), dst, len as usize) };
        for w in range.clone() {
            let a = seg.access_set(w).load(Ordering::Relaxed);
            seg.access_set(w).store(access_set::mark_read(a, p), Ordering::Relaxed);
        }
        for w in range {
            seg.lock(w).unlock();
        }

        self.log.push(
            tx.rw_index(),
            OpRecord::Read {
                seg_id: src.seg_id(),
                offset: src.offset(),
                len,
            },
        );
        true
    }

    /// Write `len` bytes from `src` to `dst`. Returns `false` on
    /// conflict-abort.
    ///
    /// # Safety
    ///
    /// `src` must be valid for `len` reads; `dst` must name a byte range
    /// within one of this region's live segments.
    pub unsafe fn write(&self, tx: TxId, dst: Address, len: u64, src: *const u8) -> bool {
        debug_assert!(!tx.is_read_only(), "read-only transactions cannot write");
        let Some(seg) = self.segment(dst.seg_id()) else {
            return false;
        };

        let p = access_set::bit(tx.rw_index());
        let range = seg.word_range(dst.offset(), len);

        for w in range.clone() {
            seg.lock(w).lock();
        }
        let conflict = range
            .clone()
            .any(|w| access_set::write_conflicts(seg.access_set(w).load(Ordering::Relaxed), p));
        if conflict {
            for w in range {
                seg.lock(w).unlock();
            }
            debug!("write conflict: tx={} seg={}", tx.rw_index(), dst.seg_id());
            self.leave(tx, false);
            return false;
        }

        unsafe { ptr::copy_nonoverlapping(src, seg.rw_ptr(dst.offset()), len as usize) };
        for w in range.clone() {
            let a = seg.access_set(w).load(Ordering::Relaxed);
            seg.access_set(w).store(access_set::mark_write(a, p), Ordering::Relaxed);
        }
        for w in range {
            seg.lock(w).unlock();
        }

        self.log.push(
            tx.rw_index(),
            OpRecord::Write {
                seg_id: dst.seg_id(),
                offset: dst.offset(),
                len,
            },
        );
        true
    }

    /// Allocate a new segment of `size` bytes. `tx` must be a read/write
    /// transaction.
    pub fn alloc(&self, tx: TxId, size: usize) -> AllocOutcome {
        debug_assert!(!tx.is_read_only(), "read-only transactions cannot alloc");

        let Some(seg_id) = self.id_stack.pop() else {
            return AllocOutcome::Abort;
        };

        let seg = match Segment::new(seg_id, size, self.align) {
            Some(seg) => seg,
            None => {
                self.id_stack.push(seg_id);
                return AllocOutcome::NoMem;
            }
        };

        self.segments[seg_id as usize].store(Box::into_raw(Box::new(seg)), Ordering::Release);
        self.log.push(tx.rw_index(), OpRecord::Alloc { seg_id });
        trace!("alloc: tx={} seg={}", tx.rw_index(), seg_id);
        AllocOutcome::Success(Address::new(seg_id, 0))
    }

    /// Mark `addr`'s segment for deferred free. The first segment is not
    /// freeable; freeing it aborts the transaction.
    pub fn free(&self, tx: TxId, addr: Address) -> bool {
        debug_assert!(!tx.is_read_only(), "read-only transactions cannot free");
        if addr.seg_id() == FIRST_SEG {
            self.leave(tx, false);
            return false;
        }
        self.log.push(tx.rw_index(), OpRecord::Free { seg_id: addr.seg_id() });
        true
    }

    /// Per-transaction leave: rollback on abort, finalize on commit (both
    /// finalize a commit), then hand off to the batcher.
    fn leave(&self, tx: TxId, committed: bool) {
        if !tx.is_read_only() {
            let p = access_set::bit(tx.rw_index());
            for record in self.log.take(tx.rw_index()) {
                match record {
                    OpRecord::Read { seg_id, offset, len } => {
                        if !committed {
                            if let Some(seg) = self.segment(seg_id) {
                                let range = seg.word_range(offset, len);
                                for w in range {
                                    seg.lock(w).lock();
                                    let a = seg.access_set(w).load(Ordering::Relaxed);
                                    seg.access_set(w).store(a & !p, Ordering::Relaxed);
                                    seg.lock(w).unlock();
                                }
                            }
                        }
                    }
                    OpRecord::Write { seg_id, offset, len } => {
                        let Some(seg) = self.segment(seg_id) else { continue };
                        if committed {
                            seg.mark_written();
                        } else {
                            let range = seg.word_range(offset, len);
                            for w in range.clone() {
                                seg.lock(w).lock();
                            }
                            unsafe {
                                ptr::copy_nonoverlapping(
                                    seg.ro_ptr(offset),
                                    seg.rw_ptr(offset),
                                    len as usize,
                                )
                            };
                            for w in range {
                                let a = seg.access_set(w).load(Ordering::Relaxed);
                                seg.access_set(w).store(a & !(WRITTEN | p), Ordering::Relaxed);
                                seg.lock(w).unlock();
                            }
                        }
                    }
                    OpRecord::Alloc { seg_id } => {
                        if !committed {
                            if let Some(seg) = self.segment(seg_id) {
                                seg.mark_freed();
                            }
                        }
                    }
                    OpRecord::Free { seg_id } => {
                        if committed {
                            if let Some(seg) = self.segment(seg_id) {
                                seg.mark_freed();
                            }
                        }
                    }
                }
            }
        }

        self.batcher.leave(|| self.run_end_of_epoch());
    }

    /// Snapshot installation and segment reclamation, run by the last
    /// thread to leave an epoch. Single-threaded at this
    /// point: the batcher holds its mutex and `remaining` just hit zero.
    fn run_end_of_epoch(&self) {
        for seg_id in FIRST_SEG..(MAX_SEG as u8) {
            let slot = &self.segments[seg_id as usize];
            let raw = slot.load(Ordering::Acquire);
            if raw.is_null() {
                continue;
            }
            let seg = unsafe { &*raw };

            if seg.is_freed() {
                slot.store(ptr::null_mut(), Ordering::Release);
                unsafe { drop(Box::from_raw(raw)) };
                self.id_stack.push(seg_id);
                trace!("end-of-epoch: freed seg={}", seg_id);
            } else if seg.is_written() {
                seg.install_snapshot();
            } else {
                seg.reset_access_sets();
            }
        }
        self.log.clear_all();
        trace!("end-of-epoch complete");
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        for slot in &self.segments {
            let raw = slot.swap(ptr::null_mut(), Ordering::AcqRel);
            if !raw.is_null() {
                unsafe { drop(Box::from_raw(raw)) };
            }
        }
    }
}
