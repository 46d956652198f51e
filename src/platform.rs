//! The host allocator as an external primitive: a source of aligned,
//! zeroed blocks. This module is the one seam that actually calls into
//! it, so the rest of the crate never touches `std::alloc` directly.

use std::alloc::{self, Layout};

/// Allocate `size` bytes zero-initialized, aligned to `align`.
///
/// Returns null on allocation failure. `align` must be a power of two and
/// `size` must be a positive multiple of `align` — both are invariants
/// `Region::create` and `alloc` already enforce before calling this.
///
/// # Safety
///
/// Caller must eventually pass the returned pointer to [`aligned_dealloc`]
/// with the exact same `size`/`align`.
pub unsafe fn aligned_alloc(size: usize, align: usize) -> *mut u8 {
    debug_assert!(align.is_power_of_two());
    debug_assert!(size > 0 && size.is_multiple_of(align));
    let layout = match Layout::from_size_align(size, align) {
        Ok(l) => l,
        Err(_) => return std::ptr::null_mut(),
    };
    unsafe { alloc::alloc_zeroed(layout) }
}

/// Free a buffer previously returned by [`aligned_alloc`].
///
/// # Safety
///
/// `ptr`, `size`, `align` must match a prior `aligned_alloc` call exactly,
/// and the buffer must not be accessed again afterward.
pub unsafe fn aligned_dealloc(ptr: *mut u8, size: usize, align: usize) {
    let layout = Layout::from_size_align(size, align).expect("layout matched a prior alloc");
    unsafe { alloc::dealloc(ptr, layout) };
}
