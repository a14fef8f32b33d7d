//! The contiguous data segment the heap grows into.
//!
//! This module is the allocator's whole OS interface: one sbrk-shaped
//! primitive over a statically reserved region with a monotonic break
//! cursor. Everything above treats the segment as an abstract capability —
//! "extend the data segment by N bytes and return the start of the new
//! region, or fail" — so swapping this for a real `sbrk`/`mmap` backend
//! touches nothing else.
//!
//! The break is an atomic so that a foreign caller racing the heap (the
//! external-movement scenario the arena manager defends against) cannot tear
//! it; legitimate heap growth always happens under the heap mutex.

use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Capacity of the backing region.
pub const SEGMENT_SIZE: usize = 4 * 1024 * 1024;

/// Statically reserved backing storage. Page-aligned so chunk bases are
/// always well-aligned; zero-initialized, so it lives in `.bss`.
#[repr(C, align(4096))]
struct SegmentBacking([u8; SEGMENT_SIZE]);

static mut SEGMENT: SegmentBacking = SegmentBacking([0; SEGMENT_SIZE]);

/// Break offset into the backing region.
static BREAK: AtomicUsize = AtomicUsize::new(0);

#[inline]
fn backing_base() -> *mut u8 {
    (&raw mut SEGMENT) as *mut u8
}

/// Move the segment break by `delta` bytes and return the *previous* break,
/// in the manner of `sbrk`:
///
/// - positive `delta` grows the segment; the returned pointer is the start
///   of the newly usable region,
/// - zero queries the current break,
/// - negative `delta` shrinks the break (used to revert a movement).
///
/// Returns null when the move would leave the backing region.
pub fn segment_extend(delta: isize) -> *mut u8 {
    let base = backing_base();
    if delta == 0 {
        return unsafe { base.add(BREAK.load(Ordering::Relaxed)) };
    }
    loop {
        let current = BREAK.load(Ordering::Relaxed);
        let target = match (current as isize).checked_add(delta) {
            Some(t) => t,
            None => return ptr::null_mut(),
        };
        if target < 0 || target as usize > SEGMENT_SIZE {
            return ptr::null_mut();
        }
        if BREAK
            .compare_exchange(current, target as usize, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            return unsafe { base.add(current) };
        }
    }
}

/// Start of the backing region.
pub fn segment_base() -> *const u8 {
    backing_base()
}

/// One past the last byte the break can reach.
pub fn segment_limit() -> *const u8 {
    unsafe { backing_base().add(SEGMENT_SIZE) }
}

/// Bytes still available below the limit.
pub fn segment_remaining() -> usize {
    SEGMENT_SIZE - BREAK.load(Ordering::Relaxed)
}
