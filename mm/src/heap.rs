//! Top-level heap orchestration: the four public operations, the split and
//! coalesce algorithms, one-time startup and the statistics ledger.
//!
//! All mutable heap state lives in a single [`HeapState`] behind a global
//! ticket mutex. Public entry points take the lock, run straight-line, and
//! release it on return; `trealloc` composes the other operations without
//! holding the lock across them (the mutex is non-recursive).

use core::ptr;

use tagheap_lib::{TickMutex, align_up_usize, is_aligned_usize, log_debug, log_error, log_warn};

use crate::arena;
use crate::block::{
    self, BlockHeader, BlockState, FULL_HEADER_SIZE, HEADER_SIZE, MIN_PAYLOAD_SIZE, PAYLOAD_ALIGN,
};
use crate::error::{self, HeapError};
use crate::free_list::FreeList;
use crate::segment;

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct HeapStats {
    /// Bytes obtained from the segment, headers and fenceposts included.
    pub total_size: u64,
    /// Payload bytes currently handed out to callers.
    pub allocated_size: u64,
    /// `total_size - allocated_size`; includes block metadata.
    pub free_size: u64,
    pub chunk_count: u32,
    pub allocated_blocks: u32,
    pub free_blocks: u32,
    pub allocation_count: u32,
    pub free_count: u32,
}

pub(crate) struct HeapState {
    pub(crate) free_list: FreeList,
    /// Segment break recorded at startup; offset origin for the walkers.
    pub(crate) heap_origin: *mut u8,
    /// Where this heap last left the break. A mismatch at growth time means
    /// somebody else moved it.
    pub(crate) expected_break: *mut u8,
    /// Right fencepost of the most recently created chunk; anchor for
    /// cross-chunk coalescing.
    pub(crate) last_right_fencepost: *mut BlockHeader,
    pub(crate) stats: HeapStats,
    pub(crate) initialized: bool,
}

// SAFETY: HeapState is only reached through the global TickMutex.
unsafe impl Send for HeapState {}

impl HeapState {
    const fn new() -> Self {
        Self {
            free_list: FreeList::new(),
            heap_origin: ptr::null_mut(),
            expected_break: ptr::null_mut(),
            last_right_fencepost: ptr::null_mut(),
            stats: HeapStats {
                total_size: 0,
                allocated_size: 0,
                free_size: 0,
                chunk_count: 0,
                allocated_blocks: 0,
                free_blocks: 0,
                allocation_count: 0,
                free_count: 0,
            },
            initialized: false,
        }
    }
}

pub(crate) static HEAP: TickMutex<HeapState> = TickMutex::new(HeapState::new());

/// Clamp a request to the minimum payload and round it to the payload
/// alignment.
#[inline]
fn normalize_request(size: usize) -> usize {
    align_up_usize(size.max(MIN_PAYLOAD_SIZE), PAYLOAD_ALIGN)
}

/// One-time startup, run under the lock: record the segment break, verify
/// its alignment, acquire the first chunk. Idempotent.
fn ensure_init(heap: &mut HeapState) -> bool {
    if heap.initialized {
        return true;
    }

    let brk = segment::segment_extend(0);
    if brk.is_null() {
        error::set_last_error(HeapError::NotInitialized);
        return false;
    }
    if !is_aligned_usize(brk as usize, PAYLOAD_ALIGN) {
        log_error!(
            "heap init: segment break {:p} is not {}-aligned",
            brk,
            PAYLOAD_ALIGN
        );
        panic!("heap init: misaligned segment break");
    }

    heap.heap_origin = brk;
    heap.expected_break = brk;
    heap.last_right_fencepost = ptr::null_mut();
    heap.stats = HeapStats::default();

    if let Err(err) = unsafe { arena::grow(heap, 0) } {
        log_error!("heap init: initial chunk acquisition failed: {}", err);
        error::set_last_error(err);
        return false;
    }

    heap.initialized = true;
    log_debug!("heap initialized at {:p}", brk);
    true
}

/// Initialize the heap eagerly. Entry points initialize on first use, so
/// calling this is optional; it exists so embeddings can front-load the
/// first chunk acquisition and observe failure directly.
pub fn init_tag_heap() -> bool {
    let mut heap = HEAP.lock();
    ensure_init(&mut heap)
}

/// Allocate `size` payload bytes. Returns null on `size == 0` or when the
/// segment cannot satisfy the request (the failure kind is then readable via
/// [`heap_last_error`](crate::error::heap_last_error)).
pub fn tmalloc(size: usize) -> *mut u8 {
    if size == 0 {
        return ptr::null_mut();
    }

    let mut heap = HEAP.lock();
    if !ensure_init(&mut heap) {
        return ptr::null_mut();
    }
    let want = normalize_request(size);
    unsafe { alloc_locked(&mut heap, want) }
}

/// Allocate a zeroed region of `count * elem_size` bytes. Returns null on a
/// zero argument or multiplicative overflow, without touching the heap.
pub fn tcalloc(count: usize, elem_size: usize) -> *mut u8 {
    if count == 0 || elem_size == 0 {
        return ptr::null_mut();
    }
    if usize::MAX / count < elem_size {
        return ptr::null_mut();
    }

    let out = tmalloc(count * elem_size);
    if out.is_null() {
        return ptr::null_mut();
    }
    // Zero the whole payload, which may exceed the requested byte count.
    unsafe {
        let b = block::header_from_payload(out);
        ptr::write_bytes(out, 0, (*b).size());
    }
    out
}

/// Resize `old` to `size` payload bytes by allocate-copy-free. `size == 0`
/// behaves like free and returns null; a null `old` behaves like allocate.
/// On allocation failure the original block is left intact and null is
/// returned.
pub fn trealloc(old: *mut u8, size: usize) -> *mut u8 {
    if size == 0 {
        tfree(old);
        return ptr::null_mut();
    }
    if old.is_null() {
        return tmalloc(size);
    }

    let old_payload = unsafe { (*block::header_from_payload(old)).size() };
    let out = tmalloc(size);
    if out.is_null() {
        return ptr::null_mut();
    }
    unsafe {
        ptr::copy_nonoverlapping(old, out, old_payload.min(size));
    }
    tfree(old);
    out
}

/// Release an allocation. Null is a no-op; releasing a block that is
/// already free is fatal.
pub fn tfree(payload: *mut u8) {
    if payload.is_null() {
        return;
    }

    let mut heap = HEAP.lock();
    if !heap.initialized {
        log_warn!("tfree: heap not initialized, dropping {:p}", payload);
        return;
    }
    unsafe { free_locked(&mut heap, payload) }
}

/// Snapshot of the statistics ledger.
pub fn heap_stats() -> HeapStats {
    let heap = HEAP.lock();
    let mut stats = heap.stats;
    stats.free_size = stats.total_size.saturating_sub(stats.allocated_size);
    stats
}

unsafe fn alloc_locked(heap: &mut HeapState, want: usize) -> *mut u8 {
    unsafe {
        let mut b = heap.free_list.find(want);
        if b.is_null() {
            if let Err(err) = arena::grow(heap, want) {
                error::set_last_error(err);
                return ptr::null_mut();
            }
            b = heap.free_list.find(want);
            if b.is_null() {
                error::set_last_error(HeapError::NoMemory);
                return ptr::null_mut();
            }
        }

        heap.free_list.remove(b);
        heap.stats.free_blocks = heap.stats.free_blocks.saturating_sub(1);

        if (*b).size() - want >= FULL_HEADER_SIZE {
            split_block(heap, b, want);
        }
        (*b).set_state(BlockState::Allocated);

        heap.stats.allocated_size = heap.stats.allocated_size.saturating_add((*b).size() as u64);
        heap.stats.allocated_blocks = heap.stats.allocated_blocks.saturating_add(1);
        heap.stats.allocation_count = heap.stats.allocation_count.saturating_add(1);

        block::payload_of(b)
    }
}

/// Shrink the free block `b` to `want` payload bytes and carve the excess
/// into a new free block to its right, head-inserted into the list.
///
/// Precondition: `b` is unlinked and `size(b) - want >= FULL_HEADER_SIZE`,
/// so the remainder can hold its own links.
unsafe fn split_block(heap: &mut HeapState, b: *mut BlockHeader, want: usize) {
    unsafe {
        let remainder_size = (*b).size() - want - HEADER_SIZE;
        (*b).set_size(want);

        let remainder = block::right_neighbor(b);
        (*remainder).set_prev_payload_size(want);
        (*remainder).set_size_and_state(remainder_size, BlockState::Free);

        let right = block::right_neighbor(remainder);
        (*right).set_prev_payload_size(remainder_size);

        heap.free_list.insert(remainder);
        heap.stats.free_blocks = heap.stats.free_blocks.saturating_add(1);
    }
}

/// Return `payload`'s block to the free list, merging with whichever
/// physical neighbors are free so that no two adjacent free blocks survive.
unsafe fn free_locked(heap: &mut HeapState, payload: *mut u8) {
    unsafe {
        let b = block::header_from_payload(payload);
        if (*b).state() == BlockState::Free {
            log_error!("tfree: double free of block at {:p}", payload);
            panic!("tfree: double free detected");
        }

        let freed_payload = (*b).size() as u64;
        let left = block::left_neighbor(b);
        let right = block::right_neighbor(b);
        let left_free = (*left).state() == BlockState::Free;
        let right_free = (*right).state() == BlockState::Free;

        match (left_free, right_free) {
            (false, false) => {
                (*b).set_state(BlockState::Free);
                heap.free_list.insert(b);
                heap.stats.free_blocks = heap.stats.free_blocks.saturating_add(1);
            }
            (true, false) => {
                // Left absorbs b and keeps its current list position.
                (*left).set_size((*left).size() + HEADER_SIZE + (*b).size());
                (*right).set_prev_payload_size((*left).size());
            }
            (false, true) => {
                // b absorbs its right neighbor, inheriting the neighbor's
                // list position (head slot included) instead of re-inserting.
                let far_right = block::right_neighbor(right);
                let merged = (*b).size() + HEADER_SIZE + (*right).size();
                heap.free_list.replace(right, b);
                (*b).set_size_and_state(merged, BlockState::Free);
                (*far_right).set_prev_payload_size(merged);
            }
            (true, true) => {
                // Both sides merge into left; left keeps its list position
                // and the right neighbor drops out of the list.
                let far_right = block::right_neighbor(right);
                heap.free_list.remove(right);
                (*left).set_size((*left).size() + 2 * HEADER_SIZE + (*b).size() + (*right).size());
                (*far_right).set_prev_payload_size((*left).size());
                heap.stats.free_blocks = heap.stats.free_blocks.saturating_sub(1);
            }
        }

        heap.stats.allocated_size = heap.stats.allocated_size.saturating_sub(freed_payload);
        heap.stats.allocated_blocks = heap.stats.allocated_blocks.saturating_sub(1);
        heap.stats.free_count = heap.stats.free_count.saturating_add(1);
    }
}
