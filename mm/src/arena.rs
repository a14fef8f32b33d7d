//! Arena growth: chunk acquisition from the segment, fencepost
//! installation, and stitching of physically adjacent chunks into one
//! logical heap region.

use tagheap_lib::{align_up_usize, is_aligned_usize, log_debug, log_error, log_warn};

use crate::block::{self, BlockHeader, BlockState, HEADER_SIZE, PAYLOAD_ALIGN};
use crate::error::{HeapError, HeapResult};
use crate::heap::HeapState;
use crate::segment;

/// Granularity of segment extension. Every chunk is a multiple of this.
pub(crate) const CHUNK_SIZE: usize = 4096;

/// Acquire a chunk large enough for a normalized request of `want` payload
/// bytes and splice it into the heap. On success the free list contains a
/// block of at least `want` bytes.
///
/// Growth is where external movement of the segment break becomes visible,
/// so the break is re-checked here before extending; a mismatch fails the
/// request until the movement is reverted.
///
/// # Safety
/// Must be called with the heap lock held and `heap`'s fencepost/break
/// bookkeeping consistent.
pub(crate) unsafe fn grow(heap: &mut HeapState, want: usize) -> HeapResult {
    let current = segment::segment_extend(0);
    if current != heap.expected_break {
        log_error!(
            "arena: segment break moved externally (expected {:p}, found {:p})",
            heap.expected_break,
            current
        );
        return Err(HeapError::SegmentMoved);
    }

    // One interior block plus two fenceposts, rounded up to the granularity.
    let raw = align_up_usize(want.saturating_add(3 * HEADER_SIZE), CHUNK_SIZE);
    if raw > isize::MAX as usize {
        return Err(HeapError::NoMemory);
    }
    let base = segment::segment_extend(raw as isize);
    if base.is_null() {
        log_warn!("arena: segment exhausted extending by {} bytes", raw);
        return Err(HeapError::NoMemory);
    }
    if !is_aligned_usize(base as usize, PAYLOAD_ALIGN) {
        log_error!("arena: segment returned misaligned base {:p}", base);
        return Err(HeapError::NoMemory);
    }
    heap.expected_break = unsafe { base.add(raw) };

    unsafe {
        // Lay the chunk out as [fencepost | interior free block | fencepost].
        let left_fence = base as *mut BlockHeader;
        (*left_fence).set_prev_payload_size(0);
        (*left_fence).set_size_and_state(0, BlockState::Fencepost);

        let interior = block::right_neighbor(left_fence);
        let interior_size = raw - 3 * HEADER_SIZE;
        (*interior).set_prev_payload_size(0);
        (*interior).set_size_and_state(interior_size, BlockState::Free);

        let right_fence = block::right_neighbor(interior);
        (*right_fence).set_prev_payload_size(interior_size);
        (*right_fence).set_size_and_state(0, BlockState::Fencepost);

        heap.stats.total_size = heap.stats.total_size.saturating_add(raw as u64);
        heap.stats.chunk_count = heap.stats.chunk_count.saturating_add(1);

        let prev_fence = heap.last_right_fencepost;
        if !prev_fence.is_null() && block::left_neighbor(left_fence) == prev_fence {
            stitch(heap, prev_fence, interior_size, right_fence);
        } else {
            heap.free_list.insert(interior);
            heap.stats.free_blocks = heap.stats.free_blocks.saturating_add(1);
        }
        heap.last_right_fencepost = right_fence;
    }

    log_debug!("arena: grew heap by {} bytes at {:p}", raw, base);
    Ok(())
}

/// Merge a freshly laid-out chunk with the chunk ending at `prev_fence`.
/// The shared fencepost pair is absorbed into one free block — together
/// with the previous chunk's tail block when that is free — and the merged
/// block is head-inserted.
unsafe fn stitch(
    heap: &mut HeapState,
    prev_fence: *mut BlockHeader,
    interior_size: usize,
    right_fence: *mut BlockHeader,
) {
    unsafe {
        let prev_tail = block::left_neighbor(prev_fence);
        let merged: *mut BlockHeader;

        if (*prev_tail).state() == BlockState::Free {
            // Tail, both fenceposts and the new interior become one block.
            // The tail is re-inserted below so the merged block lands at the
            // head of the list like any other fresh free block.
            heap.free_list.remove(prev_tail);
            (*prev_tail).set_size((*prev_tail).size() + 3 * HEADER_SIZE + interior_size);
            merged = prev_tail;
        } else {
            // Only the fencepost pair is absorbed; the merged block starts
            // where the previous chunk's right fencepost stood, so its
            // boundary tag already names the allocated tail.
            merged = prev_fence;
            (*merged).set_size_and_state(2 * HEADER_SIZE + interior_size, BlockState::Free);
            heap.stats.free_blocks = heap.stats.free_blocks.saturating_add(1);
        }

        (*right_fence).set_prev_payload_size((*merged).size());
        heap.free_list.insert(merged);
    }
}
