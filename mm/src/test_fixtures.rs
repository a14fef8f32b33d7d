//! Shared helpers for the in-tree test suites: heap introspection, a
//! physical-walk invariant checker, fabricated blocks for list mechanics
//! tests, and a stack-buffer `fmt::Write` sink for the walkers.

use core::fmt;

use crate::block::{self, BlockHeader, BlockState, MIN_PAYLOAD_SIZE, PAYLOAD_ALIGN};
use crate::heap::HEAP;

/// Upper bound on blocks visited by the invariant walk; a walk that exceeds
/// it has chased a corrupt size field.
const WALK_LIMIT: usize = 1_000_000;

/// Heap origin (the recorded segment break). Null before startup.
pub fn heap_origin() -> *mut u8 {
    HEAP.lock().heap_origin
}

/// Current length of the free list.
pub fn free_list_len() -> usize {
    HEAP.lock().free_list.len()
}

/// Head of the free list. Null when the list is empty.
pub fn free_head() -> *mut BlockHeader {
    HEAP.lock().free_list.head()
}

/// Payload size of the only free block, if the list has exactly one entry.
/// With every allocation returned, a healthy heap coalesces back to this
/// state, so suites use it both as a precondition and as a leak check.
pub fn sole_free_block_size() -> Option<usize> {
    let heap = HEAP.lock();
    let head = heap.free_list.head();
    if head.is_null() {
        return None;
    }
    if !unsafe { block::next_free(head) }.is_null() {
        return None;
    }
    Some(unsafe { (*head).size() })
}

/// Re-verify the allocator's structural invariants by walking every
/// physical block from the heap origin to the break:
///
/// - the heap is bracketed by fenceposts,
/// - every boundary tag names the left neighbor's payload size,
/// - block sizes are aligned and at least the minimum payload,
/// - no two physically adjacent blocks are both free,
/// - the free list contains exactly the free-state blocks.
pub fn check_heap_invariants() -> Result<(), &'static str> {
    let heap = HEAP.lock();
    if !heap.initialized {
        return Err("heap not initialized");
    }

    let end = heap.expected_break as usize;
    let mut cursor = heap.heap_origin as *mut BlockHeader;
    let mut prev_size = 0usize;
    let mut prev_state: Option<BlockState> = None;
    let mut free_seen = 0usize;
    let mut alloc_seen = 0usize;
    let mut visited = 0usize;

    unsafe {
        while (cursor as usize) < end {
            visited += 1;
            if visited > WALK_LIMIT {
                return Err("walk did not terminate");
            }

            let state = (*cursor).state();
            let size = (*cursor).size();

            match prev_state {
                None => {
                    if state != BlockState::Fencepost {
                        return Err("heap does not start with a fencepost");
                    }
                }
                Some(_) => {
                    if (*cursor).prev_payload_size() != prev_size {
                        return Err("boundary tag does not match left neighbor");
                    }
                }
            }

            match state {
                BlockState::Fencepost => {
                    if size != 0 {
                        return Err("fencepost with a payload");
                    }
                }
                BlockState::Free | BlockState::Allocated => {
                    if size % PAYLOAD_ALIGN != 0 || size < MIN_PAYLOAD_SIZE {
                        return Err("block size unaligned or below minimum");
                    }
                }
            }

            if state == BlockState::Free {
                if prev_state == Some(BlockState::Free) {
                    return Err("adjacent free blocks survived coalescing");
                }
                if !heap.free_list.contains(cursor) {
                    return Err("free block missing from the free list");
                }
                free_seen += 1;
            }
            if state == BlockState::Allocated {
                alloc_seen += 1;
            }

            prev_state = Some(state);
            prev_size = size;
            cursor = block::right_neighbor(cursor);
        }

        if cursor as usize != end {
            return Err("walk overran the break");
        }
    }

    if prev_state != Some(BlockState::Fencepost) {
        return Err("heap does not end with a fencepost");
    }
    if heap.free_list.len() != free_seen {
        return Err("free list carries blocks that are not free");
    }
    if heap.stats.free_blocks as usize != free_seen {
        return Err("free-block ledger out of sync with the walk");
    }
    if heap.stats.allocated_blocks as usize != alloc_seen {
        return Err("allocated-block ledger out of sync with the walk");
    }
    Ok(())
}

/// A standalone block fabricated on the stack, for exercising the header
/// codec and the list mechanics without touching the global heap. Holds
/// room for the header plus a payload of up to 112 bytes.
#[repr(C, align(8))]
pub struct FakeBlock {
    storage: [usize; 16],
}

impl FakeBlock {
    pub fn new(size: usize, state: BlockState) -> Self {
        let mut fake = Self { storage: [0; 16] };
        let header = fake.storage.as_mut_ptr() as *mut BlockHeader;
        unsafe {
            (*header).set_prev_payload_size(0);
            (*header).set_size_and_state(size, state);
        }
        fake
    }

    /// Header pointer into the stack storage. Valid until the `FakeBlock`
    /// moves or drops.
    pub fn header(&mut self) -> *mut BlockHeader {
        self.storage.as_mut_ptr() as *mut BlockHeader
    }
}

/// Fixed-capacity `fmt::Write` sink for capturing walker output in `no_std`
/// tests. Overflow is silently truncated — the tests only inspect prefixes.
pub struct BufWriter<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> BufWriter<N> {
    pub fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl<const N: usize> Default for BufWriter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Write for BufWriter<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = N - self.len;
        let take = s.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}
