//! Exhaustion and failure-path tests. These are registered last: the final
//! test deliberately drives the segment to exhaustion, which is permanent
//! for the process (the heap stays usable, but it can no longer grow).

use core::ptr;

use tagheap_lib::testing::TestResult;
use tagheap_lib::{assert_eq_test, assert_not_null, assert_ok, assert_test, define_test_suite, fail, pass};

use crate::arena::CHUNK_SIZE;
use crate::error::{HeapError, heap_clear_error, heap_last_error};
use crate::heap::{tfree, tmalloc};
use crate::segment::segment_extend;
use crate::test_fixtures::{check_heap_invariants, sole_free_block_size};

/// Argument errors return null without setting a failure kind.
pub fn test_argument_errors_set_no_code() -> TestResult {
    heap_clear_error();
    assert_test!(tmalloc(0).is_null());
    assert_eq_test!(heap_last_error(), None);
    pass!()
}

/// A foreign move of the segment break is detected at the next growth and
/// allocations fail until the move is reverted.
pub fn test_segment_move_detection() -> TestResult {
    let initial = match sole_free_block_size() {
        Some(size) => size,
        None => return fail!("heap not fully coalesced at test start"),
    };

    let foreign = segment_extend(CHUNK_SIZE as isize);
    assert_not_null!(foreign, "no segment room left to simulate a foreign move");
    heap_clear_error();

    // Larger than the sole free block, so the heap must grow — and notice.
    let p = tmalloc(initial + 8);
    assert_test!(p.is_null(), "growth must fail while the break is moved");
    assert_eq_test!(heap_last_error(), Some(HeapError::SegmentMoved));
    assert_ok!(check_heap_invariants());

    // Revert the foreign move; the same request must now succeed.
    segment_extend(-(CHUNK_SIZE as isize));
    heap_clear_error();
    let q = tmalloc(initial + 8);
    assert_not_null!(q, "growth must succeed after the break is restored");
    assert_eq_test!(heap_last_error(), None);

    tfree(q);
    assert_ok!(check_heap_invariants());
    pass!()
}

/// An impossible request fails with the out-of-memory code and leaves the
/// heap fully usable.
pub fn test_oom_leaves_heap_usable() -> TestResult {
    heap_clear_error();
    let huge = tmalloc(usize::MAX / 2);
    assert_test!(huge.is_null());
    assert_eq_test!(heap_last_error(), Some(HeapError::NoMemory));

    heap_clear_error();
    let p = tmalloc(16);
    assert_not_null!(p, "heap unusable after a failed huge request");
    tfree(p);
    assert_ok!(check_heap_invariants());
    pass!()
}

/// Allocate until the segment is exhausted, verify graceful failure, then
/// return everything and verify the heap coalesces back to one block.
pub fn test_alloc_until_oom() -> TestResult {
    let mut held: [*mut u8; 128] = [ptr::null_mut(); 128];
    let mut count = 0usize;

    heap_clear_error();
    while count < held.len() {
        let p = tmalloc(60 * 1024);
        if p.is_null() {
            break;
        }
        held[count] = p;
        count += 1;
    }

    if count == 0 {
        return fail!("could not allocate anything before exhaustion");
    }
    if count == held.len() {
        for p in held.iter().take(count) {
            tfree(*p);
        }
        return fail!("segment never reported exhaustion");
    }
    assert_eq_test!(heap_last_error(), Some(HeapError::NoMemory));

    for p in held.iter().take(count) {
        tfree(*p);
    }
    assert_ok!(check_heap_invariants());
    assert_test!(
        sole_free_block_size().is_some(),
        "heap did not coalesce back after exhaustion"
    );
    pass!()
}

define_test_suite!(
    oom,
    [
        test_argument_errors_set_no_code,
        test_segment_move_detection,
        test_oom_leaves_heap_usable,
        test_alloc_until_oom,
    ]
);
