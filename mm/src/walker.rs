//! Debug walkers: physical heap dump, free-list dump, and a log-based
//! report. All are read-only with respect to heap state; each takes the
//! heap lock once so it renders a consistent snapshot.

use core::fmt::{self, Write};

use tagheap_lib::log_info;

use crate::block::{self, BlockHeader, BlockState};
use crate::heap::HEAP;

/// Walk physical blocks from `start` to `end`, writing one line per block:
/// offset from the heap origin, state, payload size and boundary tag. Free
/// blocks additionally report their list neighbors' offsets.
///
/// Null `start` defaults to the heap origin, null `end` to the current
/// break. A caller-supplied `start` must point at a block header.
pub fn dump_heap(out: &mut dyn Write, start: *const u8, end: *const u8) -> fmt::Result {
    let heap = HEAP.lock();
    if !heap.initialized {
        return writeln!(out, "heap: not initialized");
    }

    let origin = heap.heap_origin as usize;
    let start = if start.is_null() {
        heap.heap_origin as *const u8
    } else {
        start
    };
    let end = if end.is_null() {
        heap.expected_break as *const u8
    } else {
        end
    };

    writeln!(out, "heap dump [{:p}..{:p})", start, end)?;
    let mut cursor = start as *mut BlockHeader;
    while (cursor as usize) < end as usize {
        unsafe {
            let offset = (cursor as usize).wrapping_sub(origin);
            let state = (*cursor).state();
            write!(
                out,
                "  +{:<8} {:<10} size={:<8} prev_size={:<8}",
                offset,
                state.as_str(),
                (*cursor).size(),
                (*cursor).prev_payload_size()
            )?;
            if state == BlockState::Free {
                write_link_offset(out, " next=", origin, block::next_free(cursor))?;
                write_link_offset(out, " prev=", origin, block::prev_free(cursor))?;
            }
            writeln!(out)?;
            cursor = block::right_neighbor(cursor);
        }
    }
    Ok(())
}

fn write_link_offset(
    out: &mut dyn Write,
    label: &str,
    origin: usize,
    link: *mut BlockHeader,
) -> fmt::Result {
    if link.is_null() {
        write!(out, "{}-", label)
    } else {
        write!(out, "{}+{}", label, (link as usize).wrapping_sub(origin))
    }
}

/// Walk the free list head-to-tail, one line per entry.
pub fn dump_free_list(out: &mut dyn Write) -> fmt::Result {
    let heap = HEAP.lock();
    if !heap.initialized {
        return writeln!(out, "free list: heap not initialized");
    }

    let origin = heap.heap_origin as usize;
    writeln!(out, "free list ({} entries)", heap.free_list.len())?;
    let mut cursor = heap.free_list.head();
    let mut index = 0usize;
    while !cursor.is_null() {
        unsafe {
            writeln!(
                out,
                "  [{}] +{} size={}",
                index,
                (cursor as usize).wrapping_sub(origin),
                (*cursor).size()
            )?;
            cursor = block::next_free(cursor);
        }
        index += 1;
    }
    Ok(())
}

/// Emit the statistics ledger and the free list through the log macros at
/// info level.
pub fn log_heap_report() {
    let heap = HEAP.lock();

    log_info!("=== heap report ===");
    if !heap.initialized {
        log_info!("heap: not initialized");
        return;
    }

    let stats = &heap.stats;
    log_info!(
        "segment: {} bytes in {} chunks, origin {:p}",
        stats.total_size,
        stats.chunk_count,
        heap.heap_origin
    );
    log_info!(
        "allocated: {} bytes in {} blocks",
        stats.allocated_size,
        stats.allocated_blocks
    );
    log_info!(
        "free blocks: {} (list entries: {})",
        stats.free_blocks,
        heap.free_list.len()
    );
    log_info!(
        "allocations: {}  frees: {}",
        stats.allocation_count,
        stats.free_count
    );

    let origin = heap.heap_origin as usize;
    let mut cursor = heap.free_list.head();
    while !cursor.is_null() {
        unsafe {
            log_info!(
                "  free +{} size={}",
                (cursor as usize).wrapping_sub(origin),
                (*cursor).size()
            );
            cursor = block::next_free(cursor);
        }
    }
}
