//! Error model for the heap.
//!
//! Public entry points report failure by returning null; the *kind* of the
//! most recent failure is parked in a process-wide cell so callers that care
//! can distinguish argument errors from exhaustion, in the manner of a
//! portable errno.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

/// Failure kinds surfaced by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// The segment could not be extended far enough to satisfy the request,
    /// or the extension returned a misaligned base.
    NoMemory,
    /// The segment break was moved by somebody else; the heap refuses to
    /// grow until the movement is reverted.
    SegmentMoved,
    /// One-time startup did not complete.
    NotInitialized,
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMemory => write!(f, "out of memory extending the data segment"),
            Self::SegmentMoved => write!(f, "data segment break moved externally"),
            Self::NotInitialized => write!(f, "heap startup did not complete"),
        }
    }
}

/// Convenience result type for internal fallible paths.
pub type HeapResult<T = ()> = Result<T, HeapError>;

const ERR_NONE: u8 = 0;
const ERR_NO_MEMORY: u8 = 1;
const ERR_SEGMENT_MOVED: u8 = 2;
const ERR_NOT_INITIALIZED: u8 = 3;

static LAST_ERROR: AtomicU8 = AtomicU8::new(ERR_NONE);

pub(crate) fn set_last_error(err: HeapError) {
    let raw = match err {
        HeapError::NoMemory => ERR_NO_MEMORY,
        HeapError::SegmentMoved => ERR_SEGMENT_MOVED,
        HeapError::NotInitialized => ERR_NOT_INITIALIZED,
    };
    LAST_ERROR.store(raw, Ordering::Relaxed);
}

/// Kind of the most recent failure, if any failure happened since the last
/// [`heap_clear_error`].
pub fn heap_last_error() -> Option<HeapError> {
    match LAST_ERROR.load(Ordering::Relaxed) {
        ERR_NO_MEMORY => Some(HeapError::NoMemory),
        ERR_SEGMENT_MOVED => Some(HeapError::SegmentMoved),
        ERR_NOT_INITIALIZED => Some(HeapError::NotInitialized),
        _ => None,
    }
}

pub fn heap_clear_error() {
    LAST_ERROR.store(ERR_NONE, Ordering::Relaxed);
}
