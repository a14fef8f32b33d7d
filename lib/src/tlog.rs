//! Allocator logging subsystem.
//!
//! All diagnostic output funnels through a single **backend** function
//! pointer. Until a backend is registered, output is discarded — the library
//! is `no_std` and makes no assumption about where diagnostics can go. A
//! host embedding the allocator (the test runner, for example) registers a
//! backend during startup and receives every subsequent log line.
//!
//! # Backend contract
//!
//! The backend receives the pre-formatted arguments for a **single log line**
//! and is responsible for:
//!
//! 1. Writing the formatted text **atomically** (no interleaving from other
//!    threads).
//! 2. Appending a trailing newline after the text.
//!
//! # Registration
//!
//! ```ignore
//! // In your embedding's init:
//! tagheap_lib::tlog::tlog_register_backend(my_backend_fn);
//! ```

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// Log levels
// ---------------------------------------------------------------------------

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

#[inline(always)]
fn is_enabled(level: LogLevel) -> bool {
    level as u8 <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Backend dispatch
// ---------------------------------------------------------------------------

/// Signature of a log backend.
///
/// The backend must write the formatted text **and** a trailing newline,
/// all under a single lock acquisition (if applicable) so that log lines
/// from different threads do not interleave.
pub type LogBackend = fn(fmt::Arguments<'_>);

/// Stored as a raw pointer; `null` means "no backend yet, discard output".
static BACKEND: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Dispatch a log line through the active backend.
///
/// If no backend has been registered yet the line is dropped.
#[inline]
fn dispatch(args: fmt::Arguments<'_>) {
    let ptr = BACKEND.load(Ordering::Acquire);
    if ptr.is_null() {
        return;
    }
    // SAFETY: `tlog_register_backend` only stores valid `LogBackend` fn
    // pointers, which are the same size as `*mut ()` on all supported
    // targets.
    let backend: LogBackend = unsafe { core::mem::transmute(ptr) };
    backend(args);
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Register a backend that receives all subsequent log lines.
///
/// Typically called once by the embedding during its initialisation.
pub fn tlog_register_backend(backend: LogBackend) {
    BACKEND.store(backend as *mut (), Ordering::Release);
}

pub fn tlog_set_level(level: LogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn tlog_get_level() -> LogLevel {
    LogLevel::from_raw(CURRENT_LEVEL.load(Ordering::Relaxed))
}

pub fn tlog_is_enabled(level: LogLevel) -> bool {
    is_enabled(level)
}

/// Emit a formatted log line at the given level.
///
/// The backend appends a trailing newline — callers should **not** include
/// one in their format string.
pub fn log_args(level: LogLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    dispatch(args);
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

#[macro_export]
macro_rules! tlog {
    ($level:expr, $($arg:tt)*) => {{
        $crate::tlog::log_args($level, ::core::format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::tlog::log_args($crate::tlog::LogLevel::Error, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::tlog::log_args($crate::tlog::LogLevel::Warn, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::tlog::log_args($crate::tlog::LogLevel::Info, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::tlog::log_args($crate::tlog::LogLevel::Debug, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::tlog::log_args($crate::tlog::LogLevel::Trace, ::core::format_args!($($arg)*))
    };
}
