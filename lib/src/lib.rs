#![no_std]

pub mod alignment;
pub mod spinlock;
pub mod testing;
pub mod tlog;

#[doc(hidden)]
pub use paste;

pub use alignment::{align_down_u64, align_down_usize, align_up_u64, align_up_usize};
pub use alignment::{is_aligned_u64, is_aligned_usize};
pub use spinlock::{TickMutex, TickMutexGuard};
pub use tlog::{
    LogBackend, LogLevel, tlog_get_level, tlog_is_enabled, tlog_register_backend, tlog_set_level,
};
