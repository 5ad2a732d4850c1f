//! std/loom swap for the primitives the registry and the reference latch
//! build on. Mirrors the teacher crate's own `real/loom.rs` split: under
//! `--cfg loom` everything comes from the `loom` crate so the model checker
//! can interleave it, otherwise everything is the real `std` primitive.
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(loom)] {
        pub(crate) use loom::sync::{Condvar, Mutex, MutexGuard};
        pub(crate) use loom::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, AtomicUsize, AtomicBool};
        pub(crate) use loom::thread;
    } else {
        pub(crate) use std::sync::{Condvar, Mutex, MutexGuard};
        pub(crate) use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, AtomicUsize, AtomicBool};
        pub(crate) use std::thread;
    }
}

/// A monotonic instant. Not swapped for loom: loom's model checker doesn't
/// advance wall time, and none of our loom tests depend on elapsed duration.
pub(crate) use std::time::{Duration, Instant};
