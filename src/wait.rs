//! The wait protocol, grounded on `sync_array_reserve_cell` +
//! `sync_array_wait_event` in storage/innobase/sync/sync0arr.cc:277-450.
//! Ties together a `Shard`, a `Latch`, and (in debug builds) the deadlock
//! detector into the single operation callers actually use: "wait for this
//! latch".
use crate::config::RegistryError;
#[cfg(debug_assertions)]
use crate::deadlock;
use crate::latch::Latch;
use crate::mode::{Mode, Site};
use crate::shard::Shard;
use crate::sync::Instant;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;
use std::thread::ThreadId;

/// Observes the wait protocol's park step, analogous to InnoDB's
/// `tpool_wait_begin`/`tpool_wait_end` hooks (sync0arr.cc:300-ish call
/// sites) that let a thread pool account for threads blocked in the
/// kernel. The registry calls these around the actual park, not around
/// cell bookkeeping.
pub trait WaitObserver: Send + Sync {
    /// Called just before parking on the latch's condvar.
    fn on_wait_begin(&self, thread: ThreadId, latch_created_at: Site, mode: Mode) {
        let _ = (thread, latch_created_at, mode);
    }

    /// Called just after waking, whether by notification or timeout, with
    /// the time actually spent parked.
    fn on_wait_end(&self, thread: ThreadId, elapsed: std::time::Duration) {
        let _ = (thread, elapsed);
    }
}

/// The default observer: does nothing. Used when a caller has no thread
/// pool or metrics system to wire in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl WaitObserver for NullObserver {}

/// How a call to [`wait_event`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The predicate was satisfied without needing to park at all.
    NotNeeded,
    /// Woken by a notification (the normal case).
    Woken,
}

/// Registers `latch`/`mode`/`site` in `shard`, parks the calling thread
/// until `predicate` reports the wait is over, and frees the cell before
/// returning. `predicate` is evaluated against the latch's own state,
/// mirroring how the original re-checks `lock_word` after being woken
/// rather than trusting the wakeup alone (sync0arr.cc's "since there is no
/// semaphore protecting us" comment at the top of `sync_array_wait_event`).
///
/// Runs the (debug-only) deadlock search after registering but before
/// parking, with the shard mutex still held — the same ordering as
/// `sync_array_reserve_cell` calling `sync_array_detect_deadlock` while
/// `sync_arr_cell_get_mutex` is held (sync0arr.cc:300-331).
pub(crate) fn wait_event<L, F>(
    shard: &Shard<L>,
    latch: &L,
    mode: Mode,
    site: Site,
    observer: &dyn WaitObserver,
    mut predicate: F,
) -> Result<WaitOutcome, RegistryError>
where
    L: Latch,
    F: FnMut() -> bool,
{
    if predicate() {
        return Ok(WaitOutcome::NotNeeded);
    }

    let target = NonNull::from(latch);
    let handle = match shard.reserve_cell(target, mode, site) {
        Some(handle) => handle,
        None => {
            return Err(RegistryError::CapacityExhausted {
                shard_count: 1,
                capacity: shard.capacity(),
            })
        }
    };

    #[cfg(debug_assertions)]
    {
        let guard = shard.begin_wait(&handle);
        let thread = std::thread::current().id();
        let result = deadlock::detect(&guard, thread, mode, latch);
        drop(guard);
        match result {
            Ok(false) => {}
            Ok(true) => {
                shard.free_cell(handle);
                panic!(
                    "deadlock detected: thread {thread:?} requesting {mode} on latch \
                     created at {} would cycle back to itself",
                    latch.created_at()
                );
            }
            Err(err) => {
                shard.free_cell(handle);
                return Err(err);
            }
        }
    }
    #[cfg(not(debug_assertions))]
    {
        let guard = shard.begin_wait(&handle);
        drop(guard);
    }

    let thread = std::thread::current().id();
    observer.on_wait_begin(thread, latch.created_at(), mode);
    let started = Instant::now();

    let gate = latch.wait_gate();
    let cond = if matches!(mode, Mode::XWait) {
        &gate.wait_ex_cond
    } else {
        &gate.wait_cond
    };

    let mut guard = gate.wait_mutex.lock().unwrap();
    while !predicate() {
        // For everything but X_WAIT, re-announce `waiters` and recheck
        // `lock_word` under the wait-mutex on every iteration, not just
        // once before the first park: a releaser could otherwise clear
        // `waiters` and skip the notify between our snapshot and the
        // actual `wait` call. If the lock word has gone to zero, signal
        // `wait_ex_cond` too — the rendezvous an X_WAIT upgrader needs to
        // notice readers have drained.
        if !matches!(mode, Mode::XWait) {
            latch.waiters().store(1, Ordering::Release);
            if latch.lock_word().load(Ordering::Acquire) == 0 {
                gate.wait_ex_cond.notify_all();
            }
        }
        guard = cond.wait(guard).unwrap();
    }
    drop(guard);

    observer.on_wait_end(thread, started.elapsed());
    shard.free_cell(handle);
    Ok(WaitOutcome::Woken)
}
