//! The long-wait monitor, grounded on
//! `sync_array_print_long_waits_low`/`sync_array_print_long_waits` in
//! storage/innobase/sync/sync0arr.cc:755-890.
use crate::mode::Site;
use crate::shard::Shard;
use crate::sync::{AtomicBool, Duration, Instant};
use crate::Latch;
use log::{error, warn};
use std::thread::ThreadId;

/// Hooked into the monitor's fatal path, analogous to the original calling
/// `lock_wait_timeout_task`'s caller (`srv_error_monitor_thread`) back into
/// the lock system so it can print extra diagnostics or abort the server.
/// Default behavior (see [`LoggingTimeoutHook`]) just logs.
pub trait LockTimeoutHook: Send + Sync {
    /// Called synchronously, once per escalated scan, for the longest
    /// waiter found when any shard's scan flagged `fatal` — mirrors the
    /// escalation step that calls the lock-timeout task synchronously.
    fn on_fatal_wait(&self, thread: ThreadId, site: Site, waited: Duration);
}

/// The default hook: logs at `error` level and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTimeoutHook;

impl LockTimeoutHook for LoggingTimeoutHook {
    fn on_fatal_wait(&self, thread: ThreadId, site: Site, waited: Duration) {
        error!(
            "long semaphore wait: thread {thread:?} waiting at {site} for {waited:?}, exceeds fatal threshold"
        );
    }
}

/// A thread currently waiting at least `soft_threshold`.
#[derive(Debug, Clone, Copy)]
pub struct LongWaiter {
    /// The waiting thread.
    pub thread: ThreadId,
    /// Where the wait was requested from.
    pub site: Site,
    /// How long the thread has been waiting, as of the scan.
    pub waited: Duration,
    /// Whether this wait exceeded `fatal_threshold`.
    pub fatal: bool,
}

/// Result of scanning a single shard once, mirroring the per-shard
/// bookkeeping `sync_array_print_long_waits_low` keeps locally before its
/// caller decides whether to escalate (sync0arr.cc:793-849).
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ShardScan {
    /// At least one cell exceeded `soft_threshold` — triggers the
    /// registry-level escalation pass.
    pub(crate) noticed: bool,
    /// At least one cell exceeded `fatal_threshold`.
    pub(crate) fatal: bool,
    /// The single longest-waiting cell seen in this shard, if any crossed
    /// `soft_threshold`.
    pub(crate) longest: Option<LongWaiter>,
}

/// Scans every cell of `shard`, logging (via `log::warn!`) any wait past
/// `soft_threshold`. Mirrors the original tracking `longest_diff`/
/// `longest_cell` across the scan (sync0arr.cc's
/// `sync_array_print_long_waits_low`, which keeps the longest wait across
/// the whole loop).
///
/// `bulk_validation_running`, if set, short-circuits the scan entirely —
/// mirrors the original skipping the monitor while
/// `btr_validate_index_running` holds, since a validation run pins
/// latches for long, expected stretches that would otherwise spam fatal
/// warnings (sync0arr.cc:802-806).
pub(crate) fn scan_shard<L: Latch>(
    shard: &Shard<L>,
    soft_threshold: Duration,
    fatal_threshold: Duration,
    bulk_validation_running: &AtomicBool,
) -> ShardScan {
    if bulk_validation_running.load(std::sync::atomic::Ordering::Acquire) {
        return ShardScan::default();
    }

    let now = Instant::now();
    let guard = shard.lock();
    let mut scan = ShardScan::default();

    for index in 0..guard.len() {
        let cell = guard.cell(index);
        if !cell.waiting {
            continue;
        }
        let (Some(reserved_at), Some(thread)) = (cell.reserved_at, cell.thread_id) else {
            continue;
        };
        let waited = now.saturating_duration_since(reserved_at);
        if waited < soft_threshold {
            continue;
        }
        let fatal = waited >= fatal_threshold;
        scan.noticed = true;
        scan.fatal |= fatal;

        warn!(
            "long semaphore wait: thread {thread:?} waiting at {} for {waited:?}",
            cell.site
        );

        if scan.longest.map_or(true, |l| waited > l.waited) {
            scan.longest = Some(LongWaiter {
                thread,
                site: cell.site,
                waited,
                fatal,
            });
        }
    }

    scan
}

/// Re-scans all reserved waiting cells to print each one, once any shard
/// has already flagged `noticed` on the first pass. Reuses the same
/// per-cell log line; a second pass rather than
/// reusing the first scan's output because state may have moved on by the
/// time escalation runs (sync0arr.cc:849-887 re-walks the array a second
/// time for the same reason).
pub(crate) fn print_all_long_waits<L: Latch>(shard: &Shard<L>, soft_threshold: Duration) {
    let now = Instant::now();
    let guard = shard.lock();
    for index in 0..guard.len() {
        let cell = guard.cell(index);
        if !cell.waiting {
            continue;
        }
        let (Some(reserved_at), Some(thread)) = (cell.reserved_at, cell.thread_id) else {
            continue;
        };
        let waited = now.saturating_duration_since(reserved_at);
        if waited < soft_threshold {
            continue;
        }
        warn!(
            "long semaphore wait (monitor pass): thread {thread:?} waiting at {} for {waited:?}",
            cell.site
        );
    }
}
