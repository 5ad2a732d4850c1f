//! The top-level handle callers construct and hold ("Registry"), grounded
//! on `sync_array_t`'s owning struct and the `sync_array_get`/
//! `sync_array_init`/`sync_array_close` lifecycle in
//! storage/innobase/sync/sync0arr.cc:936-1000. Owns one or more [`Shard`]s
//! and the process-wide flags (`bulk_validation_running`, `print_monitor`)
//! the original keeps as file-scope globals (`btr_validate_index_running`,
//! the lock-timeout monitor's print flag).
use crate::config::{Config, RegistryError};
use crate::latch::Latch;
use crate::mode::{Mode, Site};
use crate::monitor::{self, LockTimeoutHook, LoggingTimeoutHook, LongWaiter};
use crate::introspect::{self, CellSnapshot};
use crate::shard::Shard;
use crate::sync::{AtomicBool, AtomicUsize, Instant};
use crate::wait::{self, NullObserver, WaitObserver, WaitOutcome};
use std::sync::atomic::Ordering;

/// The result of one [`Registry::print_long_waits`] scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongWaitReport {
    /// Whether any waiter exceeded `fatal_threshold`; the caller typically
    /// terminates the process when this is `true`.
    pub fatal: bool,
    /// The single longest-waiting cell across every shard, if any crossed
    /// `soft_threshold`.
    pub longest: Option<LongWaiter>,
}

/// Owns a fixed set of shards and the hooks wired into the wait protocol
/// and the monitor. Not a global singleton: callers decide whether to put
/// one behind a `static` or thread it through explicitly.
pub struct Registry<L: Latch> {
    shards: Vec<Shard<L>>,
    config: Config,
    next_shard: AtomicUsize,
    bulk_validation_running: AtomicBool,
    print_monitor: AtomicBool,
    observer: Box<dyn WaitObserver>,
    timeout_hook: Box<dyn LockTimeoutHook>,
}

impl<L: Latch> Registry<L> {
    /// Builds a registry with the default (no-op) wait observer and a
    /// logging timeout hook.
    pub fn new(config: Config) -> Self {
        Self::with_hooks(config, Box::new(NullObserver), Box::new(LoggingTimeoutHook))
    }

    /// Builds a registry with caller-supplied hooks, e.g. to wire the wait
    /// observer into a thread pool's own accounting.
    pub fn with_hooks(
        config: Config,
        observer: Box<dyn WaitObserver>,
        timeout_hook: Box<dyn LockTimeoutHook>,
    ) -> Self {
        let shards = (0..config.shard_count.get())
            .map(|_| Shard::new(config.max_threads.get()))
            .collect();
        Self {
            shards,
            config,
            next_shard: AtomicUsize::new(0),
            bulk_validation_running: AtomicBool::new(false),
            print_monitor: AtomicBool::new(false),
            observer,
            timeout_hook,
        }
    }

    /// The configuration this registry was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Picks a shard the way the original's `get_rnd_value` picks one:
    /// cheaply and approximately uniformly, not cryptographically (a
    /// wrapping counter, same cost as the original's linear congruential
    /// generator without pulling in a `rand` dependency for something that
    /// only needs to spread contention).
    fn pick_shard(&self) -> usize {
        self.next_shard.fetch_add(1, Ordering::Relaxed) % self.shards.len()
    }

    /// Registers `latch`/`mode`/`site`, parks until `predicate` holds, and
    /// frees the cell before returning. Tries every shard once, starting
    /// from a pseudo-randomly chosen one, before reporting
    /// [`RegistryError::CapacityExhausted`].
    pub fn wait_for<F>(
        &self,
        latch: &L,
        mode: Mode,
        site: Site,
        mut predicate: F,
    ) -> Result<WaitOutcome, RegistryError>
    where
        F: FnMut() -> bool,
    {
        let start = self.pick_shard();
        for offset in 0..self.shards.len() {
            let shard = &self.shards[(start + offset) % self.shards.len()];
            match wait::wait_event(shard, latch, mode, site, self.observer.as_ref(), &mut predicate)
            {
                Ok(outcome) => return Ok(outcome),
                Err(RegistryError::CapacityExhausted { .. }) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(RegistryError::CapacityExhausted {
            shard_count: self.shards.len(),
            capacity: self.config.max_threads.get(),
        })
    }

    /// Scans every shard for long waits. Returns whether any waiter
    /// exceeded `fatal_threshold` and, if any wait crossed `soft_threshold`,
    /// the single longest one found — this is the Rust shape of
    /// `print_long_waits(out: &longest_waiter_thread, out: &
    /// longest_waited_latch) -> fatal: bool`, returned as one value instead
    /// of two out-parameters.
    ///
    /// If any shard's first pass notices a wait past `soft_threshold`, this
    /// runs the full escalation: (a) a second pass over every shard
    /// printing each over-threshold cell again, (b) sets the print-monitor
    /// flag, (c) synchronously invokes the timeout hook for the single
    /// longest fatal waiter (if any), then (d) holds the flag up for
    /// `Config::print_monitor_window` before clearing it.
    pub fn print_long_waits(&self) -> LongWaitReport {
        let mut noticed = false;
        let mut fatal = false;
        let mut longest: Option<LongWaiter> = None;

        for shard in &self.shards {
            let scan = monitor::scan_shard(
                shard,
                self.config.soft_threshold,
                self.config.fatal_threshold,
                &self.bulk_validation_running,
            );
            noticed |= scan.noticed;
            fatal |= scan.fatal;
            if let Some(w) = scan.longest {
                if longest.map_or(true, |l: LongWaiter| w.waited > l.waited) {
                    longest = Some(w);
                }
            }
        }

        if noticed {
            for shard in &self.shards {
                monitor::print_all_long_waits(shard, self.config.soft_threshold);
            }
            self.print_monitor.store(true, Ordering::Release);
            if let Some(w) = longest.filter(|w| w.fatal) {
                self.timeout_hook.on_fatal_wait(w.thread, w.site, w.waited);
            }
            std::thread::sleep(self.config.print_monitor_window);
            self.print_monitor.store(false, Ordering::Release);
        }

        LongWaitReport { fatal, longest }
    }

    /// The legacy quirk, kept for API parity: the capacity of shard 0,
    /// regardless of how many shards exist or how full they are.
    pub fn n_items(&self) -> usize {
        introspect::n_items(&self.shards[0])
    }

    /// Indexed random access into the same shard `n_items` reports on:
    /// `i < n_items()`. Returns a snapshot if slot `i` is reserved and
    /// waiting, `None` otherwise. Not atomic with `n_items`/`get_item` or
    /// across repeated calls — the caller must tolerate slots changing
    /// between calls, same as `sync_arr_get_nth_cell` feeding
    /// `sync_arr_get_item` (sync0arr.cc:1021-1049).
    pub fn get_item(&self, i: usize) -> Option<CellSnapshot> {
        introspect::get_item(&self.shards[0], i, Instant::now())
    }

    /// The faithful alternative: how many cells are reserved right now,
    /// summed across every shard.
    pub fn reserved_count(&self) -> usize {
        self.shards.iter().map(introspect::reserved_count).sum()
    }

    /// Calls `f` with a snapshot of every currently-waiting cell, across
    /// all shards.
    pub fn for_each_waiter(&self, mut f: impl FnMut(CellSnapshot)) {
        let now = Instant::now();
        for shard in &self.shards {
            introspect::for_each_waiter(shard, now, &mut f);
        }
    }

    /// Sets the "bulk validation running" flag, which makes
    /// [`Registry::print_long_waits`] skip its scan entirely — mirrors
    /// `btr_validate_index_running` suppressing the monitor during an
    /// index consistency check.
    pub fn set_bulk_validation_running(&self, running: bool) {
        self.bulk_validation_running.store(running, Ordering::Release);
    }

    /// Sets the "print monitor" flag an external monitor thread toggles to
    /// request one extra diagnostic pass, mirroring
    /// `srv_print_innodb_monitor`.
    pub fn set_print_monitor(&self, enabled: bool) {
        self.print_monitor.store(enabled, Ordering::Release);
    }

    /// Whether the print-monitor flag is currently set.
    pub fn print_monitor_requested(&self) -> bool {
        self.print_monitor.load(Ordering::Acquire)
    }

    /// The number of shards this registry owns.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The lifecycle precondition: every shard must be idle before the
    /// registry goes away. Mirrors `sync_array_close`'s assumption that no
    /// thread is still parked on any of its cells; a storage engine calls
    /// this during its own ordered shutdown, after every latch has been
    /// released.
    pub fn close(&self) -> Result<(), RegistryError> {
        let reserved = self.reserved_count();
        if reserved != 0 {
            return Err(RegistryError::CloseWhileReserved { reserved });
        }
        Ok(())
    }
}
