//! A fixed-size cell array guarded by one mutex ("Shard"). Grounded on
//! `sync_array_t` plus `sync_array_reserve_cell`/
//! `sync_array_free_cell` in storage/innobase/sync/sync0arr.cc, and on the
//! teacher's `Bucket`/`lock_bucket` shape (src/real/parking_lot.rs) for the
//! Rust idiom of a fixed `Box<[UnsafeCell<_>]>` behind a `Mutex`.
use crate::cell::Cell;
use crate::latch::Latch;
use crate::mode::{Mode, Site};
use crate::sync::{thread, Instant, Mutex, MutexGuard};
use std::cell::UnsafeCell;
use std::ptr::NonNull;

/// Mutable bookkeeping for a shard, guarded by [`Shard::state`].
pub(crate) struct ShardState {
    pub(crate) n_reserved: usize,
    pub(crate) next_unused: usize,
    pub(crate) first_free: Option<usize>,
    pub(crate) res_count: u64,
}

pub(crate) struct Shard<L: Latch> {
    // Fixed-size and never reallocated after construction, so indices (and
    // the addresses `UnsafeCell::get()` returns) stay stable for the
    // shard's whole lifetime.
    cells: Box<[UnsafeCell<Cell<L>>]>,
    state: Mutex<ShardState>,
}

// SAFETY: every access to `cells` either goes through `state`'s mutex
// (reserve_cell/free_cell/lock) or is the single-writer pattern documented
// on `reserve_cell` for `thread_id`/`reserved_at`.
unsafe impl<L: Latch> Sync for Shard<L> {}

/// An opaque handle to a reserved cell. Not `Copy`/`Clone`: exactly one of
/// `free_cell` or the wait protocol's internal consumption owns it at a
/// time.
pub(crate) struct CellHandle<'a, L: Latch> {
    pub(crate) shard: &'a Shard<L>,
    pub(crate) index: usize,
}

/// A proof that the shard's mutex is held, handed to callers (the deadlock
/// detector, the monitor) that need a consistent snapshot across more than
/// one cell. Mirrors "NOTE! the caller must own the mutex to array" on
/// `sync_array_detect_deadlock` (sync0arr.cc:174).
pub(crate) struct ShardGuard<'a, L: Latch> {
    shard: &'a Shard<L>,
    guard: MutexGuard<'a, ShardState>,
}

impl<'a, L: Latch> ShardGuard<'a, L> {
    pub(crate) fn len(&self) -> usize {
        self.shard.cells.len()
    }

    pub(crate) fn state(&self) -> &ShardState {
        &self.guard
    }

    /// Reads cell `index`. Safe because holding this guard means the shard
    /// mutex is held, and the only writes that happen without it
    /// (`thread_id`/`reserved_at`, written once by the reserving thread) are
    /// made visible to us by the mutex's own acquire/release pairing: the
    /// reserving thread always re-locks this same mutex (in
    /// `Shard::mark_waiting`) after writing them, before any other thread
    /// can observe `waiting == true`.
    pub(crate) fn cell(&self, index: usize) -> &Cell<L> {
        // SAFETY: see above; `index < self.len()` is the caller's job, and
        // out-of-range indices panic via the slice index below rather than
        // going through raw pointer arithmetic.
        unsafe { &*self.shard.cells[index].get() }
    }
}

impl<L: Latch> Shard<L> {
    /// Builds a shard with exactly `capacity` cells.
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "shard capacity must be positive");
        let cells = (0..capacity)
            .map(|_| UnsafeCell::new(Cell::free()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            cells,
            state: Mutex::new(ShardState {
                n_reserved: 0,
                next_unused: 0,
                first_free: None,
                res_count: 0,
            }),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Takes the shard mutex, returning a guard for multi-cell scans (the
    /// deadlock detector, the long-wait monitor).
    pub(crate) fn lock(&self) -> ShardGuard<'_, L> {
        let guard = self.state.lock().unwrap();
        ShardGuard { shard: self, guard }
    }

    pub(crate) fn n_reserved(&self) -> usize {
        self.state.lock().unwrap().n_reserved
    }

    /// Reserves a free cell for `target`/`mode`/`site`. Returns `None`
    /// ("CapacityExhausted") if the shard is full — not an error, the
    /// caller tries another shard or falls back to spinning.
    pub(crate) fn reserve_cell(
        &self,
        target: NonNull<L>,
        mode: Mode,
        site: Site,
    ) -> Option<CellHandle<'_, L>> {
        let index = {
            let mut state = self.state.lock().unwrap();
            let index = if let Some(free) = state.first_free {
                // SAFETY: `free` came off the free list, so it's in range
                // and not concurrently touched by anyone else while we
                // hold `state`'s lock.
                let next = unsafe { (*self.cells[free].get()).next_free };
                state.first_free = next;
                free
            } else if state.next_unused < self.cells.len() {
                let index = state.next_unused;
                state.next_unused += 1;
                index
            } else {
                return None;
            };

            state.res_count += 1;
            state.n_reserved += 1;

            // SAFETY: `index` was just claimed from the free list or the
            // high-water mark; nothing else can reference it while we hold
            // the lock, and `target`/`request_mode`/`site`/`waiting` are
            // only ever mutated under this lock.
            unsafe {
                let cell = &mut *self.cells[index].get();
                debug_assert!(cell.target.is_none());
                cell.target = Some(target);
                cell.request_mode = mode;
                cell.site = site;
                cell.waiting = false;
                cell.next_free = None;
            }
            index
        };

        // Mutex released. `thread_id`/`reserved_at` are written only by
        // this thread; see the SAFETY note on `ShardGuard::cell` for why
        // this is visible to other threads once `waiting` flips true.
        // SAFETY: `index` is exclusively owned by the calling thread until
        // it passes the handle to `free_cell` or the wait protocol.
        unsafe {
            let cell = &mut *self.cells[index].get();
            cell.thread_id = Some(thread::current().id());
            cell.reserved_at = Some(Instant::now());
        }

        Some(CellHandle { shard: self, index })
    }

    /// Flips `waiting` true under the shard mutex and hands the caller a
    /// guard so deadlock detection (if applicable) can run before the
    /// mutex is released.
    pub(crate) fn begin_wait(&self, handle: &CellHandle<'_, L>) -> ShardGuard<'_, L> {
        let guard = self.state.lock().unwrap();
        // SAFETY: `index` belongs to `handle`, which is exclusively owned
        // by the calling thread, and we hold the shard mutex.
        unsafe {
            let cell = &mut *self.cells[handle.index].get();
            debug_assert!(cell.target.is_some());
            debug_assert_eq!(cell.thread_id, Some(thread::current().id()));
            cell.waiting = true;
        }
        ShardGuard { shard: self, guard }
    }

    /// Returns the slot to the free pool.
    pub(crate) fn free_cell(&self, handle: CellHandle<'_, L>) {
        let mut state = self.state.lock().unwrap();
        let index = handle.index;
        // SAFETY: `index` belongs to `handle`, consumed here; the shard
        // mutex is held.
        unsafe {
            let cell = &mut *self.cells[index].get();
            debug_assert!(cell.target.is_some());
            cell.waiting = false;
            cell.target = None;
            cell.next_free = state.first_free;
        }
        state.first_free = Some(index);

        debug_assert!(state.n_reserved > 0);
        state.n_reserved -= 1;

        if state.next_unused > self.cells.len() / 2 && state.n_reserved == 0 {
            #[cfg(debug_assertions)]
            for i in 0..state.next_unused {
                // SAFETY: shard mutex held; scanning our own cells.
                let cell = unsafe { &*self.cells[i].get() };
                debug_assert!(!cell.waiting);
                debug_assert!(cell.target.is_none());
            }
            state.next_unused = 0;
            state.first_free = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Site;
    use crate::reference_latch::RwLatch;

    fn latch() -> RwLatch {
        RwLatch::new(Site::new("test", 0))
    }

    #[test]
    fn single_reserve_free_below_half_keeps_high_water() {
        let shard: Shard<RwLatch> = Shard::new(4);
        let l = latch();
        let ptr = NonNull::from(&l);

        let handle = shard
            .reserve_cell(ptr, Mode::S, Site::new("lock.cc", 10))
            .expect("capacity available");
        {
            let g = shard.lock();
            assert_eq!(g.state().n_reserved, 1);
            assert_eq!(g.state().res_count, 1);
            assert_eq!(g.state().next_unused, 1);
            assert_eq!(g.state().first_free, None);
        }

        shard.free_cell(handle);
        let g = shard.lock();
        assert_eq!(g.state().n_reserved, 0);
        assert_eq!(g.state().res_count, 1);
        assert_eq!(g.state().next_unused, 1);
        assert_eq!(g.state().first_free, Some(0));
    }

    #[test]
    fn free_list_reuse_is_lifo_and_compacts_past_half() {
        let shard: Shard<RwLatch> = Shard::new(4);
        let l = latch();
        let ptr = NonNull::from(&l);
        let site = Site::new("lock.cc", 1);

        let h0 = shard.reserve_cell(ptr, Mode::S, site).unwrap();
        let h1 = shard.reserve_cell(ptr, Mode::S, site).unwrap();
        let h2 = shard.reserve_cell(ptr, Mode::S, site).unwrap();
        assert_eq!(h0.index, 0);
        assert_eq!(h1.index, 1);
        assert_eq!(h2.index, 2);

        shard.free_cell(h1);
        let h3 = shard.reserve_cell(ptr, Mode::S, site).unwrap();
        assert_eq!(h3.index, 1, "free-list reuse must be LIFO");

        shard.free_cell(h2);
        shard.free_cell(h0);
        shard.free_cell(h3);

        let g = shard.lock();
        assert_eq!(g.state().n_reserved, 0);
        assert_eq!(g.state().next_unused, 0, "compaction must trigger");
        assert_eq!(g.state().first_free, None);
    }

    #[test]
    fn capacity_exhaustion_leaves_shard_state_untouched() {
        let shard: Shard<RwLatch> = Shard::new(2);
        let l = latch();
        let ptr = NonNull::from(&l);
        let site = Site::new("lock.cc", 1);

        let _h0 = shard.reserve_cell(ptr, Mode::S, site).unwrap();
        let _h1 = shard.reserve_cell(ptr, Mode::S, site).unwrap();
        let (n_before, nu_before) = {
            let g = shard.lock();
            (g.state().n_reserved, g.state().next_unused)
        };

        assert!(shard.reserve_cell(ptr, Mode::S, site).is_none());

        let g = shard.lock();
        assert_eq!(g.state().n_reserved, n_before);
        assert_eq!(g.state().next_unused, nu_before);
    }

    #[test]
    fn free_clears_handle_usage() {
        // Further observation of a freed slot shows it cleared.
        let shard: Shard<RwLatch> = Shard::new(2);
        let l = latch();
        let ptr = NonNull::from(&l);
        let handle = shard
            .reserve_cell(ptr, Mode::S, Site::new("lock.cc", 1))
            .unwrap();
        let index = handle.index;
        shard.free_cell(handle);
        let g = shard.lock();
        assert!(!g.cell(index).is_reserved());
    }
}
