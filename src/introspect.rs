//! Read-only views over live wait state for an external reporting layer,
//! grounded on `sync_arr_get_n_items`/`sync_array_get_nth_cell`/
//! `sync_arr_get_item` in storage/innobase/sync/sync0arr.cc:1013-1049, which
//! back INFORMATION_SCHEMA.INNODB_SYS_SEMAPHORE_WAITS.
use crate::latch::Latch;
use crate::mode::{Mode, Site, WriterStatus};
use crate::shard::Shard;
use crate::sync::{Duration, Instant};
use std::thread::ThreadId;

/// A point-in-time snapshot of one waiting cell, shaped for a reporting
/// table row.
#[derive(Debug, Clone, Copy)]
pub struct CellSnapshot {
    /// The waiting thread.
    pub thread_id: ThreadId,
    /// Where the wait was requested from.
    pub site: Site,
    /// The mode the thread is waiting to acquire.
    pub requested_mode: Mode,
    /// How long the thread has been waiting, as of the snapshot.
    pub waited: Duration,
    /// Where the target latch was created.
    pub latch_created_at: Site,
    /// Where the target latch was last acquired exclusively.
    pub latch_last_exclusive_at: Site,
    /// The target latch's current writer status.
    pub writer_status: WriterStatus,
    /// The target latch's current reader count.
    pub reader_count: u32,
}

/// The legacy quirk: the *capacity* of a single shard, not the number of
/// live waiters — kept for API parity with `sync_arr_get_n_items`, which
/// literally returns `arr->n_cells` (sync0arr.cc:1013-1017), not a
/// reservation count.
pub(crate) fn n_items<L: Latch>(shard: &Shard<L>) -> usize {
    shard.capacity()
}

/// Indexed random access into slot `i` of `shard`, the companion to
/// `n_items`: returns a snapshot if the slot is reserved and waiting,
/// `None` otherwise. Mirrors `sync_arr_get_nth_cell` feeding
/// `sync_arr_get_item` (sync0arr.cc:1021-1049); not atomic with `n_items`
/// or across repeated calls to `get_item` itself.
pub(crate) fn get_item<L: Latch>(shard: &Shard<L>, i: usize, now: Instant) -> Option<CellSnapshot> {
    let guard = shard.lock();
    if i >= guard.len() {
        return None;
    }
    snapshot(guard.cell(i), now)
}

/// The faithful alternative `n_items` should have been: how many cells in
/// `shard` are actually reserved right now.
pub(crate) fn reserved_count<L: Latch>(shard: &Shard<L>) -> usize {
    shard.n_reserved()
}

/// Walks every waiting cell in `shard`, calling `f` with a snapshot of
/// each. Takes the shard mutex for the whole walk, same as
/// `sync_array_cell_print`'s caller in `sync_arr_get_item`
/// (sync0arr.cc:1041-1049) holding `sync_arr_get_mutex` throughout.
pub(crate) fn for_each_waiter<L: Latch>(shard: &Shard<L>, now: Instant, mut f: impl FnMut(CellSnapshot)) {
    let guard = shard.lock();
    for index in 0..guard.len() {
        if let Some(snap) = snapshot(guard.cell(index), now) {
            f(snap);
        }
    }
}

fn snapshot<L: Latch>(cell: &crate::cell::Cell<L>, now: Instant) -> Option<CellSnapshot> {
    if !cell.waiting {
        return None;
    }
    let (Some(thread_id), Some(reserved_at)) = (cell.thread_id, cell.reserved_at) else {
        return None;
    };
    // SAFETY: `target` is `Some` exactly when the cell is reserved, which
    // `cell.waiting` implies; the pointee outlives this snapshot because
    // the waiting thread holds a live borrow of it for the duration of its
    // wait.
    let latch: &L = unsafe { cell.target.expect("reserved").as_ref() };
    Some(CellSnapshot {
        thread_id,
        site: cell.site,
        requested_mode: cell.request_mode,
        waited: now.saturating_duration_since(reserved_at),
        latch_created_at: latch.created_at(),
        latch_last_exclusive_at: latch.last_exclusive_at(),
        writer_status: latch.writer_status(),
        reader_count: latch.reader_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_latch::RwLatch;
    use crate::sync::Instant;
    use std::ptr::NonNull;

    #[test]
    fn legacy_n_items_is_capacity_not_occupancy() {
        let shard: Shard<RwLatch> = Shard::new(8);
        let l = RwLatch::new(Site::new("test", 1));
        let _h = shard
            .reserve_cell(NonNull::from(&l), Mode::S, Site::new("test", 2))
            .unwrap();
        assert_eq!(n_items(&shard), 8);
        assert_eq!(reserved_count(&shard), 1);
    }

    #[test]
    fn for_each_waiter_only_yields_waiting_cells() {
        let shard: Shard<RwLatch> = Shard::new(4);
        let l = RwLatch::new(Site::new("test", 1));
        let reserved = shard
            .reserve_cell(NonNull::from(&l), Mode::S, Site::new("test", 2))
            .unwrap();
        let waiting = shard
            .reserve_cell(NonNull::from(&l), Mode::X, Site::new("test", 3))
            .unwrap();
        let _guard = shard.begin_wait(&waiting);

        let mut seen = Vec::new();
        for_each_waiter(&shard, Instant::now(), |snap| seen.push(snap.requested_mode));
        assert_eq!(seen, vec![Mode::X]);

        drop(_guard);
        shard.free_cell(reserved);
        shard.free_cell(waiting);
    }

    #[test]
    fn get_item_reports_only_reserved_and_waiting_slots() {
        let shard: Shard<RwLatch> = Shard::new(4);
        let l = RwLatch::new(Site::new("test", 1));
        let reserved = shard
            .reserve_cell(NonNull::from(&l), Mode::S, Site::new("test", 2))
            .unwrap();
        let reserved_index = reserved.index;
        let waiting = shard
            .reserve_cell(NonNull::from(&l), Mode::X, Site::new("test", 3))
            .unwrap();
        let waiting_index = waiting.index;
        let _guard = shard.begin_wait(&waiting);

        assert!(get_item(&shard, reserved_index, Instant::now()).is_none());
        let snap = get_item(&shard, waiting_index, Instant::now()).unwrap();
        assert_eq!(snap.requested_mode, Mode::X);
        assert!(get_item(&shard, shard.capacity(), Instant::now()).is_none());

        drop(_guard);
        shard.free_cell(reserved);
        shard.free_cell(waiting);
    }
}
