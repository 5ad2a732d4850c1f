//! The recursive wait-for graph walk, grounded on
//! `sync_array_detect_deadlock`/`sync_array_deadlock_step` in
//! storage/innobase/sync/sync0arr.cc:548-747. Only ever walks cells within
//! one shard; a cycle that spans shards goes undetected, an accepted
//! limitation inherited from single-shard deployments of the original.
use crate::cell::Cell;
use crate::config::RegistryError;
use crate::latch::Latch;
use crate::mode::Mode;
use crate::shard::ShardGuard;
use std::thread::ThreadId;

/// Mirrors `debug_assert!(depth < 100)` in `sync_array_deadlock_step`
/// (sync0arr.cc:628).
pub(crate) const MAX_DEPTH: usize = 100;

/// Mode-specific blocking-rule table. A thread may legitimately re-enter
/// a latch it already holds in an exclusive-family
/// mode (X/X_WAIT/SX), so those holder modes only block a *different*
/// thread's request; a held S blocks an X/X_WAIT request from any thread,
/// including the cell's own (no silent upgrade-in-place).
fn conflicts(held: Mode, requested: Mode, holder_thread: ThreadId, requester_thread: ThreadId) -> bool {
    let other_thread = holder_thread != requester_thread;
    match requested {
        Mode::X | Mode::XWait => match held {
            Mode::X | Mode::XWait | Mode::SX => other_thread,
            Mode::S => true,
        },
        Mode::SX => match held {
            Mode::X | Mode::XWait | Mode::SX => other_thread,
            Mode::S => false,
        },
        Mode::S => matches!(held, Mode::X | Mode::XWait),
    }
}

/// Walks the wait-for graph starting at `start_thread`, which is blocked
/// requesting `start_mode` on `start_latch`. Returns `Ok(true)` if a cycle
/// back to `start_thread` is found (a genuine deadlock), `Ok(false)` if the
/// search runs out of graph without finding one, or `Err` if it exceeds
/// [`MAX_DEPTH`] first.
///
/// `guard` gives access to every cell in the shard so a blocking holder's
/// own wait (if any) can be found and followed in turn — mirrors walking
/// `cell->event`'s waiters via the shared `sync_array_t` in the original.
pub(crate) fn detect<L: Latch>(
    guard: &ShardGuard<'_, L>,
    start_thread: ThreadId,
    start_mode: Mode,
    start_latch: &L,
) -> Result<bool, RegistryError> {
    step(guard, start_thread, start_thread, start_mode, start_latch, 0)
}

fn step<L: Latch>(
    guard: &ShardGuard<'_, L>,
    origin: ThreadId,
    requester: ThreadId,
    requested_mode: Mode,
    latch: &L,
    depth: usize,
) -> Result<bool, RegistryError> {
    if depth >= MAX_DEPTH {
        return Err(RegistryError::DeadlockSearchTooDeep {
            max_depth: MAX_DEPTH,
        });
    }

    for holder in latch.debug_holders() {
        if holder.pass != 0 {
            // A delegated hold cannot be attributed to a specific thread;
            // the original treats these as untraceable and stops the walk
            // along this edge.
            continue;
        }
        if !conflicts(holder.lock_type, requested_mode, holder.thread_id, requester) {
            continue;
        }
        if holder.thread_id == origin {
            // Found a cycle back to the thread that started the search.
            return Ok(true);
        }
        if let Some(found) = find_wait(guard, holder.thread_id) {
            let (waiting_mode, waiting_latch) = found;
            if waiting_latch as *const L == latch as *const L && holder.thread_id == requester {
                // The holder is waiting on the very latch it holds — not a
                // cycle, just a degenerate self-entry; skip to avoid
                // infinite recursion on a malformed graph.
                continue;
            }
            if step(guard, origin, holder.thread_id, waiting_mode, waiting_latch, depth + 1)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Finds the cell (if any) in this shard where `thread` is currently
/// waiting, returning its requested mode and target latch.
fn find_wait<'a, L: Latch>(
    guard: &'a ShardGuard<'_, L>,
    thread: ThreadId,
) -> Option<(Mode, &'a L)> {
    for index in 0..guard.len() {
        let cell = guard.cell(index);
        if cell.waiting && cell.thread_id == Some(thread) {
            // SAFETY: `target` is only `Some` while the cell is reserved,
            // and the pointee outlives the wait by construction (the
            // waiting thread's stack frame holds a live borrow of the
            // latch for the duration of `wait_event`).
            let target: &L = unsafe { cell_target(cell) };
            return Some((cell.request_mode, target));
        }
    }
    None
}

unsafe fn cell_target<L: Latch>(cell: &Cell<L>) -> &L {
    cell.target.expect("checked waiting/target above").as_ref()
}
