//! The external collaborator: the rw-latch this registry coordinates
//! waiters for. The registry never constructs or owns a latch; it only
//! ever borrows one through this trait.
use crate::mode::{Mode, Site, WriterStatus};
use crate::sync::{AtomicI32, AtomicU32, Condvar, Mutex};
use std::thread::ThreadId;

/// One entry of a latch's debug holder list: a thread currently holding the
/// latch in some mode, possibly "on behalf of" another thread (a delegated
/// hold, tagged with a nonzero `pass`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolderRecord {
    /// The thread that physically acquired the hold.
    pub thread_id: ThreadId,
    /// The mode the hold was acquired in.
    pub lock_type: Mode,
    /// Nonzero if this hold was acquired on behalf of another thread (a
    /// delegated hold); such holds cannot be attributed to `thread_id` for
    /// deadlock purposes.
    pub pass: u32,
}

/// The mutex + condvar pair a waiter parks on, shared with the latch's
/// release path. The registry core only ever touches this during
/// `wait_event`'s park step.
pub struct WaitGate {
    pub(crate) wait_mutex: Mutex<()>,
    pub(crate) wait_cond: Condvar,
    pub(crate) wait_ex_cond: Condvar,
}

impl WaitGate {
    /// Builds a fresh, unparked gate.
    pub fn new() -> Self {
        Self {
            wait_mutex: Mutex::new(()),
            wait_cond: Condvar::new(),
            wait_ex_cond: Condvar::new(),
        }
    }
}

impl Default for WaitGate {
    fn default() -> Self {
        Self::new()
    }
}

/// The capabilities a latch must expose so the wait-array core can register
/// waiters on it, park them, and report on them.
pub trait Latch: Send + Sync {
    /// Reader count encoded as positive, exclusive/contested states as
    /// `<= 0`.
    fn lock_word(&self) -> &AtomicI32;

    /// "At least one waiter present" flag.
    fn waiters(&self) -> &AtomicU32;

    /// The condvar pair waiters park on.
    fn wait_gate(&self) -> &WaitGate;

    /// Debug-only: the current holder list, used by the deadlock detector.
    /// Implementations that don't track holders (i.e. aren't built for
    /// debug-mode deadlock detection) may return an empty `Vec`.
    fn debug_holders(&self) -> Vec<HolderRecord>;

    /// File/line where this latch instance was created (diagnostic).
    fn created_at(&self) -> Site;

    /// File/line of the latch's last exclusive acquisition (diagnostic).
    fn last_exclusive_at(&self) -> Site;

    /// Lifetime count of OS-level waits on this latch (diagnostic).
    fn os_wait_count(&self) -> u64;

    /// The latch's own writer status, for diagnostics.
    fn writer_status(&self) -> WriterStatus;

    /// Current reader count, for diagnostics.
    fn reader_count(&self) -> u32;
}
