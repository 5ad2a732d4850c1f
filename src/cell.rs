//! The data model for a single wait record ("Cell").
use crate::latch::Latch;
use crate::mode::{Mode, Site};
use crate::sync::Instant;
use std::ptr::NonNull;
use std::thread::ThreadId;

/// One record of "thread T is waiting on latch L in mode M".
///
/// Lifecycle: FREE (`target` is `None`) → RESERVED (`target` set,
/// `waiting == false`) → WAITING (`waiting == true`) → FREE.
///
/// `next_free` is a dedicated field rather than an overlay on `site.line`
/// the way the InnoDB original does it (`cell->line = arr->first_free_slot`
/// in `sync_array_free_cell`) — a C-struct space trick with no bearing on
/// observable behavior; a typed `Option<usize>` gives the same free-list
/// mechanics without reusing a diagnostic field for bookkeeping.
pub(crate) struct Cell<L: Latch> {
    pub(crate) target: Option<NonNull<L>>,
    pub(crate) request_mode: Mode,
    pub(crate) site: Site,
    pub(crate) thread_id: Option<ThreadId>,
    pub(crate) waiting: bool,
    pub(crate) reserved_at: Option<Instant>,
    pub(crate) next_free: Option<usize>,
}

// SAFETY: a `Cell` only ever holds a non-owning pointer to a `Latch`, which
// is itself `Send + Sync`; the cell carries no thread-affine state beyond
// plain data.
unsafe impl<L: Latch> Send for Cell<L> {}

impl<L: Latch> Cell<L> {
    pub(crate) const fn free() -> Self {
        Self {
            target: None,
            // Placeholder mode for a free cell; never observed because
            // `target.is_none()` is always checked first.
            request_mode: Mode::S,
            site: Site::new("", 0),
            thread_id: None,
            waiting: false,
            reserved_at: None,
            next_free: None,
        }
    }

    pub(crate) fn is_reserved(&self) -> bool {
        self.target.is_some()
    }
}
