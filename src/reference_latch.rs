//! A minimal, non-fair reference implementation of [`Latch`], used by this
//! crate's own tests and doctest. Real engines implement `Latch` for their
//! own rw-latch type; this one exists only so the wait protocol, the
//! deadlock detector, and the monitor have something concrete to run
//! against. Latch acquisition/fairness is out of scope for this crate;
//! this type does the bare minimum needed to drive tests, not a
//! production-quality rw-latch.
use crate::latch::{HolderRecord, Latch, WaitGate};
use crate::mode::{Mode, Site, WriterStatus};
use crate::sync::{AtomicI32, AtomicU32, AtomicU64, Mutex};
use std::sync::atomic::Ordering::{AcqRel, Acquire, Release};
use std::thread::ThreadId;

/// Mirrors InnoDB's `X_LOCK_DECR`: the value `lock_word` takes when the
/// latch is completely free. Shared holds subtract 1 each; an X hold
/// subtracts the whole thing (to 0); an SX hold subtracts half.
const X_LOCK_DECR: i32 = 0x2000_0000;
const SX_LOCK_DECR: i32 = X_LOCK_DECR / 2;

pub struct RwLatch {
    lock_word: AtomicI32,
    waiters: AtomicU32,
    gate: WaitGate,
    holders: Mutex<Vec<HolderRecord>>,
    created_at: Site,
    last_exclusive_at: Mutex<Site>,
    os_wait_count: AtomicU64,
}

impl RwLatch {
    /// Builds a fresh, unlocked latch created at `site`.
    pub fn new(site: Site) -> Self {
        Self {
            lock_word: AtomicI32::new(X_LOCK_DECR),
            waiters: AtomicU32::new(0),
            gate: WaitGate::new(),
            holders: Mutex::new(Vec::new()),
            created_at: site,
            last_exclusive_at: Mutex::new(site),
            os_wait_count: AtomicU64::new(0),
        }
    }

    /// Attempts to acquire `mode` for `thread` without blocking.
    pub fn try_lock(&self, mode: Mode, thread: ThreadId) -> bool {
        let acquired = match mode {
            Mode::S => {
                let prev = self.lock_word.fetch_sub(1, AcqRel);
                if prev > 0 {
                    true
                } else {
                    self.lock_word.fetch_add(1, AcqRel);
                    false
                }
            }
            Mode::X => self
                .lock_word
                .compare_exchange(X_LOCK_DECR, 0, AcqRel, Acquire)
                .is_ok(),
            Mode::SX => self
                .lock_word
                .compare_exchange(X_LOCK_DECR, SX_LOCK_DECR, AcqRel, Acquire)
                .is_ok(),
            Mode::XWait => {
                // Reserve the upgrade slot; succeeds immediately if no
                // readers remain, otherwise the caller must wait for
                // `lock_word` to reach zero.
                self.lock_word.fetch_sub(SX_LOCK_DECR, AcqRel);
                self.lock_word.load(Acquire) == 0
            }
        };
        if acquired {
            self.holders.lock().unwrap().push(HolderRecord {
                thread_id: thread,
                lock_type: mode,
                pass: 0,
            });
            if matches!(mode, Mode::X) {
                *self.last_exclusive_at.lock().unwrap() = self.created_at;
            }
        }
        acquired
    }

    /// Releases a hold acquired via `try_lock`, waking parked waiters.
    pub fn unlock(&self, mode: Mode, thread: ThreadId) {
        {
            let mut holders = self.holders.lock().unwrap();
            if let Some(pos) = holders
                .iter()
                .position(|h| h.thread_id == thread && h.lock_type == mode)
            {
                holders.remove(pos);
            }
        }
        match mode {
            Mode::S => {
                self.lock_word.fetch_add(1, AcqRel);
            }
            Mode::SX => {
                self.lock_word.fetch_add(SX_LOCK_DECR, AcqRel);
            }
            Mode::X | Mode::XWait => {
                self.lock_word.store(X_LOCK_DECR, Release);
            }
        }
        self.wake_parked();
    }

    /// Registers a delegated hold (`pass != 0`) without touching
    /// `lock_word` — used by deadlock-detector tests that need a holder
    /// whose release cannot be attributed to a specific thread.
    pub fn add_delegated_holder(&self, thread: ThreadId, mode: Mode, pass: u32) {
        debug_assert_ne!(pass, 0, "pass == 0 is not delegated");
        self.holders.lock().unwrap().push(HolderRecord {
            thread_id: thread,
            lock_type: mode,
            pass,
        });
    }

    fn wake_parked(&self) {
        if self.waiters.swap(0, AcqRel) != 0 {
            let _guard = self.gate.wait_mutex.lock().unwrap();
            self.gate.wait_cond.notify_all();
            self.gate.wait_ex_cond.notify_all();
        }
        self.os_wait_count.fetch_add(1, AcqRel);
    }
}

impl Latch for RwLatch {
    fn lock_word(&self) -> &AtomicI32 {
        &self.lock_word
    }

    fn waiters(&self) -> &AtomicU32 {
        &self.waiters
    }

    fn wait_gate(&self) -> &WaitGate {
        &self.gate
    }

    fn debug_holders(&self) -> Vec<HolderRecord> {
        self.holders.lock().unwrap().clone()
    }

    fn created_at(&self) -> Site {
        self.created_at
    }

    fn last_exclusive_at(&self) -> Site {
        *self.last_exclusive_at.lock().unwrap()
    }

    fn os_wait_count(&self) -> u64 {
        self.os_wait_count.load(Acquire)
    }

    fn writer_status(&self) -> WriterStatus {
        let holders = self.holders.lock().unwrap();
        holders
            .iter()
            .find_map(|h| match h.lock_type {
                Mode::X => Some(WriterStatus::X),
                Mode::SX => Some(WriterStatus::Sx),
                Mode::XWait => Some(WriterStatus::XWait),
                Mode::S => None,
            })
            .unwrap_or(WriterStatus::NotLocked)
    }

    fn reader_count(&self) -> u32 {
        self.holders
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.lock_type == Mode::S)
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_locks_stack_and_drain() {
        let latch = RwLatch::new(Site::new("test", 1));
        let t = std::thread::current().id();
        assert!(latch.try_lock(Mode::S, t));
        assert!(latch.try_lock(Mode::S, t));
        assert_eq!(latch.reader_count(), 2);
        assert!(!latch.try_lock(Mode::X, t));
        latch.unlock(Mode::S, t);
        latch.unlock(Mode::S, t);
        assert_eq!(latch.reader_count(), 0);
        assert!(latch.try_lock(Mode::X, t));
    }

    #[test]
    fn exclusive_excludes_everything() {
        let latch = RwLatch::new(Site::new("test", 1));
        let t = std::thread::current().id();
        assert!(latch.try_lock(Mode::X, t));
        assert!(!latch.try_lock(Mode::S, t));
        assert!(!latch.try_lock(Mode::SX, t));
        assert_eq!(latch.writer_status(), WriterStatus::X);
        latch.unlock(Mode::X, t);
        assert_eq!(latch.writer_status(), WriterStatus::NotLocked);
    }

    #[test]
    fn sx_coexists_with_shared_not_exclusive() {
        let latch = RwLatch::new(Site::new("test", 1));
        let t = std::thread::current().id();
        assert!(latch.try_lock(Mode::SX, t));
        assert!(latch.try_lock(Mode::S, t));
        assert!(!latch.try_lock(Mode::X, t));
        assert!(!latch.try_lock(Mode::SX, t));
    }
}
