#![cfg(loom)]
//! loom model-checks the race the wait protocol depends on: a waiter must
//! never block forever because the holder released between the waiter's
//! predicate check and it actually parking. One test module, since loom's
//! state space explodes fast with more threads and atomics in play.
use loom::thread;
use std::sync::Arc;
use wait_array_core::{Config, Mode, Registry, RwLatch, Site, WaitOutcome};

#[test]
fn waiter_always_observes_a_release_that_happens_after_it_registers() {
    loom::model(|| {
        let registry = Arc::new(Registry::<RwLatch>::new(Config {
            shard_count: std::num::NonZeroUsize::new(1).unwrap(),
            max_threads: std::num::NonZeroUsize::new(2).unwrap(),
            ..Config::default()
        }));
        let latch = Arc::new(RwLatch::new(Site::new("loom-test", 1)));

        let holder = {
            let latch = latch.clone();
            thread::spawn(move || {
                let me = thread::current().id();
                if latch.try_lock(Mode::X, me) {
                    latch.unlock(Mode::X, me);
                }
            })
        };

        let me = thread::current().id();
        let outcome = registry
            .wait_for(&latch, Mode::X, Site::new("loom-test", 2), || {
                latch.try_lock(Mode::X, me)
            })
            .unwrap();
        assert!(matches!(outcome, WaitOutcome::NotNeeded | WaitOutcome::Woken));
        latch.unlock(Mode::X, me);

        holder.join().unwrap();
    });
}
