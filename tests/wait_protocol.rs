use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use wait_array_core::{Config, Mode, Registry, RwLatch, Site, WaitOutcome};

fn config(shard_count: usize, max_threads: usize) -> Config {
    Config {
        shard_count: NonZeroUsize::new(shard_count).unwrap(),
        max_threads: NonZeroUsize::new(max_threads).unwrap(),
        ..Config::default()
    }
}

#[test]
fn exclusive_waiter_wakes_once_holder_releases() {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = Arc::new(Registry::<RwLatch>::new(config(1, 8)));
    let latch = Arc::new(RwLatch::new(Site::new("it", 1)));

    let holder = thread::current().id();
    assert!(latch.try_lock(Mode::X, holder));

    let r = registry.clone();
    let l = latch.clone();
    let waiter = thread::spawn(move || {
        let me = thread::current().id();
        r.wait_for(&l, Mode::X, Site::new("it", 2), || l.try_lock(Mode::X, me))
            .unwrap()
    });

    // Give the waiter time to register before releasing, so this
    // exercises the parked path rather than the immediate-predicate path.
    thread::sleep(Duration::from_millis(30));
    assert_eq!(registry.reserved_count(), 1);
    latch.unlock(Mode::X, holder);

    let outcome = waiter.join().unwrap();
    assert_eq!(outcome, WaitOutcome::Woken);
    assert_eq!(registry.reserved_count(), 0);
}

#[test]
fn shared_waiters_all_wake_on_exclusive_release() {
    let registry = Arc::new(Registry::<RwLatch>::new(config(1, 8)));
    let latch = Arc::new(RwLatch::new(Site::new("it", 1)));

    let holder = thread::current().id();
    assert!(latch.try_lock(Mode::X, holder));

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let r = registry.clone();
            let l = latch.clone();
            thread::spawn(move || {
                let me = thread::current().id();
                r.wait_for(&l, Mode::S, Site::new("it", 2), || l.try_lock(Mode::S, me))
                    .unwrap()
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    latch.unlock(Mode::X, holder);

    for w in waiters {
        assert_eq!(w.join().unwrap(), WaitOutcome::Woken);
    }
    assert_eq!(latch.reader_count(), 3);
}

#[test]
fn capacity_exhaustion_reports_err_when_every_shard_is_full() {
    // With two single-cell shards both occupied by parked waiters, a
    // third wait must fail over from shard to shard and still come back
    // as an error rather than reserving past capacity.
    let registry = Arc::new(Registry::<RwLatch>::new(config(2, 1)));

    let latch_a = Arc::new(RwLatch::new(Site::new("it", 1)));
    let latch_b = Arc::new(RwLatch::new(Site::new("it", 2)));
    let latch_c = RwLatch::new(Site::new("it", 3));

    let holder = thread::current().id();
    assert!(latch_a.try_lock(Mode::X, holder));
    assert!(latch_b.try_lock(Mode::X, holder));
    assert!(latch_c.try_lock(Mode::X, holder));

    let spawn_waiter = |registry: Arc<Registry<RwLatch>>, latch: Arc<RwLatch>, line: u32| {
        thread::spawn(move || {
            let me = thread::current().id();
            registry
                .wait_for(&latch, Mode::X, Site::new("it", line), || {
                    latch.try_lock(Mode::X, me)
                })
                .unwrap()
        })
    };

    let wa = spawn_waiter(registry.clone(), latch_a.clone(), 10);
    let wb = spawn_waiter(registry.clone(), latch_b.clone(), 11);

    while registry.reserved_count() < 2 {
        thread::sleep(Duration::from_millis(5));
    }

    let me = thread::current().id();
    let result = registry.wait_for(&latch_c, Mode::X, Site::new("it", 12), || {
        latch_c.try_lock(Mode::X, me)
    });
    assert!(matches!(
        result,
        Err(wait_array_core::RegistryError::CapacityExhausted { .. })
    ));

    latch_a.unlock(Mode::X, holder);
    latch_b.unlock(Mode::X, holder);
    latch_c.unlock(Mode::X, holder);
    assert_eq!(wa.join().unwrap(), WaitOutcome::Woken);
    assert_eq!(wb.join().unwrap(), WaitOutcome::Woken);
}
