//! End-to-end scenarios from SPEC_FULL.md §8.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use apppool::{AcquireOptions, Pool, PoolConfig};
use support::CountingSpawner;

fn config(max: usize) -> PoolConfig {
    PoolConfig {
        max,
        ..PoolConfig::default()
    }
}

#[test]
fn reuse_idle_avoids_a_second_spawn() {
    support::init_tracing();
    let spawner = CountingSpawner::new();
    let pool = Pool::new(spawner, config(2)).unwrap();

    let s1 = pool.get("/a", AcquireOptions::default()).unwrap();
    let id1 = *s1;
    pool.release(s1);

    let s2 = pool.get("/a", AcquireOptions::default()).unwrap();
    assert_eq!(*s2, id1, "the same Container should have been reused");

    let stats = pool.stats();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.active, 1);
    pool.release(s2);
    pool.shutdown();
}

#[test]
fn spawn_within_capacity_creates_one_container_per_session() {
    support::init_tracing();
    let spawner = CountingSpawner::new();
    let pool = Arc::new(Pool::new(spawner, config(3)).unwrap());

    let sessions: Vec<_> = (0..3)
        .map(|_| pool.get("/a", AcquireOptions::default()).unwrap())
        .collect();

    let stats = pool.stats();
    assert_eq!(stats.count, 3);
    assert_eq!(stats.active, 3);
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.spawned, 3);

    for session in sessions {
        pool.release(session);
    }
    pool.shutdown();
}

#[test]
fn overflow_without_global_queue_piles_onto_one_container() {
    support::init_tracing();
    let spawner = CountingSpawner::new();
    let pool = Pool::new(
        spawner,
        PoolConfig {
            max: 1,
            use_global_queue: false,
            ..PoolConfig::default()
        },
    )
    .unwrap();

    let s1 = pool.get("/a", AcquireOptions::default()).unwrap();
    let id1 = *s1;
    let s2 = pool.get("/a", AcquireOptions::default()).unwrap();

    assert_eq!(*s2, id1, "overflow should share the existing Instance");
    assert_eq!(pool.stats().spawned, 1);
    assert_eq!(pool.stats().active, 1, "active is counted once, not per session");

    pool.release(s1);
    pool.release(s2);
    pool.shutdown();
}

#[test]
fn global_queue_wait_unblocks_on_release() {
    support::init_tracing();
    let spawner = CountingSpawner::new();
    let pool = Arc::new(
        Pool::new(
            spawner,
            PoolConfig {
                max: 1,
                use_global_queue: true,
                ..PoolConfig::default()
            },
        )
        .unwrap(),
    );

    let s1 = pool.get("/a", AcquireOptions::default()).unwrap();
    assert_eq!(pool.stats().active, 1);

    let waiter_pool = Arc::clone(&pool);
    let waiter = std::thread::spawn(move || {
        waiter_pool.get("/a", AcquireOptions::default()).unwrap()
    });

    // Give the waiter time to park on the condition variable.
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(pool.stats().waiting_on_global_queue, 1);

    pool.release(s1);
    let s2 = waiter.join().unwrap();

    assert_eq!(pool.stats().spawned, 1, "the waiter should reuse, not spawn");
    pool.release(s2);
    pool.shutdown();
}

#[test]
fn eviction_across_roots_frees_capacity() {
    support::init_tracing();
    let spawner = CountingSpawner::new();
    let pool = Pool::new(spawner, config(1)).unwrap();

    let s1 = pool.get("/a", AcquireOptions::default()).unwrap();
    pool.release(s1);

    let s2 = pool.get("/b", AcquireOptions::default()).unwrap();

    assert_eq!(pool.stats().spawned, 2);
    assert_eq!(pool.stats().count, 1);
    assert_eq!(pool.stats().evicted, 1);

    pool.release(s2);
    pool.shutdown();
}

#[test]
fn restart_trigger_purges_and_respawns() {
    support::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let app_root = dir.path().to_str().unwrap().to_string();
    std::fs::create_dir_all(dir.path().join("tmp")).unwrap();

    let spawner = CountingSpawner::new();
    let pool = Pool::new(spawner, config(1)).unwrap();

    let s1 = pool.get(&app_root, AcquireOptions::default()).unwrap();
    let id1 = *s1;
    pool.release(s1);
    assert_eq!(pool.stats().spawned, 1);

    std::fs::File::create(dir.path().join("tmp/restart.txt")).unwrap();

    let s2 = pool.get(&app_root, AcquireOptions::default()).unwrap();
    assert_ne!(*s2, id1, "restart should have discarded the old Container");
    assert_eq!(pool.stats().spawned, 2);
    assert_eq!(pool.stats().restarted, 1);

    let s3 = pool.get(&app_root, AcquireOptions::default()).unwrap();
    assert_eq!(*s3, *s2, "no trigger file, so the second get should reuse/pile-on");
    assert_eq!(pool.stats().restarted, 1, "no repeat purge without a new trigger");

    pool.release(s2);
    pool.release(s3);
    pool.shutdown();
}

#[test]
fn request_cap_retires_after_exactly_k_releases() {
    support::init_tracing();
    let spawner = CountingSpawner::new();
    let pool = Pool::new(spawner, config(4)).unwrap();
    let options = AcquireOptions::with_max_requests(3);

    let s1 = pool.get("/a", options).unwrap();
    let id1 = *s1;
    pool.release(s1);

    let s2 = pool.get("/a", options).unwrap();
    assert_eq!(*s2, id1);
    pool.release(s2);

    let s3 = pool.get("/a", options).unwrap();
    assert_eq!(*s3, id1);
    pool.release(s3);

    assert_eq!(pool.stats().retired, 1, "third release hits max_requests");
    assert_eq!(pool.stats().count, 0);

    let s4 = pool.get("/a", options).unwrap();
    assert_ne!(*s4, id1, "a fresh Container should have been spawned");
    assert_eq!(pool.stats().spawned, 2);

    pool.release(s4);
    pool.shutdown();
}

#[test]
fn crash_retry_eventually_succeeds_within_the_attempt_bound() {
    support::init_tracing();
    let spawner = CountingSpawner::with_connect_failures(2);
    let disposed = Arc::clone(&spawner.disposed);
    let pool = Pool::new(spawner, config(4)).unwrap();

    let session = pool.get("/a", AcquireOptions::default()).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.spawned, 3, "two failed attempts plus the one that connected");
    assert_eq!(stats.crashed, 2);
    assert_eq!(disposed.load(Ordering::SeqCst), 2, "the two crashed instances were disposed");

    pool.release(session);
    pool.shutdown();
}

#[test]
fn shutdown_is_idempotent_and_drains_all_domains() {
    support::init_tracing();
    let spawner = CountingSpawner::new();
    let pool = Pool::new(spawner, config(4)).unwrap();

    let _s1 = pool.get("/a", AcquireOptions::default()).unwrap();
    let _s2 = pool.get("/b", AcquireOptions::default()).unwrap();
    // Neither session is released: shutdown must drain active Containers too.

    pool.shutdown();
    pool.shutdown(); // must not panic or double-dispose

    assert_eq!(pool.stats().count, 0);
}
