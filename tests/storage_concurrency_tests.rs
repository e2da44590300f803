//! Concurrency tests for lazy values and memoized functions.
//!
//! These tests hammer one manager from several threads and check that every
//! computation still runs exactly once and that every thread observes the
//! same outcome.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, OnceLock};
use std::thread;
use std::time::Duration;

use lockmemo::storage::{NotNullLazyValue, StorageError, StorageManager};
use parking_lot::Mutex;

const THREADS: usize = 8;

/// Concurrent callers of one lazy value run its computation exactly once.
#[test]
fn test_concurrent_invoke_computes_once() {
    for _ in 0..100 {
        let manager = StorageManager::new("single flight");
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let value = manager.create_lazy_value(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        });
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let value = value.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    value.invoke()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

/// A second caller blocks until the first finishes and then sees its failure.
#[test]
fn test_waiting_caller_observes_memoized_failure() {
    let manager = StorageManager::new("shared failure");
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let value = manager.create_lazy_value(move || -> Result<u8, _> {
        counted.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Err(StorageError::message("slow failure"))
    });

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let value = value.clone();
            thread::spawn(move || value.invoke())
        })
        .collect();

    let failures: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap_err())
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(failures.windows(2).all(|pair| pair[0] == pair[1]));
}

/// Concurrent callers of a memoized function compute each key once.
#[test]
fn test_concurrent_keys_compute_once() {
    let manager = StorageManager::new("keyed single flight");
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let function = manager.create_memoized_function(move |key: &usize| {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(key * 10)
    });
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let function = function.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..16).map(|key| function.invoke(key)).collect::<Vec<_>>()
            })
        })
        .collect();

    let expected: Vec<_> = (0..16).map(|key| Ok(key * 10)).collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 16);
}

/// Values that read each other from different threads never deadlock.
#[test]
fn test_interdependent_values_do_not_deadlock() {
    for _ in 0..50 {
        let manager = StorageManager::new("web of values");
        let base = manager.create_lazy_value(|| Ok(1_u64));
        let left = {
            let base = base.clone();
            manager.create_lazy_value(move || Ok(base.invoke()? + 1))
        };
        let right = {
            let base = base.clone();
            let left = left.clone();
            manager.create_lazy_value(move || Ok(base.invoke()? + left.invoke()?))
        };

        let handles: Vec<_> = (0..THREADS)
            .map(|index| {
                let left = left.clone();
                let right = right.clone();
                thread::spawn(move || {
                    if index % 2 == 0 {
                        (left.invoke(), right.invoke())
                    } else {
                        let right_value = right.invoke();
                        (left.invoke(), right_value)
                    }
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), (Ok(2), Ok(3)));
        }
    }
}

/// A call from another thread while computing is not reentrancy: it waits.
#[test]
fn test_other_thread_waits_instead_of_reentering() {
    let manager = StorageManager::new("cross thread");
    let slot = Arc::new(OnceLock::<NotNullLazyValue<u32>>::new());
    let waiter = Arc::new(Mutex::new(None));

    let outer = {
        let slot = Arc::clone(&slot);
        let waiter = Arc::clone(&waiter);
        manager.create_lazy_value(move || {
            let pending = slot.get().expect("installed").clone();
            let handle = thread::spawn(move || pending.invoke());
            thread::sleep(Duration::from_millis(20));
            assert!(!handle.is_finished());
            *waiter.lock() = Some(handle);
            Ok(7)
        })
    };
    let _ = slot.set(outer.clone());

    assert_eq!(outer.invoke(), Ok(7));
    let handle = waiter.lock().take().expect("waiter spawned");
    assert_eq!(handle.join().unwrap(), Ok(7));
}
