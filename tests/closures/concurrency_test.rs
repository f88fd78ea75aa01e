/*!
 * Closure Concurrency Tests
 * Shared table under parallel allocate, invoke, prepare, and free
 */

use closure_host::closures::BackingRef;
use closure_host::{BackingId, ClosureState, ClosureTable, Value, ValueType};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn identity() -> BackingRef {
    BackingRef::from_fn(BackingId(1), |ctx| {
        let args = ctx.arguments()?;
        ctx.write_results(&args)?;
        Ok(())
    })
}

#[test]
fn test_concurrent_allocate_fills_capacity_exactly() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 64;
    let table = Arc::new(ClosureTable::new(THREADS * PER_THREAD, 16));
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let table = Arc::clone(&table);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|_| table.allocate().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for worker in workers {
        for handle in worker.join().unwrap() {
            assert!(seen.insert(handle), "duplicate handle {}", handle);
        }
    }
    assert_eq!(seen.len(), THREADS * PER_THREAD);
    assert!(table.allocate().is_err());
}

#[test]
fn test_churn_never_shares_live_handles() {
    let table = Arc::new(ClosureTable::new(32, 16));
    let live = Arc::new(parking_lot::Mutex::new(HashSet::new()));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let table = Arc::clone(&table);
            let live = Arc::clone(&live);
            thread::spawn(move || {
                for _ in 0..500 {
                    let Ok(handle) = table.allocate() else {
                        continue;
                    };
                    assert!(live.lock().insert(handle), "{} handed out twice", handle);
                    assert!(live.lock().remove(&handle));
                    table.free(handle).unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(table.live(), 0);
}

#[test]
fn test_parallel_invoke_on_independent_handles() {
    let table = Arc::new(ClosureTable::new(16, 16));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let h = table.allocate().unwrap();
            table
                .prepare_typed(h, identity(), &[ValueType::I64], &[ValueType::I64], &[])
                .unwrap();
            h
        })
        .collect();

    let workers: Vec<_> = handles
        .into_iter()
        .enumerate()
        .map(|(i, handle)| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for n in 0..200i64 {
                    let value = i as i64 * 1000 + n;
                    let out = table.call(handle, &[Value::I64(value)], false).unwrap();
                    assert_eq!(out, vec![Value::I64(value)]);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(table.stats().invocations, 8 * 200);
}

#[test]
fn test_free_waits_for_in_flight_invoke() {
    let table = Arc::new(ClosureTable::new(4, 16));
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = parking_lot::Mutex::new(entered_tx);
    let release_rx = parking_lot::Mutex::new(release_rx);

    let handle = table.allocate().unwrap();
    let blocking = BackingRef::from_fn(BackingId(2), move |_ctx| {
        entered_tx.lock().send(())?;
        release_rx.lock().recv()?;
        Ok(())
    });
    table.prepare_typed(handle, blocking, &[], &[], &[]).unwrap();

    let invoker = {
        let table = Arc::clone(&table);
        thread::spawn(move || table.invoke(handle, &[], &mut [0u8; 0], false))
    };
    entered_rx.recv().unwrap();

    let freed = Arc::new(AtomicBool::new(false));
    let freer = {
        let table = Arc::clone(&table);
        let freed = Arc::clone(&freed);
        thread::spawn(move || {
            let result = table.free(handle);
            freed.store(true, Ordering::SeqCst);
            result
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!freed.load(Ordering::SeqCst), "free overtook an in-flight call");

    release_tx.send(()).unwrap();
    assert_eq!(invoker.join().unwrap(), Ok(0));
    assert!(freer.join().unwrap().is_ok());
    assert_eq!(table.state(handle), Some(ClosureState::Free));
}

#[test]
fn test_allocate_not_blocked_by_in_flight_invoke() {
    let table = Arc::new(ClosureTable::new(4, 16));
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = parking_lot::Mutex::new(entered_tx);
    let release_rx = parking_lot::Mutex::new(release_rx);

    let handle = table.allocate().unwrap();
    let blocking = BackingRef::from_fn(BackingId(3), move |_ctx| {
        entered_tx.lock().send(())?;
        release_rx.lock().recv()?;
        Ok(())
    });
    table.prepare_typed(handle, blocking, &[], &[], &[]).unwrap();

    let invoker = {
        let table = Arc::clone(&table);
        thread::spawn(move || table.invoke(handle, &[], &mut [0u8; 0], false))
    };
    entered_rx.recv().unwrap();

    let other = table.allocate().unwrap();
    assert_ne!(other, handle);
    table.free(other).unwrap();

    release_tx.send(()).unwrap();
    assert!(invoker.join().unwrap().is_ok());
}

#[test]
fn test_reprepare_during_invoke_is_serialized() {
    let table = Arc::new(ClosureTable::new(4, 16));
    let handle = table.allocate().unwrap();
    table
        .prepare_typed(handle, identity(), &[ValueType::I32], &[ValueType::I32], &[])
        .unwrap();

    let preparer = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            for i in 0..200 {
                let ty = if i % 2 == 0 { ValueType::I64 } else { ValueType::I32 };
                table.prepare_typed(handle, identity(), &[ty], &[ty], &[]).unwrap();
            }
        })
    };

    for _ in 0..200 {
        // Either signature is acceptable; a torn one is not
        let Some(sig) = table.signature(handle) else {
            panic!("prepared handle lost its signature");
        };
        let value = match sig.arguments()[0] {
            ValueType::I64 => Value::I64(5),
            _ => Value::I32(5),
        };
        let mut input = vec![0u8; sig.argument_width()];
        closure_host::closures::write_values(sig.arguments(), &[value], &mut input).unwrap();
        let mut output = vec![0u8; 8];
        match table.invoke(handle, &input, &mut output, false) {
            Ok(width) => assert_eq!(width, sig.result_width()),
            Err(e) => assert!(matches!(e, closure_host::ClosureError::InvalidArgument(_))),
        }
    }

    preparer.join().unwrap();
}

#[test]
fn test_call_decodes_with_the_signature_it_invoked() {
    let table = Arc::new(ClosureTable::new(4, 16));
    let handle = table.allocate().unwrap();
    table
        .prepare_typed(handle, identity(), &[ValueType::I32], &[ValueType::I32], &[])
        .unwrap();

    // same widths, different types
    let preparer = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            for i in 0..500 {
                let ty = if i % 2 == 0 { ValueType::F32 } else { ValueType::I32 };
                table.prepare_typed(handle, identity(), &[ty], &[ty], &[]).unwrap();
            }
        })
    };

    for _ in 0..500 {
        match table.call(handle, &[Value::I32(5)], false) {
            Ok(values) => assert_eq!(values, vec![Value::I32(5)]),
            Err(e) => assert!(matches!(e, closure_host::ClosureError::InvalidArgument(_))),
        }
    }

    preparer.join().unwrap();
}
