/*!
 * Dispatch Tests
 * Invocation through the table with real backing functions
 */

use closure_host::closures::{decode, encode, BackingRef};
use closure_host::{
    BackingId, CallContext, ClosureError, ClosureHandle, ClosureTable, Value, ValueType,
};
use pretty_assertions::assert_eq;
use std::sync::mpsc;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

fn adder(ctx: &mut CallContext<'_>) -> anyhow::Result<()> {
    let args = ctx.arguments()?;
    let payload: [u8; 4] = ctx
        .user_data()
        .try_into()
        .map_err(|_| anyhow::anyhow!("payload must be 4 bytes"))?;
    let sum = args[0].as_i32().ok_or_else(|| anyhow::anyhow!("expected i32"))? as i64
        + args[1].as_i64().ok_or_else(|| anyhow::anyhow!("expected i64"))?
        + i32::from_le_bytes(payload) as i64;
    ctx.write_results(&[Value::I32(sum as i32)])?;
    Ok(())
}

#[test]
fn test_adder_with_payload() {
    let table = ClosureTable::new(16, 64);
    let handle = table.allocate().unwrap();
    table
        .prepare(
            handle,
            BackingRef::from_fn(BackingId(1), adder),
            &[0, 1],
            &[0],
            &7i32.to_le_bytes(),
        )
        .unwrap();

    let mut input = 5i32.to_le_bytes().to_vec();
    input.extend_from_slice(&9i64.to_le_bytes());
    assert_eq!(input.len(), 12);

    let mut output = [0u8; 4];
    assert_eq!(table.invoke(handle, &input, &mut output, false), Ok(4));
    assert_eq!(i32::from_le_bytes(output), 21);
}

#[test]
fn test_float_signature_round_trip() {
    let table = ClosureTable::new(16, 64);
    let handle = table.allocate().unwrap();
    let scale = BackingRef::from_fn(BackingId(2), |ctx| {
        let args = ctx.arguments()?;
        let x = args[0].as_f64().ok_or_else(|| anyhow::anyhow!("expected f64"))?;
        let k = args[1].as_f32().ok_or_else(|| anyhow::anyhow!("expected f32"))?;
        ctx.write_results(&[Value::F64(x * k as f64), Value::F32(k)])?;
        Ok(())
    });
    table
        .prepare_typed(
            handle,
            scale,
            &[ValueType::F64, ValueType::F32],
            &[ValueType::F64, ValueType::F32],
            &[],
        )
        .unwrap();

    let input = encode(&[Value::F64(1.5), Value::F32(4.0)]);
    let mut output = [0u8; 12];
    table.invoke(handle, &input, &mut output, false).unwrap();
    assert_eq!(
        decode(&[ValueType::F64, ValueType::F32], &output).unwrap(),
        vec![Value::F64(6.0), Value::F32(4.0)]
    );
}

#[test]
fn test_wrong_result_shape_is_internal() {
    let table = ClosureTable::new(16, 64);
    let handle = table.allocate().unwrap();
    let sloppy = BackingRef::from_fn(BackingId(3), |ctx| {
        ctx.write_results(&[Value::I64(1)])?;
        Ok(())
    });
    table
        .prepare_typed(handle, sloppy, &[], &[ValueType::I32], &[])
        .unwrap();

    let mut output = [0xAAu8; 4];
    let err = table.invoke(handle, &[], &mut output, false).unwrap_err();
    assert!(matches!(err, ClosureError::Internal(_)));
    assert_eq!(output, [0xAA; 4]);
}

#[test]
fn test_invoke_never_prepared_or_unknown() {
    let table = ClosureTable::new(16, 64);
    let handle = table.allocate().unwrap();
    let unknown = ClosureHandle::from_raw(9).unwrap();
    let mut output = [0u8; 0];

    assert_eq!(
        table.invoke(handle, &[], &mut output, false),
        Err(ClosureError::InvalidHandle(handle.raw()))
    );
    assert_eq!(
        table.invoke(unknown, &[], &mut output, false),
        Err(ClosureError::InvalidHandle(9))
    );
}

#[test]
fn test_backing_calls_other_closure() {
    let table = Arc::new(ClosureTable::new(16, 64));

    let inner = table.allocate().unwrap();
    table
        .prepare(inner, BackingRef::from_fn(BackingId(1), adder), &[0, 1], &[0], &1i32.to_le_bytes())
        .unwrap();

    let weak: Weak<ClosureTable> = Arc::downgrade(&table);
    let outer = table.allocate().unwrap();
    let twice = BackingRef::from_fn(BackingId(4), move |ctx| {
        let table = weak
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("table dropped"))?;
        let x = ctx.arguments()?[0].as_i32().ok_or_else(|| anyhow::anyhow!("expected i32"))?;
        let once = table.call(inner, &[Value::I32(x), Value::I64(0)], false)?;
        let y = once[0].as_i32().ok_or_else(|| anyhow::anyhow!("expected i32"))?;
        let again = table.call(inner, &[Value::I32(y), Value::I64(0)], false)?;
        ctx.write_results(&again)?;
        Ok(())
    });
    table
        .prepare_typed(outer, twice, &[ValueType::I32], &[ValueType::I32], &[])
        .unwrap();

    let results = table.call(outer, &[Value::I32(10)], false).unwrap();
    assert_eq!(results, vec![Value::I32(12)]);
    assert_eq!(table.stats().invocations, 3);
}

#[test]
fn test_backing_recurses_into_itself() {
    let table = Arc::new(ClosureTable::new(4, 16));
    let weak = Arc::downgrade(&table);
    let handle = table.allocate().unwrap();

    // depth(n) = n == 0 ? 0 : 1 + depth(n - 1)
    let depth = BackingRef::from_fn(BackingId(5), move |ctx| {
        let n = ctx.arguments()?[0].as_i32().ok_or_else(|| anyhow::anyhow!("expected i32"))?;
        let result = if n == 0 {
            0
        } else {
            let table = weak
                .upgrade()
                .ok_or_else(|| anyhow::anyhow!("table dropped"))?;
            let inner = table.call(ctx.handle(), &[Value::I32(n - 1)], ctx.mode_flag())?;
            1 + inner[0].as_i32().ok_or_else(|| anyhow::anyhow!("expected i32"))?
        };
        ctx.write_results(&[Value::I32(result)])?;
        Ok(())
    });
    table
        .prepare_typed(handle, depth, &[ValueType::I32], &[ValueType::I32], &[])
        .unwrap();

    assert_eq!(
        table.call(handle, &[Value::I32(5)], false).unwrap(),
        vec![Value::I32(5)]
    );
}

/// Run a call on a worker and give up if it does not return
fn call_with_deadline(
    table: &Arc<ClosureTable>,
    handle: ClosureHandle,
) -> Result<Vec<Value>, ClosureError> {
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(table);
    thread::spawn(move || {
        let _ = tx.send(worker.call(handle, &[], false));
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("call did not return")
}

#[test]
fn test_backing_cannot_free_its_own_closure() {
    let table = Arc::new(ClosureTable::new(4, 16));
    let weak = Arc::downgrade(&table);
    let seen = Arc::new(Mutex::new(None));
    let observed = Arc::clone(&seen);

    let handle = table.allocate().unwrap();
    let self_free = BackingRef::from_fn(BackingId(6), move |ctx| {
        let table = weak
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("table dropped"))?;
        *observed.lock() = Some(table.free(ctx.handle()));
        Ok(())
    });
    table
        .prepare_typed(handle, self_free, &[], &[], &[])
        .unwrap();

    assert_eq!(call_with_deadline(&table, handle), Ok(vec![]));
    assert_eq!(
        seen.lock().clone(),
        Some(Err(ClosureError::Busy(handle.raw())))
    );

    // once the call has returned the handle is free-able as usual
    assert_eq!(table.free(handle), Ok(()));
}

#[test]
fn test_backing_cannot_reprepare_its_own_closure() {
    let table = Arc::new(ClosureTable::new(4, 16));
    let weak = Arc::downgrade(&table);
    let seen = Arc::new(Mutex::new(None));
    let observed = Arc::clone(&seen);

    let handle = table.allocate().unwrap();
    let self_prepare = BackingRef::from_fn(BackingId(7), move |ctx| {
        let table = weak
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("table dropped"))?;
        let replacement = BackingRef::from_fn(BackingId(8), |_ctx| Ok(()));
        *observed.lock() =
            Some(table.prepare_typed(ctx.handle(), replacement, &[ValueType::I32], &[], &[]));
        Ok(())
    });
    table
        .prepare_typed(handle, self_prepare, &[], &[], &[])
        .unwrap();

    assert_eq!(call_with_deadline(&table, handle), Ok(vec![]));
    assert_eq!(
        seen.lock().clone(),
        Some(Err(ClosureError::Busy(handle.raw())))
    );
    assert_eq!(table.signature(handle).unwrap().backing_id(), BackingId(7));

    // another closure on the same thread is still free to mutate it
    let other = table.allocate().unwrap();
    let victim = handle;
    let weak = Arc::downgrade(&table);
    let freer = BackingRef::from_fn(BackingId(9), move |_ctx| {
        let table = weak
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("table dropped"))?;
        table.free(victim)?;
        Ok(())
    });
    table.prepare_typed(other, freer, &[], &[], &[]).unwrap();
    assert_eq!(call_with_deadline(&table, other), Ok(vec![]));
    assert_eq!(table.state(handle), Some(closure_host::ClosureState::Free));
}

#[test]
fn test_adder_rejects_mistyped_arguments() {
    let table = ClosureTable::new(4, 16);
    let handle = table.allocate().unwrap();
    table
        .prepare(
            handle,
            BackingRef::from_fn(BackingId(1), adder),
            &[1, 1],
            &[0],
            &7i32.to_le_bytes(),
        )
        .unwrap();

    let err = table
        .call(handle, &[Value::I64(5), Value::I64(9)], false)
        .unwrap_err();
    assert!(matches!(err, ClosureError::Internal(ref msg) if msg.contains("expected i32")));
}
