/*!
 * Closure Host - Demo Entry Point
 *
 * Brings up the closure runtime and drives one closure through the guest
 * boundary:
 * - allocate a handle
 * - prepare it with (i32, i64) -> i32 and a 4-byte payload
 * - invoke it with (5, 9)
 * - free everything on shutdown
 */

use std::error::Error;
use tracing::info;

use closure_host::{init_tracing, BackingId, CallContext, ClosureRuntime, Errno, Value};

const ADDER: BackingId = BackingId(1);

// Guest memory layout used by the demo
const HANDLE_PTR: u32 = 0x00;
const ARG_TYPES_PTR: u32 = 0x10;
const RESULT_TYPES_PTR: u32 = 0x18;
const USER_DATA_PTR: u32 = 0x20;
const INPUT_PTR: u32 = 0x40;
const OUTPUT_PTR: u32 = 0x80;

/// result = arg0 + arg1 + payload
fn adder(ctx: &mut CallContext<'_>) -> anyhow::Result<()> {
    let args = ctx.arguments()?;
    let payload: [u8; 4] = ctx
        .user_data()
        .try_into()
        .map_err(|_| anyhow::anyhow!("payload must be 4 bytes"))?;

    let lhs = args[0].as_i32().ok_or_else(|| anyhow::anyhow!("expected i32"))? as i64;
    let rhs = args[1].as_i64().ok_or_else(|| anyhow::anyhow!("expected i64"))?;
    let sum = lhs + rhs + i32::from_le_bytes(payload) as i64;

    ctx.write_results(&[Value::I32(sum as i32)])?;
    Ok(())
}

fn check(errno: Errno, what: &str) -> Result<(), Box<dyn Error>> {
    if errno.is_success() {
        Ok(())
    } else {
        Err(format!("{} failed: {} ({})", what, errno, errno.raw()).into())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize structured tracing
    init_tracing();

    info!("Closure host starting...");
    let runtime = ClosureRuntime::from_env();
    runtime.functions().register_fn(ADDER, adder);

    let memory = runtime.memory();
    memory.write_bytes(ARG_TYPES_PTR, &[0, 1])?;
    memory.write_bytes(RESULT_TYPES_PTR, &[0])?;
    memory.write_bytes(USER_DATA_PTR, &7i32.to_le_bytes())?;

    check(runtime.closure_allocate(HANDLE_PTR), "closure_allocate")?;
    let handle = memory.read_u32(HANDLE_PTR)?;
    info!(handle, "Allocated closure");

    check(
        runtime.closure_prepare(
            ADDER.0,
            handle,
            ARG_TYPES_PTR,
            2,
            RESULT_TYPES_PTR,
            1,
            USER_DATA_PTR,
            4,
        ),
        "closure_prepare",
    )?;

    let mut input = 5i32.to_le_bytes().to_vec();
    input.extend_from_slice(&9i64.to_le_bytes());
    memory.write_bytes(INPUT_PTR, &input)?;

    check(
        runtime.closure_invoke(handle, INPUT_PTR, input.len() as u32, OUTPUT_PTR, 4, false),
        "closure_invoke",
    )?;
    let result = memory.read_u32(OUTPUT_PTR)? as i32;
    info!(handle, result, "Closure returned");
    println!("adder(5, 9) with payload 7 = {}", result);

    println!("{}", serde_json::to_string_pretty(&runtime.stats())?);

    let released = runtime.shutdown();
    info!(released, "Closure host exiting");
    Ok(())
}
