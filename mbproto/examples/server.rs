//! Modbus/TCP server over a shared memory map
//!
//! Usage: `server [ADDR] [LIMITS.json]`. The optional limits document overrides
//! only the address types it names, e.g. `{ "holdingreg": 65535 }`.

use std::time::Duration;

use mbproto::server::spawn_tcp_server_task;
use mbproto::table::ModbusMemory;
use mbproto::*;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:502".to_string());
    let limits: AddressLimits = match args.next() {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => AddressLimits::default(),
    };

    let memory = ModbusMemory::new(&limits);
    memory.input_registers().set_float32(0, 3.5)?;
    memory
        .input_registers()
        .set_string_packed(10, 16, "mbproto")?;

    let _server = spawn_tcp_server_task(
        10,
        addr.parse()?,
        memory.clone(),
        limits,
        DecodeLevel::default().application(AppDecodeLevel::DataValues),
    )
    .await?;

    // a counter in input register 100 and a toggling discrete input 0
    let mut count: u16 = 0;
    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        count = count.wrapping_add(1);
        memory.inputs().set_word(100, count)?;
        memory.inputs().set_bool(0, count % 2 == 1)?;
    }
}
