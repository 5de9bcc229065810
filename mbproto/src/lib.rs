//! Fieldbus message codecs over a concurrently accessible data table.
//!
//! # Features
//!
//! * Modbus/TCP server and client sessions over any tokio transport
//! * Modbus-REST XML codecs for both sides of an HTTP layer
//! * EtherSBus/SAIA codecs with a UDP server and client over the SBus table
//! * Address validation for Modbus and EtherSBus/SAIA address types
//! * In-memory data tables shared between tasks, with 32-bit, float,
//!   double and string views over register cells
//! * Panic-free parsing
//!
//! # Supported Functions
//!
//! * Read Coils
//! * Read Discrete Inputs
//! * Read Holding Registers
//! * Read Input Registers
//! * Write Single Coil
//! * Write Single Register
//! * Write Multiple Coils
//! * Write Multiple Registers
//!
//! # Example
//!
//! A server that also reads back what it serves:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use mbproto::client::ClientSession;
//! use mbproto::server::spawn_tcp_server_task;
//! use mbproto::table::ModbusMemory;
//! use mbproto::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let limits = AddressLimits::default();
//!     let memory = ModbusMemory::new(&limits);
//!     memory.holding_registers().set_float32(100, 3.5)?;
//!
//!     let server = spawn_tcp_server_task(
//!         10,
//!         "127.0.0.1:502".parse()?,
//!         memory,
//!         limits,
//!         DecodeLevel::default(),
//!     )
//!     .await?;
//!
//!     let mut client = ClientSession::connect(
//!         server.local_addr(),
//!         UnitId::new(1),
//!         Duration::from_secs(1),
//!         AppDecodeLevel::DataValues.into(),
//!     )
//!     .await?;
//!
//!     println!("{}", client.read_holding_float32(100).await?);
//!     Ok(())
//! }
//! ```

/// Address types and per-type maxima
pub mod address;
/// Modbus/TCP and Modbus-REST client sessions
pub mod client;
/// Controls the decoding of transmitted and received data
pub(crate) mod decode;
/// Modbus-REST codecs
pub mod rest;
/// EtherSBus codecs, the UDP server task and a UDP client
pub mod sbus;
/// Modbus/TCP server sessions, the TCP server task and the REST adapter
pub mod server;
/// Shared data tables and their extended value views
pub mod table;
/// Modbus/TCP codecs and MBAP framing
pub mod tcp;

pub(crate) mod common;
pub(crate) mod constants;
pub(crate) mod error;
pub(crate) mod exception;
pub(crate) mod message;
pub(crate) mod types;

pub use crate::address::{AddressLimits, AddressType};
pub use crate::common::bits::{pack_bits, unpack_bits};
pub use crate::common::function::FunctionCode;
pub use crate::decode::*;
pub use crate::error::*;
pub use crate::exception::*;
pub use crate::message::*;
pub use crate::types::*;
