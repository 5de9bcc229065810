//! EtherSBus telegrams over UDP
//!
//! Every telegram starts with a 32-bit length counting the whole telegram,
//! a version and protocol type of zero, a 16-bit sequence and the telegram
//! attribute. Requests continue with the station and command. Every telegram
//! ends with a CRC-16 over all preceding bytes.

pub mod client;
pub mod codec;
pub(crate) mod frame;
pub mod server;

pub use client::SBusClient;
pub use codec::*;
pub use frame::{SBusHeader, TelegramType};
pub use server::{spawn_udp_server_task, SBusServer};
