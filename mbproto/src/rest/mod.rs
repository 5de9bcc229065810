//! Modbus-REST: Modbus requests carried as HTTP GET/POST with XML bodies
//!
//! Only the message layer is provided. The HTTP transport is supplied by the
//! caller, see [`crate::client::RestTransport`].

pub(crate) mod data;

/// Modbus-REST request and response codecs
pub mod codec;

pub use codec::*;
