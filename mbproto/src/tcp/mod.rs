pub(crate) mod frame;

/// Modbus/TCP request and response codecs
pub mod codec;

pub use frame::{MbapHeader, TxId};
