pub(crate) mod rest;
pub(crate) mod session;

pub use rest::*;
pub use session::*;
