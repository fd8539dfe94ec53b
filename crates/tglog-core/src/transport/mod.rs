//! The HTTP seam: request/response shapes and the transport port.

pub mod port;
pub mod types;
