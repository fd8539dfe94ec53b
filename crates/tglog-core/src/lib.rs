//! Core of the Telegram log forwarder.
//!
//! Records are formatted to Telegram HTML, routed per category, chunked to
//! Bot API limits and posted through the [`transport::port::ApiTransport`]
//! port. The HTTP client lives in an adapter crate.

pub mod bot;
pub mod chunking;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logger;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod routing;
pub mod target;
pub mod trace_file;
pub mod transport;

pub use errors::{Error, Result};
