//! Network module
//!
//! This module owns the connection lifecycle for requests to apcupsd: one
//! fresh TCP connection per request, bounded by the caller's deadline and
//! closed as soon as the response has been read.

mod client;

pub use self::client::NisClient;
