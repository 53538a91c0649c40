//! Core types for the apcmetrics client
//!
//! This module contains the error type, connection configuration and
//! build information shared by the rest of the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{BuildInfo, Config};

/// Default port of the apcupsd NIS server
pub const DEFAULT_PORT: u16 = 3551;
