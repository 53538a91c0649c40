//! Protocol implementation module
//!
//! This module defines the apcupsd NIS wire framing: a request is a single
//! length-prefixed command, a response is a sequence of length-prefixed
//! text lines.

pub mod codec;

pub use self::codec::{encode_command, Frame, FrameCodec};

// Constants
/// Maximum payload bytes kept from a single response frame
pub const MAX_FRAME_SIZE: usize = 255;

/// Size of the big-endian length prefix
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Command requesting the status report
pub const STATUS_COMMAND: &str = "status";

/// Command requesting the recent event log
pub const EVENTS_COMMAND: &str = "events";
