//! Decoders for apcupsd responses
//!
//! Both decoders are pure functions of the raw lines returned by the
//! client: the same lines always produce the same record or the same error.

mod event;
mod status;
pub mod value;

pub use self::event::{decode_events, UpsEvent, EVENT_SEPARATOR};
pub use self::status::{decode_status, Percent, UpsStatus, Voltage, Wattage};
