//! Wire-facing payload types shared by the WebSocket and REST surfaces.

use std::time::SystemTime;

use time::OffsetDateTime;

pub mod chat;
pub mod health;
pub mod poll;
pub mod student;
pub mod validation;
pub mod ws;

/// Convert an instant to epoch milliseconds, the wire format for timestamps.
pub(crate) fn epoch_ms(time: SystemTime) -> i64 {
    (OffsetDateTime::from(time).unix_timestamp_nanos() / 1_000_000) as i64
}
