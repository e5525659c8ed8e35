//! Conversion of instants into the millisecond timestamps the server expects.
//!
//! The server takes upload timestamps as milliseconds since the Unix epoch.
//! Conversion works on the absolute instant of a `DateTime<Tz>`, so the
//! result never depends on the timezone of the machine running the client.
//!
//! Only whole seconds are kept: the sub-second part is truncated toward zero
//! and then multiplied by 1000. Two instants within the same second therefore
//! map to the same timestamp. This is a known precision loss that callers
//! uploading several times per second need to account for.

use chrono::{DateTime, TimeZone, Utc};

/// Milliseconds since the epoch, truncated to the whole second.
pub fn to_epoch_millis<Tz: TimeZone>(instant: &DateTime<Tz>) -> i64 {
    let mut seconds = instant.timestamp();
    // chrono floors toward negative infinity; pull pre-epoch values back up.
    if seconds < 0 && instant.timestamp_subsec_nanos() > 0 {
        seconds += 1;
    }
    seconds * 1000
}

/// The instant `millis` milliseconds after the epoch, if representable.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Value of the `t` query parameter: `"{ms}"`, or `"{branch}:{ms}"` when
/// uploading to a specific branch.
pub fn timestamp_parameter<Tz: TimeZone>(instant: &DateTime<Tz>, branch: Option<&str>) -> String {
    let millis = to_epoch_millis(instant);
    match branch {
        Some(branch) => format!("{branch}:{millis}"),
        None => millis.to_string(),
    }
}
