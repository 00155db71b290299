//! # Temporal Types: Epoch-Millisecond Timestamps
//!
//! `Timestamp` is the capture time recorded in `truth.timestamp`. It is a
//! count of milliseconds since the Unix epoch and serializes as a bare JSON
//! integer, so canonical output never depends on a time zone or on a
//! date-string format.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds since 1970-01-01T00:00:00Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The current UTC time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Wrap a raw millisecond count.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Return the raw millisecond count.
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Convert to a `chrono::DateTime<Utc>`, if the value is in range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
            None => write!(f, "{}ms", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_integer() {
        let ts = Timestamp::from_millis(1_605_013_246_680);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1605013246680");
        let back: Timestamp = serde_json::from_str("1605013246680").unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(Timestamp::now().as_millis() > 1_577_836_800_000);
    }

    #[test]
    fn display_is_rfc3339_utc() {
        let ts = Timestamp::from_millis(0);
        assert_eq!(ts.to_string(), "1970-01-01T00:00:00.000Z");
    }
}
