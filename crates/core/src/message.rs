//! Historical message type.
//!
//! A `HistoricalMessage` is one line of channel history fetched from the
//! chat platform to ground a generated reply. Author and text are optional
//! because platforms omit them for some message kinds (joins, files, bots).

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A message previously posted to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMessage {
    /// Platform user ID or display name of the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// The text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// When the message was posted
    pub timestamp: DateTime<Utc>,
}

impl HistoricalMessage {
    /// Create a message with both author and text present.
    pub fn new(
        author: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            author: Some(author.into()),
            text: Some(text.into()),
            timestamp,
        }
    }
}

/// Convert fractional epoch seconds (e.g. Slack's `"1700000000.000100"` ts)
/// into a UTC timestamp.
pub fn timestamp_from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_secs_conversion() {
        let ts = timestamp_from_epoch_secs(1.5).unwrap();
        assert_eq!(ts.timestamp(), 1);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn non_finite_epoch_rejected() {
        assert!(timestamp_from_epoch_secs(f64::NAN).is_none());
        assert!(timestamp_from_epoch_secs(f64::INFINITY).is_none());
    }

    #[test]
    fn missing_fields_deserialize_as_none() {
        let msg: HistoricalMessage =
            serde_json::from_str(r#"{"timestamp":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert!(msg.author.is_none());
        assert!(msg.text.is_none());
    }
}
