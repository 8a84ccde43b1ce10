//! The upcoming event record and its wire codec.
//!
//! An [`Event`] is stored as a JSON object with camel-cased field names so that
//! any producer speaking the same format can write into the store:
//!
//! ```json
//! {
//!   "source": "calendar",
//!   "sourceId": "standup",
//!   "title": "Daily standup",
//!   "invokeManual": "open https://meet.example.com/standup",
//!   "when": "2025-01-01T09:00:00Z"
//! }
//! ```
//!
//! Timestamps are RFC 3339 in UTC with nanosecond precision, so
//! `Event::decode(&event.encode()?)? == event` for every event.
//!
//! # Example
//!
//! ```
//! use upcoming_core::event::Event;
//! use chrono::{Duration, Utc};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event = Event::new("calendar", "standup", "Daily standup", Utc::now() + Duration::minutes(5))
//!     .with_invoke_manual("open https://meet.example.com/standup");
//!
//! let bytes = event.encode()?;
//! assert_eq!(Event::decode(&bytes)?, event);
//! # Ok(())
//! # }
//! ```

use crate::humanize::humanize_duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for encoding and decoding events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to serialize an event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize an event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),
}

/// An upcoming, time-scheduled record identified by `(source, source_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// The producing system (e.g. `"calendar"`).
    pub source: String,

    /// Identifier unique within `source`.
    pub source_id: String,

    /// Human-readable title.
    pub title: String,

    /// A command which does the upcoming thing early instead of waiting.
    ///
    /// Empty when the producer offers no manual action.
    #[serde(default)]
    pub invoke_manual: String,

    /// The moment the event fires.
    pub when: DateTime<Utc>,
}

impl Event {
    /// Create an event with no manual invocation.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        source_id: impl Into<String>,
        title: impl Into<String>,
        when: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            source_id: source_id.into(),
            title: title.into(),
            invoke_manual: String::new(),
            when,
        }
    }

    /// Set the manual invocation command.
    #[must_use]
    pub fn with_invoke_manual(mut self, invoke_manual: impl Into<String>) -> Self {
        self.invoke_manual = invoke_manual.into();
        self
    }

    /// Replace the fire time.
    #[must_use]
    pub const fn with_when(mut self, when: DateTime<Utc>) -> Self {
        self.when = when;
        self
    }

    /// Time left until the event fires. Negative once it has fired.
    #[must_use]
    pub fn time_until(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.when - now
    }

    /// Human-readable time left until the event fires (e.g. `"2d 3h"`).
    #[must_use]
    pub fn humanize_until(&self, now: DateTime<Utc>) -> String {
        humanize_duration(self.time_until(now))
    }

    /// Serialize this event to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SerializationError`] if serialization fails. This
    /// cannot happen for the field types of [`Event`] and indicates a defect.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::DeserializationError`] if the bytes are not an
    /// encoded event (corrupt or foreign value).
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::DeserializationError(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn sample() -> Event {
        Event::new(
            "calendar",
            "standup",
            "Daily standup",
            Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
        )
    }

    #[test]
    fn encodes_camel_case_field_names() {
        let json: serde_json::Value =
            serde_json::from_slice(&sample().with_invoke_manual("open x").encode().unwrap()).unwrap();

        assert_eq!(json["source"], "calendar");
        assert_eq!(json["sourceId"], "standup");
        assert_eq!(json["title"], "Daily standup");
        assert_eq!(json["invokeManual"], "open x");
        assert_eq!(json["when"], "2025-01-01T09:00:00Z");
    }

    #[test]
    fn decodes_value_without_invoke_manual() {
        let bytes = br#"{"source":"test","sourceId":"1","title":"t","when":"2025-01-01T00:00:00Z"}"#;
        let event = Event::decode(bytes).unwrap();
        assert_eq!(event.invoke_manual, "");
        assert_eq!(event.source_id, "1");
    }

    #[test]
    fn decodes_offset_timestamps_into_utc() {
        let bytes =
            br#"{"source":"a","sourceId":"b","title":"c","invokeManual":"","when":"2025-01-01T10:00:00+01:00"}"#;
        let event = Event::decode(bytes).unwrap();
        assert_eq!(event.when, Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn rejects_foreign_values() {
        assert!(matches!(
            Event::decode(b"not json"),
            Err(CodecError::DeserializationError(_))
        ));
        assert!(matches!(
            Event::decode(br#"{"source":"a"}"#),
            Err(CodecError::DeserializationError(_))
        ));
    }

    #[test]
    fn time_until_is_negative_after_firing() {
        let event = sample();
        assert_eq!(event.time_until(event.when + Duration::seconds(3)), Duration::seconds(-3));
        assert_eq!(event.humanize_until(event.when - Duration::hours(26)), "1d 2h");
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            source in "[a-z]{1,12}",
            source_id in "[ -~]{0,24}",
            title in "\\PC{0,40}",
            invoke_manual in "\\PC{0,40}",
            secs in 0i64..4_102_444_800,
            nanos in 0u32..1_000_000_000,
        ) {
            let when = Utc.timestamp_opt(secs, nanos).unwrap();
            let event = Event::new(source, source_id, title, when).with_invoke_manual(invoke_manual);
            let decoded = Event::decode(&event.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded, event);
        }
    }
}
