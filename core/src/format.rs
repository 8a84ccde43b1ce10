//! Tabular rendering of events for terminal listings.

use crate::event::Event;
use chrono::{DateTime, Utc};

/// Render an event as one tab-separated line:
/// `time-left  title  source  source_id  invoke_manual`.
///
/// ```
/// use upcoming_core::event::Event;
/// use upcoming_core::format::format_event;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let event = Event::new("calendar", "42", "Lunch", now + Duration::minutes(90));
/// assert_eq!(format_event(&event, now), "1h 30m\tLunch\tcalendar\t42\t");
/// ```
#[must_use]
pub fn format_event(event: &Event, now: DateTime<Utc>) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        event.humanize_until(now),
        event.title,
        event.source,
        event.source_id,
        event.invoke_manual
    )
}
