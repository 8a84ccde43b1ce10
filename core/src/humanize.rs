//! Human-readable rendering of the time left until an event fires.

use chrono::Duration;
use std::fmt::Write;

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// `(length in ms, short suffix, long name)`, largest first.
const UNITS: [(i64, &str, &str); 5] = [
    (WEEK_MS, "w", "week"),
    (DAY_MS, "d", "day"),
    (HOUR_MS, "h", "hour"),
    (MINUTE_MS, "m", "minute"),
    (SECOND_MS, "s", "second"),
];

/// Options controlling [`humanize_duration_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanizeOptions {
    /// Durations below this render as `"now"`.
    pub now_threshold: Duration,
    /// `2d 3h` when true, `2 days 3 hours` when false.
    pub short: bool,
    /// Maximum number of units rendered. `0` renders every unit.
    pub resolution: usize,
}

impl Default for HumanizeOptions {
    fn default() -> Self {
        Self {
            now_threshold: Duration::seconds(5),
            short: true,
            resolution: 2,
        }
    }
}

/// Render a duration with the default [`HumanizeOptions`].
///
/// # Example
///
/// ```
/// use upcoming_core::humanize::humanize_duration;
/// use chrono::Duration;
///
/// assert_eq!(humanize_duration(Duration::hours(200)), "1w 1d");
/// assert_eq!(humanize_duration(Duration::seconds(2)), "now");
/// ```
#[must_use]
pub fn humanize_duration(duration: Duration) -> String {
    humanize_duration_with(duration, &HumanizeOptions::default())
}

/// Render a duration as its largest units.
///
/// A unit is rendered once the whole duration exceeds it, so a count of zero
/// can appear for the second unit (`"1d 0h"` for a day and five minutes).
#[must_use]
pub fn humanize_duration_with(duration: Duration, options: &HumanizeOptions) -> String {
    if duration < options.now_threshold {
        return "now".to_string();
    }

    let mut remaining = duration;
    let mut rendered = 0;
    let mut out = String::new();

    for (unit_ms, short, long) in UNITS {
        let unit = Duration::milliseconds(unit_ms);
        if duration > unit {
            let count = remaining.num_milliseconds() / unit_ms;
            remaining = remaining - Duration::milliseconds(count * unit_ms);
            let delim = if out.is_empty() { "" } else { " " };
            // Writing to a String cannot fail.
            let _ = if options.short {
                write!(out, "{delim}{count}{short}")
            } else {
                let plural = if count > 1 { "s" } else { "" };
                write!(out, "{delim}{count} {long}{plural}")
            };
            rendered += 1;
        }
        if options.resolution != 0 && rendered == options.resolution {
            break;
        }
    }

    out
}
