//! Duration arguments.
//!
//! Durations are written as a sequence of decimal numbers with unit suffixes,
//! such as `90s`, `1h30m`, `1.5h` or `200ms`. Valid units are `ns`, `us`
//! (or `µs`), `ms`, `s`, `m` and `h`. A bare `0` is also accepted.

use chrono::{DateTime, Days, TimeZone};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Nanoseconds per unit, longest suffixes first so `ms` wins over `m`.
const UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("ms", 1_000_000),
    ("h", 3_600_000_000_000),
    ("m", 60_000_000_000),
    ("s", 1_000_000_000),
];

/// Errors from parsing a duration argument.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    /// The input was empty.
    #[error("empty duration")]
    Empty,

    /// A negative duration was given.
    #[error("duration must not be negative: {0:?}")]
    Negative(String),

    /// The input is not a number followed by a unit.
    #[error("invalid duration {0:?}")]
    Invalid(String),

    /// A number was given without a unit.
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    /// A unit suffix is not one of the known units.
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit {
        /// The unrecognised suffix.
        unit: String,
        /// The full input.
        input: String,
    },

    /// The duration does not fit in a [`Duration`].
    #[error("duration {0:?} is out of range")]
    Overflow(String),
}

/// Parse a duration such as `1h30m` or `1.5s`.
///
/// # Errors
///
/// Returns a [`DurationParseError`] describing the first problem found.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let original = input;
    let mut rest = input.trim();

    if rest.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if let Some(stripped) = rest.strip_prefix('-') {
        if stripped.trim_start_matches(['0', '.']).is_empty() || stripped == "0" {
            return Ok(Duration::ZERO);
        }
        return Err(DurationParseError::Negative(original.to_string()));
    }
    rest = rest.strip_prefix('+').unwrap_or(rest);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || DurationParseError::Invalid(original.to_string());
    let overflow = || DurationParseError::Overflow(original.to_string());
    let mut total: u128 = 0;

    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (int_part, after_int) = rest.split_at(int_len);

        let (frac_part, after_number) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                after_dot.split_at(frac_len)
            }
            None => ("", after_int),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = after_number
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_number.len());
        let (unit, remainder) = after_number.split_at(unit_len);
        if unit.is_empty() {
            return Err(DurationParseError::MissingUnit(original.to_string()));
        }
        let scale = UNITS
            .iter()
            .find(|(suffix, _)| *suffix == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| DurationParseError::UnknownUnit {
                unit: unit.to_string(),
                input: original.to_string(),
            })?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;

        // Digits past nanosecond precision are dropped.
        let mut place = scale;
        for digit in frac_part.bytes() {
            place /= 10;
            if place == 0 {
                break;
            }
            nanos += u128::from(digit - b'0') * place;
        }

        total = total.checked_add(nanos).ok_or_else(overflow)?;
        rest = remainder;
    }

    let secs = u64::try_from(total / 1_000_000_000).map_err(|_| overflow())?;
    #[allow(clippy::cast_possible_truncation)]
    let subsec = (total % 1_000_000_000) as u32;
    Ok(Duration::new(secs, subsec))
}

/// Time from `now` until the next midnight in `now`'s time zone.
///
/// Returns `None` if that midnight does not exist, which can only happen
/// when a time zone transition skips it.
pub fn until_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<Duration> {
    let tomorrow = now.date_naive().checked_add_days(Days::new(1))?;
    let midnight = now
        .timezone()
        .from_local_datetime(&tomorrow.and_hms_opt(0, 0, 0)?)
        .earliest()?;
    (midnight - now.clone()).to_std().ok()
}

/// The `--within` argument: a duration, or `today` for "until midnight".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Within {
    /// A fixed horizon.
    Duration(Duration),
    /// Until the next local midnight.
    Today,
}

impl Within {
    /// Resolve to a concrete horizon measured from `now`.
    pub fn resolve<Tz: TimeZone>(self, now: &DateTime<Tz>) -> Option<Duration> {
        match self {
            Self::Duration(duration) => Some(duration),
            Self::Today => until_midnight(now),
        }
    }
}

impl FromStr for Within {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("today") {
            Ok(Self::Today)
        } else {
            parse_duration(s).map(Self::Duration)
        }
    }
}
