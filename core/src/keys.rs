//! Storage key layout.
//!
//! All keys live under a namespace prefix:
//!
//! ```text
//! upcoming/{source}/{source_id}   event value (TTL = time until it fires)
//! upcoming/channel                pub/sub channel carrying updated keys
//! ```
//!
//! Segments are joined verbatim. A `source` or `source_id` containing `/` or a
//! glob character (`*`, `?`, `[`) is not escaped and can widen the list
//! patterns built from it.

/// Namespace prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "upcoming";

/// Separator between key segments.
pub const SEPARATOR: char = '/';

/// Trailing wildcard used in list patterns.
pub const WILDCARD: char = '*';

/// Name of the notification channel under the prefix.
pub const CHANNEL_SEGMENT: &str = "channel";

/// Build the storage key for one event.
///
/// ```
/// use upcoming_core::keys::key_for;
///
/// assert_eq!(key_for("upcoming", "calendar", "42"), "upcoming/calendar/42");
/// ```
#[must_use]
pub fn key_for(prefix: &str, source: &str, source_id: &str) -> String {
    format!("{prefix}{SEPARATOR}{source}{SEPARATOR}{source_id}")
}

/// Build the pattern matching every event, or every event of one source.
///
/// ```
/// use upcoming_core::keys::list_key_pattern;
///
/// assert_eq!(list_key_pattern("upcoming", None), "upcoming/*");
/// assert_eq!(list_key_pattern("upcoming", Some("calendar")), "upcoming/calendar/*");
/// ```
#[must_use]
pub fn list_key_pattern(prefix: &str, source: Option<&str>) -> String {
    match source {
        Some(source) => format!("{prefix}{SEPARATOR}{source}{SEPARATOR}{WILDCARD}"),
        None => format!("{prefix}{SEPARATOR}{WILDCARD}"),
    }
}

/// Build the notification channel name.
#[must_use]
pub fn channel_key(prefix: &str) -> String {
    format!("{prefix}{SEPARATOR}{CHANNEL_SEGMENT}")
}

/// Key builder bound to one namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
    channel: String,
}

impl KeySpace {
    /// Create a key space rooted at `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let channel = channel_key(&prefix);
        Self { prefix, channel }
    }

    /// The namespace prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The notification channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Storage key for one event.
    #[must_use]
    pub fn key_for(&self, source: &str, source_id: &str) -> String {
        key_for(&self.prefix, source, source_id)
    }

    /// List pattern for all events, or the events of one source.
    #[must_use]
    pub fn list_pattern(&self, source: Option<&str>) -> String {
        list_key_pattern(&self.prefix, source)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
