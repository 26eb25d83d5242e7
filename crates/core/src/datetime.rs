// Datetime parsing
//
// Event times arrive as text in one of two shapes: ISO-8601 extended
// (optionally with an offset or a trailing `Z`) or the fixed legacy pattern
// `YYYY-MM-DD HH:MM:SS`. Everything is normalized to UTC here so the rest of
// the crate only ever compares `DateTime<Utc>` values.
//
// Decision: text without an offset is read as UTC

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// ISO-8601 layouts carrying an explicit offset.
const ISO_OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
];

/// ISO-8601 layouts without an offset.
const ISO_NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// The fixed fallback layout (no fractional seconds, no offset).
pub const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse event time text into a UTC instant.
///
/// Tries ISO-8601 first, then [`LEGACY_FORMAT`]. Returns `None` when neither
/// strategy accepts the whole input.
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    parse_iso8601(text).or_else(|| parse_legacy(text))
}

/// Render an instant as ISO-8601 text that [`parse_datetime`] reads back.
pub fn format_datetime(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    let normalized = normalize_iso(text)?;

    for format in ISO_OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in ISO_NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Rewrite a trailing `Z` as `+00:00` and accept a space in place of `T`.
fn normalize_iso(text: &str) -> Option<String> {
    let mut normalized = match text.strip_suffix('Z') {
        Some(rest) => format!("{rest}+00:00"),
        None => text.to_string(),
    };

    // Byte 10 separates the date from the time; must be ASCII to be replaced
    if normalized.len() > 10 {
        if !normalized.is_char_boundary(10) || !normalized.is_char_boundary(11) {
            return None;
        }
        if &normalized[10..11] == " " {
            normalized.replace_range(10..11, "T");
        }
    }

    Some(normalized)
}

fn parse_legacy(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, LEGACY_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serde adapter for instants: writes [`format_datetime`], reads with
/// [`parse_datetime`] so files written by older versions keep loading.
pub mod serde_iso {
    use super::{format_datetime, parse_datetime};
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_datetime(instant))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        parse_datetime(&text)
            .ok_or_else(|| de::Error::custom(format!("not a valid datetime: {text:?}")))
    }

    /// Same as the parent module for `Option<DateTime<Utc>>`.
    pub mod option {
        use super::super::{format_datetime, parse_datetime};
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(
            instant: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match instant {
                Some(instant) => serializer.serialize_str(&format_datetime(instant)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(text) => parse_datetime(&text)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("not a valid datetime: {text:?}"))),
                None => Ok(None),
            }
        }
    }
}
