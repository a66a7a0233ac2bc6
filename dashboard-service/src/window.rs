use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

/// Errors produced while interpreting a caller-supplied date range.
#[derive(Debug, Error)]
pub enum RangeError {
    #[error("unknown range key '{0}' (expected 24h, 7d or 30d)")]
    UnknownKey(String),
    #[error("unparseable RFC 3339 timestamp '{0}'")]
    BadTimestamp(String),
    #[error("custom range needs both start and end")]
    MissingBound,
    #[error("range start {start} is after end {end}")]
    Inverted {
        start: OffsetDateTime,
        end: OffsetDateTime,
    },
}

/// A chart or leaderboard time window: one of the three presets, or an
/// explicit `[start, end]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateRange {
    Last24h,
    Last7d,
    Last30d,
    Custom {
        #[serde(with = "time::serde::rfc3339")]
        start: OffsetDateTime,
        #[serde(with = "time::serde::rfc3339")]
        end: OffsetDateTime,
    },
}

impl Default for DateRange {
    fn default() -> Self {
        DateRange::Last24h
    }
}

impl DateRange {
    /// Interprets the query-string form: a preset key (`24h`, `7d`, `30d`,
    /// missing means `24h`) or an explicit `start`/`end` pair. A pair wins
    /// over the key.
    pub fn parse(
        range: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Self, RangeError> {
        match (start, end) {
            (Some(s), Some(e)) => Self::custom(parse_ts(s)?, parse_ts(e)?),
            (Some(_), None) | (None, Some(_)) => Err(RangeError::MissingBound),
            (None, None) => match range.unwrap_or("24h") {
                "24h" => Ok(DateRange::Last24h),
                "7d" => Ok(DateRange::Last7d),
                "30d" => Ok(DateRange::Last30d),
                other => Err(RangeError::UnknownKey(other.to_string())),
            },
        }
    }

    pub fn custom(start: OffsetDateTime, end: OffsetDateTime) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Inverted { start, end });
        }
        Ok(DateRange::Custom { start, end })
    }

    /// Re-checks the inversion invariant on ranges that arrived through
    /// deserialization rather than [`DateRange::custom`].
    pub fn validate(&self) -> Result<(), RangeError> {
        match *self {
            DateRange::Custom { start, end } if start > end => {
                Err(RangeError::Inverted { start, end })
            }
            _ => Ok(()),
        }
    }

    /// The window endpoints, with presets anchored at `now`.
    pub fn window(&self, now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
        match *self {
            DateRange::Last24h => (now - Duration::hours(24), now),
            DateRange::Last7d => (now - Duration::days(7), now),
            DateRange::Last30d => (now - Duration::days(30), now),
            DateRange::Custom { start, end } => (start, end),
        }
    }

    /// Window length in hours. Feeds the capacity-factor denominator.
    pub fn hours(&self) -> f64 {
        match *self {
            DateRange::Last24h => 24.0,
            DateRange::Last7d => 168.0,
            DateRange::Last30d => 720.0,
            DateRange::Custom { start, end } => (end - start).as_seconds_f64() / 3600.0,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            DateRange::Last24h => "24h",
            DateRange::Last7d => "7d",
            DateRange::Last30d => "30d",
            DateRange::Custom { .. } => "custom",
        }
    }
}

fn parse_ts(s: &str) -> Result<OffsetDateTime, RangeError> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|_| RangeError::BadTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn preset_hours() {
        assert_eq!(DateRange::Last24h.hours(), 24.0);
        assert_eq!(DateRange::Last7d.hours(), 168.0);
        assert_eq!(DateRange::Last30d.hours(), 720.0);
    }

    #[test]
    fn preset_window_is_anchored_at_now() {
        let now = datetime!(2025-06-01 12:00:00 UTC);
        let (from, to) = DateRange::Last24h.window(now);
        assert_eq!(to, now);
        assert_eq!(from, datetime!(2025-05-31 12:00:00 UTC));
    }

    #[test]
    fn parse_accepts_preset_keys_and_defaults_to_24h() {
        assert_eq!(
            DateRange::parse(Some("7d"), None, None).unwrap(),
            DateRange::Last7d
        );
        assert_eq!(
            DateRange::parse(None, None, None).unwrap(),
            DateRange::Last24h
        );
        assert!(matches!(
            DateRange::parse(Some("1y"), None, None),
            Err(RangeError::UnknownKey(_))
        ));
    }

    #[test]
    fn parse_builds_custom_range_from_bounds() {
        let range = DateRange::parse(
            None,
            Some("2025-06-01T00:00:00Z"),
            Some("2025-06-02T12:00:00Z"),
        )
        .unwrap();
        assert_eq!(range.hours(), 36.0);
        assert_eq!(range.key(), "custom");
    }

    #[test]
    fn inverted_custom_range_is_rejected() {
        let err = DateRange::parse(
            None,
            Some("2025-06-02T00:00:00Z"),
            Some("2025-06-01T00:00:00Z"),
        )
        .unwrap_err();
        assert!(matches!(err, RangeError::Inverted { .. }));
    }

    #[test]
    fn lone_bound_is_rejected() {
        assert!(matches!(
            DateRange::parse(None, Some("2025-06-01T00:00:00Z"), None),
            Err(RangeError::MissingBound)
        ));
    }
}
