//! # String Formats
//!
//! The `format` keyword values the certificate rule set uses. An unknown
//! format name fails compilation rather than being silently ignored.

use chrono::{DateTime, NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// A supported `format` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// RFC 3339 `full-date`.
    Date,
    /// RFC 3339 `date-time`.
    DateTime,
    /// RFC 3339 `full-time`.
    Time,
    Email,
    /// Absolute URI.
    Uri,
}

impl Format {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "date" => Some(Self::Date),
            "date-time" => Some(Self::DateTime),
            "time" => Some(Self::Time),
            "email" => Some(Self::Email),
            "uri" => Some(Self::Uri),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::DateTime => "date-time",
            Self::Time => "time",
            Self::Email => "email",
            Self::Uri => "uri",
        }
    }

    /// Whether `text` conforms to the format.
    pub fn accepts(&self, text: &str) -> bool {
        match self {
            Self::Date => is_full_date(text),
            Self::DateTime => DateTime::parse_from_rfc3339(text).is_ok(),
            Self::Time => is_full_time(text),
            Self::Email => email_regex().is_match(text),
            Self::Uri => Url::parse(text).is_ok(),
        }
    }
}

fn is_full_date(text: &str) -> bool {
    // chrono accepts signed and unpadded years; RFC 3339 does not.
    text.len() == 10
        && text.as_bytes()[4] == b'-'
        && text.as_bytes()[7] == b'-'
        && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

fn is_full_time(text: &str) -> bool {
    let (clock, offset) = match text.find(|c| c == 'Z' || c == 'z' || c == '+' || c == '-') {
        Some(at) => text.split_at(at),
        None => return false,
    };
    let offset_ok = matches!(offset, "Z" | "z") || offset_regex().is_match(offset);
    offset_ok
        && clock.len() >= 8
        && NaiveTime::parse_from_str(clock, "%H:%M:%S%.f").is_ok()
}

fn offset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]([01][0-9]|2[0-3]):[0-5][0-9]$").expect("offset pattern is a valid regex")
    })
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("email pattern is a valid regex")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for name in ["date", "date-time", "time", "email", "uri"] {
            assert_eq!(Format::parse(name).unwrap().as_str(), name);
        }
        assert!(Format::parse("hostname").is_none());
    }

    #[test]
    fn date() {
        assert!(Format::Date.accepts("2022-03-31"));
        assert!(!Format::Date.accepts("2022-02-30"));
        assert!(!Format::Date.accepts("2022-3-31"));
        assert!(!Format::Date.accepts("31.03.2022"));
    }

    #[test]
    fn date_time() {
        assert!(Format::DateTime.accepts("2022-03-31T10:15:00Z"));
        assert!(Format::DateTime.accepts("2022-03-31T10:15:00.250+02:00"));
        assert!(!Format::DateTime.accepts("2022-03-31 10:15"));
    }

    #[test]
    fn time() {
        assert!(Format::Time.accepts("10:15:00Z"));
        assert!(Format::Time.accepts("23:59:59.5+01:00"));
        assert!(!Format::Time.accepts("10:15:00"));
        assert!(!Format::Time.accepts("25:00:00Z"));
    }

    #[test]
    fn email() {
        assert!(Format::Email.accepts("qa@steelworks.example"));
        assert!(!Format::Email.accepts("qa.steelworks.example"));
        assert!(!Format::Email.accepts("qa@"));
    }

    #[test]
    fn uri() {
        assert!(Format::Uri.accepts(
            "https://schemas.s1seven.com/en10168-schemas/v0.1.0/schema.json"
        ));
        assert!(!Format::Uri.accepts("schema.json"));
    }
}
