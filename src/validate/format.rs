//! Fixed-grammar format matchers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Named value formats accepted by the `format` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Email,
    Url,
    Ipv4,
    Uuid,
    Date,
    Time,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Url => "url",
            Self::Ipv4 => "ipv4",
            Self::Uuid => "uuid",
            Self::Date => "date",
            Self::Time => "time",
        }
    }

    /// Check a string value against this format.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Email => email_regex().is_match(value),
            Self::Url => match url::Url::parse(value) {
                Ok(parsed) => !parsed.scheme().is_empty(),
                Err(_) => false,
            },
            Self::Ipv4 => value.parse::<std::net::Ipv4Addr>().is_ok(),
            Self::Uuid => uuid::Uuid::parse_str(value).is_ok(),
            Self::Date => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
            Self::Time => {
                chrono::NaiveTime::parse_from_str(value, "%H:%M:%S").is_ok()
                    || chrono::NaiveTime::parse_from_str(value, "%H:%M").is_ok()
            }
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        // Pragmatic address grammar: local part, one @, dotted domain.
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$")
            .expect("email pattern is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(Format::Email.matches("a@b.com"));
        assert!(Format::Email.matches("first.last+tag@sub.example.org"));
        assert!(!Format::Email.matches("bad"));
        assert!(!Format::Email.matches("no@tld"));
        assert!(!Format::Email.matches("two@@example.com"));
    }

    #[test]
    fn test_url() {
        assert!(Format::Url.matches("https://example.com/path?q=1"));
        assert!(Format::Url.matches("postgres://localhost:5432/db"));
        assert!(!Format::Url.matches("not a url"));
    }

    #[test]
    fn test_ipv4() {
        assert!(Format::Ipv4.matches("192.168.0.1"));
        assert!(!Format::Ipv4.matches("256.1.1.1"));
        assert!(!Format::Ipv4.matches("1.2.3"));
    }

    #[test]
    fn test_uuid() {
        assert!(Format::Uuid.matches("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!Format::Uuid.matches("550e8400"));
    }

    #[test]
    fn test_date() {
        assert!(Format::Date.matches("2024-02-29"));
        assert!(!Format::Date.matches("2023-02-29"));
        assert!(!Format::Date.matches("02/29/2024"));
    }

    #[test]
    fn test_time() {
        assert!(Format::Time.matches("23:59:59"));
        assert!(Format::Time.matches("09:30"));
        assert!(!Format::Time.matches("25:00"));
    }
}
