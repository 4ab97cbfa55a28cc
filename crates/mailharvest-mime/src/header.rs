//! MIME header handling.

use crate::encoding::encode_rfc2047;
use crate::error::{Error, Result};
use std::fmt;

/// Ordered collection of message headers.
///
/// Headers are written in insertion order so that rendering the same
/// message twice produces identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header value, replacing an existing header with the same name
    /// (compared case-insensitively) in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid field name or the value
    /// contains a line break.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = canonical_name(&name.into())?;
        let value = value.into();
        if value.contains(['\r', '\n']) {
            return Err(Error::HeaderInjection(name));
        }

        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
        Ok(())
    }

    /// Sets a free-text header value, applying RFC 2047 encoding when the
    /// value is not plain ASCII. Line breaks are collapsed to spaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid field name.
    pub fn set_text(&mut self, name: impl Into<String>, value: &str) -> Result<()> {
        let flattened = value
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        self.set(name, encode_rfc2047(&flattened))
    }

    /// Gets the value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Validates a field name and capitalizes it (e.g., "content-type" -> "Content-Type").
fn canonical_name(name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| (b'!'..=b'~').contains(&b) && b != b':');
    if !valid {
        return Err(Error::InvalidHeaderName(name.to_string()));
    }

    Ok(name
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join("-"))
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_set_get_case_insensitive() {
        let mut headers = Headers::new();
        headers.set("content-type", "text/plain").unwrap();
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn test_headers_set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.set("Subject", "first").unwrap();
        headers.set("From", "a@example.com").unwrap();
        headers.set("subject", "second").unwrap();

        assert_eq!(headers.len(), 2);
        let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Subject", "From"]);
        assert_eq!(headers.get("Subject"), Some("second"));
    }

    #[test]
    fn test_headers_reject_line_break() {
        let mut headers = Headers::new();
        let err = headers.set("Subject", "a\r\nBcc: evil@example.com");
        assert!(matches!(err, Err(Error::HeaderInjection(_))));
    }

    #[test]
    fn test_headers_reject_bad_name() {
        let mut headers = Headers::new();
        assert!(headers.set("Bad Name", "x").is_err());
        assert!(headers.set("", "x").is_err());
    }

    #[test]
    fn test_set_text_flattens_and_encodes() {
        let mut headers = Headers::new();
        headers.set_text("Subject", "Line one\n  line two").unwrap();
        assert_eq!(headers.get("Subject"), Some("Line one line two"));

        headers.set_text("Subject", "Grüße").unwrap();
        assert!(headers.get("Subject").unwrap().starts_with("=?utf-8?B?"));
    }

    #[test]
    fn test_headers_display_order_and_crlf() {
        let mut headers = Headers::new();
        headers.set("subject", "Test").unwrap();
        headers.set("from", "sender@example.com").unwrap();

        assert_eq!(
            headers.to_string(),
            "Subject: Test\r\nFrom: sender@example.com\r\n"
        );
    }
}
