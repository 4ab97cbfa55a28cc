//! MIME message structure and generation.

use crate::content_type::ContentType;
use crate::encoding::encode_quoted_printable;
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Boundary used when the caller does not supply one.
const DEFAULT_BOUNDARY: &str = "=_mailharvest_alt";

/// Characters allowed in a boundary (RFC 2046 `bchars`).
const BOUNDARY_SPECIALS: &str = "'()+_,-./:=? ";

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// Quoted-Printable encoding.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Picks the cheapest encoding that is safe for the given text.
    #[must_use]
    pub fn for_text(text: &str) -> Self {
        let plain = text.is_ascii()
            && text
                .split('\n')
                .all(|line| line.trim_end_matches('\r').len() <= 76 && !line.ends_with(' '));
        if plain { Self::SevenBit } else { Self::QuotedPrintable }
    }

    /// Encodes text with this transfer encoding.
    #[must_use]
    pub fn encode(self, text: &str) -> String {
        match self {
            Self::SevenBit => text.replace("\r\n", "\n").replace('\n', "\r\n"),
            Self::QuotedPrintable => encode_quoted_printable(text),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

/// MIME message part with an already-encoded body.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Encoded part body.
    pub body: String,
}

impl Part {
    /// Builds a text part of the given content type.
    fn text(content_type: &ContentType, text: &str) -> Result<Self> {
        let encoding = TransferEncoding::for_text(text);
        let mut headers = Headers::new();
        headers.set("Content-Type", content_type.to_string())?;
        headers.set("Content-Transfer-Encoding", encoding.to_string())?;
        Ok(Self {
            headers,
            body: encoding.encode(text),
        })
    }
}

/// A complete MIME message ready to be written out.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Message parts (empty for single-part messages).
    pub parts: Vec<Part>,
    /// Encoded body for single-part messages.
    pub body: Option<String>,
    boundary: Option<String>,
}

impl Message {
    /// Checks if this is a multipart message.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        !self.parts.is_empty()
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the multipart boundary, if any.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    /// Renders the message with CRLF line endings.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", self.headers)?;

        match (&self.boundary, &self.body) {
            (Some(boundary), _) => {
                write!(f, "This is a multi-part message in MIME format.\r\n")?;
                for part in &self.parts {
                    write!(f, "\r\n--{boundary}\r\n{}\r\n{}\r\n", part.headers, part.body)?;
                }
                write!(f, "\r\n--{boundary}--\r\n")
            }
            (None, Some(body)) => write!(f, "{body}\r\n"),
            (None, None) => Ok(()),
        }
    }
}

/// Builder for archived messages.
///
/// A message with an HTML body becomes `multipart/alternative` with the
/// text body first; otherwise it is a single `text/plain` part.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    headers: Vec<(String, String)>,
    text: Option<String>,
    html: Option<String>,
    boundary: Option<String>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Subject header.
    #[must_use]
    pub fn subject(self, subject: impl Into<String>) -> Self {
        self.header("Subject", subject)
    }

    /// Sets the From header.
    #[must_use]
    pub fn from(self, from: impl Into<String>) -> Self {
        self.header("From", from)
    }

    /// Sets the Date header.
    #[must_use]
    pub fn date(self, date: impl Into<String>) -> Self {
        self.header("Date", date)
    }

    /// Adds a free-text header. Non-ASCII values are RFC 2047 encoded.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Sets the multipart boundary.
    #[must_use]
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no body, a header is invalid, or the
    /// boundary is not a valid RFC 2046 boundary.
    pub fn build(self) -> Result<Message> {
        let html = self.html.filter(|html| !html.is_empty());
        if self.text.is_none() && html.is_none() {
            return Err(Error::MissingBody);
        }
        let text = self.text.unwrap_or_default();

        let mut headers = Headers::new();
        for (name, value) in &self.headers {
            headers.set_text(name.as_str(), value)?;
        }
        headers.set("MIME-Version", "1.0")?;

        let Some(html) = html else {
            let encoding = TransferEncoding::for_text(&text);
            headers.set("Content-Type", ContentType::text_plain().to_string())?;
            headers.set("Content-Transfer-Encoding", encoding.to_string())?;
            return Ok(Message {
                headers,
                parts: Vec::new(),
                body: Some(encoding.encode(&text)),
                boundary: None,
            });
        };

        let parts = vec![
            Part::text(&ContentType::text_plain(), &text)?,
            Part::text(&ContentType::text_html(), &html)?,
        ];

        let requested = self
            .boundary
            .unwrap_or_else(|| DEFAULT_BOUNDARY.to_string());
        validate_boundary(&requested)?;
        let boundary = unique_boundary(&requested, &parts);

        headers.set(
            "Content-Type",
            ContentType::multipart_alternative(boundary.as_str()).to_string(),
        )?;

        Ok(Message {
            headers,
            parts,
            body: None,
            boundary: Some(boundary),
        })
    }
}

fn validate_boundary(boundary: &str) -> Result<()> {
    let valid = (1..=60).contains(&boundary.len())
        && !boundary.ends_with(' ')
        && boundary
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || BOUNDARY_SPECIALS.contains(c));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidBoundary(boundary.to_string()))
    }
}

/// Appends a counter to the boundary until no part body contains it.
fn unique_boundary(boundary: &str, parts: &[Part]) -> String {
    let collides = |candidate: &str| {
        let delimiter = format!("--{candidate}");
        parts.iter().any(|part| part.body.contains(&delimiter))
    };

    let mut candidate = boundary.to_string();
    let mut counter = 1;
    while collides(&candidate) {
        candidate = format!("{boundary}_{counter}");
        counter += 1;
    }
    candidate
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
    fn test_transfer_encoding_choice() {
        assert_eq!(TransferEncoding::for_text("plain ascii"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::for_text("héllo"), TransferEncoding::QuotedPrintable);
        assert_eq!(
            TransferEncoding::for_text(&"x".repeat(120)),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_single_part_message() {
        let message = MessageBuilder::new()
            .subject("Test")
            .from("Alice <alice@example.com>")
            .date("Mon, 3 Mar 2025 00:00:00 +0000")
            .text_body("Hello\nWorld")
            .build()
            .unwrap();

        assert!(!message.is_multipart());
        let rendered = message.to_string();
        assert!(rendered.starts_with("Subject: Test\r\nFrom: Alice <alice@example.com>\r\n"));
        assert!(rendered.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(rendered.contains("Content-Transfer-Encoding: 7bit\r\n"));
        assert!(rendered.ends_with("\r\n\r\nHello\r\nWorld\r\n"));
    }

    #[test]
    fn test_alternative_message() {
        let message = MessageBuilder::new()
            .subject("Report")
            .text_body("text version")
            .html_body("<p>html version</p>")
            .boundary("b1")
            .build()
            .unwrap();

        assert!(message.is_multipart());
        assert_eq!(message.parts.len(), 2);
        let rendered = message.to_string();
        assert!(rendered.contains("Content-Type: multipart/alternative; boundary=b1\r\n"));
        let text_at = rendered.find("text/plain").unwrap();
        let html_at = rendered.find("text/html").unwrap();
        assert!(text_at < html_at);
        assert!(rendered.contains("--b1\r\n"));
        assert!(rendered.ends_with("--b1--\r\n"));
    }

    #[test]
    fn test_empty_html_is_single_part() {
        let message = MessageBuilder::new()
            .text_body("only text")
            .html_body("")
            .build()
            .unwrap();
        assert!(!message.is_multipart());
    }

    #[test]
    fn test_missing_body() {
        let result = MessageBuilder::new().subject("x").build();
        assert!(matches!(result, Err(Error::MissingBody)));
    }

    #[test]
    fn test_invalid_boundary() {
        let result = MessageBuilder::new()
            .text_body("a")
            .html_body("<b>a</b>")
            .boundary("bad\u{7f}")
            .build();
        assert!(matches!(result, Err(Error::InvalidBoundary(_))));
    }

    #[test]
    fn test_boundary_collision_is_avoided() {
        let message = MessageBuilder::new()
            .text_body("--b1 appears in the body")
            .html_body("<p>x</p>")
            .boundary("b1")
            .build()
            .unwrap();
        assert_eq!(message.boundary(), Some("b1_1"));
    }

    #[test]
    fn test_non_ascii_subject_encoded() {
        let message = MessageBuilder::new()
            .subject("Привет")
            .text_body("x")
            .build()
            .unwrap();
        assert!(message.subject().unwrap().starts_with("=?utf-8?B?"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let build = || {
            MessageBuilder::new()
                .subject("Same")
                .text_body("body")
                .html_body("<p>body</p>")
                .build()
                .unwrap()
                .to_bytes()
        };
        assert_eq!(build(), build());
    }
}
