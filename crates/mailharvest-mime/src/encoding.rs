//! MIME transfer and header encodings.
//!
//! Only the encoding direction is provided: archived messages are written,
//! never read back.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length (RFC 2045 section 6.7).
const MAX_LINE_LENGTH: usize = 76;

/// Bytes of input per RFC 2047 encoded word. 45 bytes become 60 base64
/// characters, which keeps each word under the 75 character limit.
const ENCODED_WORD_CHUNK: usize = 45;

/// Encodes data as Base64 on a single line.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input (`\n` or `\r\n`) are kept as hard CRLF breaks;
/// long lines get `=` soft breaks. Trailing whitespace on a line is encoded
/// so that transports cannot strip it.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let mut result = String::with_capacity(normalized.len());

    for (i, line) in normalized.split('\n').enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        encode_quoted_printable_line(line, &mut result);
    }

    result
}

fn encode_quoted_printable_line(line: &str, result: &mut String) {
    let bytes = line.as_bytes();
    let mut line_length = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        let is_last = i + 1 == bytes.len();
        let needs_encoding = match byte {
            b'!'..=b'<' | b'>'..=b'~' => false,
            b' ' | b'\t' => is_last,
            _ => true,
        };
        let width = if needs_encoding { 3 } else { 1 };

        // Leave room for the trailing '=' of a soft break
        if line_length + width > MAX_LINE_LENGTH - 1 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        if needs_encoding {
            let _ = write!(result, "={byte:02X}");
        } else {
            result.push(byte as char);
        }
        line_length += width;
    }
}

/// Encodes a header value using RFC 2047 `B` encoding when it is not
/// plain printable ASCII.
///
/// Long values are split into several encoded words separated by a space,
/// never splitting a UTF-8 sequence.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) && !text.contains("=?") {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();

    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > ENCODED_WORD_CHUNK {
            words.push(format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes())));
    }

    words.join(" ")
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode() {
        assert_eq!(encode_base64(b"Hello, World!"), "SGVsbG8sIFdvcmxkIQ==");
    }

    #[test]
    fn test_quoted_printable_ascii_untouched() {
        assert_eq!(encode_quoted_printable("Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_quoted_printable_non_ascii() {
        let encoded = encode_quoted_printable("Héllo");
        assert_eq!(encoded, "H=C3=A9llo");
    }

    #[test]
    fn test_quoted_printable_equals_sign() {
        assert_eq!(encode_quoted_printable("a=b"), "a=3Db");
    }

    #[test]
    fn test_quoted_printable_keeps_line_breaks() {
        assert_eq!(encode_quoted_printable("one\ntwo\r\nthree"), "one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_quoted_printable_trailing_space() {
        assert_eq!(encode_quoted_printable("end \nnext"), "end=20\r\nnext");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let text = "x".repeat(200);
        let encoded = encode_quoted_printable(&text);
        assert!(encoded.contains("=\r\n"));
        assert_eq!(encoded.replace("=\r\n", ""), text);
    }

    #[test]
    fn test_rfc2047_ascii_passthrough() {
        assert_eq!(encode_rfc2047("Weekly report"), "Weekly report");
    }

    #[test]
    fn test_rfc2047_non_ascii() {
        let encoded = encode_rfc2047("Héllo");
        assert_eq!(encoded, "=?utf-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_rfc2047_long_value_is_split() {
        let encoded = encode_rfc2047(&"é".repeat(60));
        let words: Vec<_> = encoded.split(' ').collect();
        assert!(words.len() > 1);
        for word in words {
            assert!(word.len() <= 75);
            assert!(word.starts_with("=?utf-8?B?"));
        }
    }

    proptest! {
        #[test]
        fn quoted_printable_lines_fit(text in "\\PC{0,400}") {
            let encoded = encode_quoted_printable(&text);
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
            }
            prop_assert!(encoded.is_ascii());
        }
    }
}
