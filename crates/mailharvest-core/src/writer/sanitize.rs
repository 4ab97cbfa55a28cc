//! File name sanitizing for artifacts.
//!
//! Names are bounded in bytes as well as characters: filesystems limit a
//! path component to 255 bytes, and a message file name is built from two
//! sanitized parts, `<id>_<subject>.eml`.

use sha2::{Digest, Sha256};

/// Longest subject kept in a file name, in characters.
pub const MAX_SUBJECT_CHARS: usize = 100;

/// Longest subject kept in a file name, in bytes.
pub const MAX_SUBJECT_BYTES: usize = 120;

/// Longest single path segment produced by [`sanitize_segment`], in bytes.
pub const MAX_SEGMENT_BYTES: usize = 120;

/// Longest extension kept when a segment is shortened.
const MAX_EXTENSION_BYTES: usize = 16;

/// Characters that are not allowed in a file name on common filesystems.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

fn replace_forbidden(text: &str) -> String {
    text.chars()
        .map(|c| {
            if FORBIDDEN.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Longest prefix of `text` that fits in `max` bytes and ends on a char
/// boundary.
fn truncate_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Shortens an over-long segment to `<prefix>~<hash><extension>`.
///
/// The hash covers the full name, so names sharing a long prefix stay
/// distinct.
fn shorten(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    let tag: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();

    let extension = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_EXTENSION_BYTES => &name[dot..],
        _ => "",
    };
    let stem = &name[..name.len() - extension.len()];
    let budget = MAX_SEGMENT_BYTES - extension.len() - tag.len() - 1;
    format!("{}~{tag}{extension}", truncate_bytes(stem, budget))
}

/// Makes `name` usable as a single path segment.
///
/// Separators, forbidden characters, and control characters become `_`.
/// Empty names and the `.`/`..` segments become `_`. Names longer than
/// [`MAX_SEGMENT_BYTES`] are cut and tagged with a hash of the full name.
#[must_use]
pub fn sanitize_segment(name: &str) -> String {
    let cleaned = replace_forbidden(name.trim());
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return "_".to_string();
    }
    if cleaned.len() > MAX_SEGMENT_BYTES {
        return shorten(&cleaned);
    }
    cleaned
}

/// Subject part of a message file name: at most [`MAX_SUBJECT_CHARS`]
/// characters and [`MAX_SUBJECT_BYTES`] bytes, forbidden characters
/// replaced with `_`.
#[must_use]
pub fn sanitize_subject(subject: &str) -> String {
    let truncated: String = subject.chars().take(MAX_SUBJECT_CHARS).collect();
    truncate_bytes(&replace_forbidden(&truncated), MAX_SUBJECT_BYTES).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_subject_replaces_forbidden() {
        assert_eq!(sanitize_subject(r#"Re: a/b\c <d> "e" |f? *g"#), "Re_ a_b_c _d_ _e_ _f_ _g");
    }

    #[test]
    fn test_subject_truncates_before_replacing() {
        let subject = format!("{}/tail", "x".repeat(100));
        assert_eq!(sanitize_subject(&subject), "x".repeat(100));
    }

    #[test]
    fn test_subject_multibyte_is_cut_on_char_boundary() {
        let clean = sanitize_subject(&"日本語".repeat(34));
        assert!(clean.len() <= MAX_SUBJECT_BYTES);
        assert_eq!(clean, "日本語".repeat(13) + "日");

        let emoji = sanitize_subject(&"📬".repeat(100));
        assert_eq!(emoji, "📬".repeat(30));
    }

    #[test]
    fn test_segment() {
        assert_eq!(sanitize_segment("Label: Work/Projects"), "Label_ Work_Projects");
        assert_eq!(sanitize_segment("alice_at_proton.me"), "alice_at_proton.me");
        assert_eq!(sanitize_segment(".."), "_");
        assert_eq!(sanitize_segment("  "), "_");
    }

    #[test]
    fn test_long_segment_keeps_extension_and_stays_distinct() {
        let a = format!("{}-a.pdf", "報告書".repeat(30));
        let b = format!("{}-b.pdf", "報告書".repeat(30));
        let (clean_a, clean_b) = (sanitize_segment(&a), sanitize_segment(&b));

        assert!(clean_a.len() <= MAX_SEGMENT_BYTES);
        assert!(clean_a.ends_with(".pdf"));
        assert!(clean_a.contains('~'));
        assert_ne!(clean_a, clean_b);
        assert_eq!(clean_a, sanitize_segment(&a));
    }

    proptest! {
        #[test]
        fn subject_is_bounded_and_clean(subject in ".*") {
            let clean = sanitize_subject(&subject);
            prop_assert!(clean.chars().count() <= MAX_SUBJECT_CHARS);
            prop_assert!(clean.len() <= MAX_SUBJECT_BYTES);
            prop_assert!(!clean.chars().any(|c| FORBIDDEN.contains(&c) || c.is_control()));
        }

        #[test]
        fn segment_is_a_single_bounded_component(name in ".*") {
            let clean = sanitize_segment(&name);
            prop_assert!(clean.len() <= MAX_SEGMENT_BYTES);
            let path = std::path::Path::new(&clean);
            prop_assert_eq!(path.components().count(), 1);
            prop_assert!(matches!(
                path.components().next(),
                Some(std::path::Component::Normal(_))
            ));
        }
    }
}
