//! Values produced by a folder scan.

use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};

use crate::driver::Locator;

/// Subject used when the header is missing or empty.
pub const NO_SUBJECT: &str = "No Subject";

/// Sender used when the header is missing or empty.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Folder-scoped identifier of the message at `index` in `folder`.
///
/// Only unique within one folder's listing order at crawl time.
#[must_use]
pub fn record_id(folder: &str, index: usize) -> String {
    format!("{folder}_{index}")
}

/// A named container of messages, rediscovered on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Name used for checkpoints and directory names.
    pub name: String,
    /// Sidebar element that opens the folder.
    pub locator: Locator,
}

impl Folder {
    /// Creates a folder.
    #[must_use]
    pub fn new(name: impl Into<String>, locator: Locator) -> Self {
        Self {
            name: name.into(),
            locator,
        }
    }
}

/// One extracted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRecord {
    /// `"<folder>_<index>"`.
    pub id: String,
    /// Position in the folder's list.
    pub list_index: usize,
    /// Subject, or [`NO_SUBJECT`].
    pub subject: String,
    /// Sender, or [`UNKNOWN_SENDER`].
    pub sender: String,
    /// Date text as shown in the message header.
    pub raw_date: String,
    /// Parsed date, when the text was recognized.
    pub parsed_date: Option<NaiveDateTime>,
    /// Body markup.
    pub body_html: String,
    /// Body rendered as text.
    pub body_text: String,
    /// Attachment names, in display order.
    pub attachments: Vec<String>,
    /// Folder the message was listed in.
    pub folder: String,
}

impl EmailRecord {
    /// True if the message lists attachments.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Digest of the message content, independent of its list position.
    ///
    /// Two rows with the same digest show the same message.
    #[must_use]
    pub fn content_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for field in [
            &self.subject,
            &self.sender,
            &self.raw_date,
            &self.body_text,
            &self.body_html,
        ] {
            hasher.update(field.as_bytes());
            hasher.update([0]);
        }
        let mut digest = [0; 32];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }
}

/// A message that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    /// Position in the folder's list.
    pub index: usize,
    /// What went wrong.
    pub reason: String,
}

/// Result of scanning one folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderScan {
    /// Extracted messages in scan order.
    pub records: Vec<EmailRecord>,
    /// Messages skipped because they could not be read.
    pub failures: Vec<ExtractionFailure>,
    /// Rows skipped because they repeated an already extracted message.
    pub duplicates: usize,
    /// True if the scan ended at a message older than the cutoff.
    pub stopped_at_cutoff: bool,
    /// True if the folder could not be opened.
    pub navigation_failed: bool,
    /// Rows loaded in the list when scanning started.
    pub listed: usize,
}

impl FolderScan {
    pub(crate) fn navigation_failure() -> Self {
        Self {
            navigation_failed: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_is_folder_scoped() {
        assert_eq!(record_id("Inbox", 0), "Inbox_0");
        assert_eq!(record_id("Label: Work", 12), "Label: Work_12");
        assert_ne!(record_id("Inbox", 1), record_id("Sent", 1));
    }

    #[test]
    fn test_navigation_failure_is_empty() {
        let scan = FolderScan::navigation_failure();
        assert!(scan.navigation_failed);
        assert!(scan.records.is_empty());
        assert!(!scan.stopped_at_cutoff);
    }

    #[test]
    fn test_content_digest_ignores_position() {
        let record = EmailRecord {
            id: record_id("Inbox", 0),
            list_index: 0,
            subject: "Hello".to_string(),
            sender: "a@x.com".to_string(),
            raw_date: "Mar 9, 2025".to_string(),
            parsed_date: None,
            body_html: "<p>Hi</p>".to_string(),
            body_text: "Hi".to_string(),
            attachments: Vec::new(),
            folder: "Inbox".to_string(),
        };
        let mut moved = record.clone();
        moved.id = record_id("Inbox", 4);
        moved.list_index = 4;
        assert_eq!(record.content_digest(), moved.content_digest());

        let mut other = record.clone();
        other.body_text = "Bye".to_string();
        assert_ne!(record.content_digest(), other.content_digest());
    }
}
