//! On-disk artifacts: one `.eml` file per message plus its attachments.
//!
//! Layout under the output directory:
//!
//! ```text
//! <account-dir>/<folder-dir>/<id>_<subject>.eml
//! <account-dir>/<folder-dir>/<id>_attachments/<name>
//! ```
//!
//! Paths depend only on the record, and the rendered message is
//! byte-for-byte stable, so writing the same record twice converges to the
//! same files.

mod sanitize;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use mailharvest_mime::MessageBuilder;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

pub use sanitize::{
    MAX_SEGMENT_BYTES, MAX_SUBJECT_BYTES, MAX_SUBJECT_CHARS, sanitize_segment, sanitize_subject,
};

use crate::Result;
use crate::account::AccountId;
use crate::checkpoint::write_atomic;
use crate::config::CrawlContext;
use crate::crawl::EmailRecord;
use crate::driver::{Locator, PageDriver};

/// An attachment that could not be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFailure {
    /// Attachment name.
    pub name: String,
    /// What went wrong.
    pub reason: String,
}

/// Outcome of saving one message's attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentReport {
    /// Files written.
    pub saved: Vec<PathBuf>,
    /// Attachments skipped.
    pub failures: Vec<DownloadFailure>,
}

impl AttachmentReport {
    /// Every attachment of `record` failed for the same reason.
    #[must_use]
    pub fn unavailable(record: &EmailRecord, reason: &str) -> Self {
        Self {
            saved: Vec::new(),
            failures: record
                .attachments
                .iter()
                .map(|name| DownloadFailure {
                    name: name.clone(),
                    reason: reason.to_string(),
                })
                .collect(),
        }
    }
}

/// Writes messages and attachments under the run's output directory.
#[derive(Debug, Clone, Copy)]
pub struct MessageWriter<'a> {
    context: &'a CrawlContext,
}

impl<'a> MessageWriter<'a> {
    /// Creates a writer for the given run.
    #[must_use]
    pub const fn new(context: &'a CrawlContext) -> Self {
        Self { context }
    }

    /// Directory holding one folder's artifacts.
    #[must_use]
    pub fn folder_dir(&self, account: &AccountId, folder: &str) -> PathBuf {
        self.context
            .base_dir
            .join(sanitize_segment(&account.dir_name()))
            .join(sanitize_segment(folder))
    }

    /// Path of a record's `.eml` file.
    #[must_use]
    pub fn message_path(&self, account: &AccountId, record: &EmailRecord) -> PathBuf {
        let name = format!(
            "{}_{}.eml",
            sanitize_segment(&record.id),
            sanitize_subject(&record.subject)
        );
        self.folder_dir(account, &record.folder).join(name)
    }

    /// Directory holding a record's attachments.
    #[must_use]
    pub fn attachments_dir(&self, account: &AccountId, record: &EmailRecord) -> PathBuf {
        self.folder_dir(account, &record.folder)
            .join(format!("{}_attachments", sanitize_segment(&record.id)))
    }

    /// Writes the record as an RFC 5322 message, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be rendered or written.
    pub async fn persist(&self, record: &EmailRecord, account: &AccountId) -> Result<PathBuf> {
        let path = self.message_path(account, record);
        let bytes = render(record)?;
        write_atomic(&path, &bytes).await?;
        debug!("Saved {}", path.display());
        Ok(path)
    }

    /// Downloads every attachment of the opened message.
    ///
    /// Each attachment is independent: a failed download or write is
    /// recorded and the rest continue.
    pub async fn persist_attachments<D>(
        &self,
        record: &EmailRecord,
        account: &AccountId,
        driver: &mut D,
    ) -> AttachmentReport
    where
        D: PageDriver + ?Sized,
    {
        let dir = self.attachments_dir(account, record);
        let selector = self.context.layout.attachment_item.as_str();
        let mut report = AttachmentReport::default();
        let mut used = HashSet::new();

        info!(
            "Downloading {} attachments of {}",
            record.attachments.len(),
            record.id
        );
        for (position, name) in record.attachments.iter().enumerate() {
            let target = dir.join(unique_name(&sanitize_segment(name), &mut used));
            let result = match driver.trigger_download(&Locator::nth(selector, position)).await {
                Ok(content) => save(&target, &content).await,
                Err(e) => Err(e.to_string()),
            };
            match result {
                Ok(()) => {
                    debug!("Saved attachment {}", target.display());
                    report.saved.push(target);
                }
                Err(reason) => {
                    warn!("{}: could not save attachment {:?}: {}", record.id, name, reason);
                    report.failures.push(DownloadFailure {
                        name: name.clone(),
                        reason,
                    });
                }
            }
        }
        report
    }
}

async fn save(path: &Path, content: &[u8]) -> std::result::Result<(), String> {
    write_atomic(path, content).await.map_err(|e| e.to_string())
}

/// Returns `name`, or `name (n)` with the smallest free `n`, and marks it used.
fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    let mut counter = 1;
    loop {
        let candidate = format!("{stem} ({counter}){extension}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Renders a record as message bytes.
fn render(record: &EmailRecord) -> Result<Vec<u8>> {
    let mut builder = MessageBuilder::new()
        .subject(record.subject.as_str())
        .from(record.sender.as_str());
    if !record.raw_date.is_empty() {
        builder = builder.date(record.raw_date.as_str());
    }
    let message = builder
        .header("X-Mailharvest-Folder", record.folder.as_str())
        .text_body(record.body_text.as_str())
        .html_body(record.body_html.as_str())
        .boundary(boundary_for(record))
        .build()?;
    Ok(message.to_bytes())
}

/// Multipart boundary derived from the record's content.
fn boundary_for(record: &EmailRecord) -> String {
    let mut hasher = Sha256::new();
    for field in [
        &record.id,
        &record.subject,
        &record.sender,
        &record.raw_date,
        &record.body_text,
        &record.body_html,
    ] {
        hasher.update(field.as_bytes());
        hasher.update([0]);
    }
    let digest = hasher.finalize();
    let hex: String = digest[..12].iter().map(|b| format!("{b:02x}")).collect();
    format!("=_mh_{hex}")
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
    use crate::config::Timeouts;
    use crate::driver::BrowserLauncher;
    use crate::driver::mock::{MockMailbox, MockMessage};
    use crate::layout::MailboxLayout;

    fn record(folder: &str, index: usize, subject: &str) -> EmailRecord {
        EmailRecord {
            id: crate::crawl::record_id(folder, index),
            list_index: index,
            subject: subject.to_string(),
            sender: "Alice <alice@example.test>".to_string(),
            raw_date: "Mar 9, 2025".to_string(),
            parsed_date: None,
            body_html: "<p>Hello</p>".to_string(),
            body_text: "Hello".to_string(),
            attachments: Vec::new(),
            folder: folder.to_string(),
        }
    }

    fn context(dir: &tempfile::TempDir) -> CrawlContext {
        CrawlContext::builder(dir.path())
            .timeouts(Timeouts::immediate())
            .build()
    }

    mod path_tests {
        use super::*;

        #[test]
        fn message_path_layout() {
            let dir = tempfile::tempdir().unwrap();
            let ctx = context(&dir);
            let writer = MessageWriter::new(&ctx);
            let account = AccountId::new("alice@proton.me");

            let path = writer.message_path(&account, &record("Inbox", 3, "Re: plans?"));
            assert_eq!(
                path,
                dir.path()
                    .join("alice_at_proton.me")
                    .join("Inbox")
                    .join("Inbox_3_Re_ plans_.eml")
            );
        }

        #[test]
        fn label_folders_are_flattened() {
            let dir = tempfile::tempdir().unwrap();
            let ctx = context(&dir);
            let writer = MessageWriter::new(&ctx);
            let account = AccountId::new("a@x.com");

            let path = writer.attachments_dir(&account, &record("Label: a/b", 0, "s"));
            assert_eq!(
                path,
                dir.path()
                    .join("a_at_x.com")
                    .join("Label_ a_b")
                    .join("Label_ a_b_0_attachments")
            );
        }

        #[test]
        fn long_names_fit_the_filesystem_limit() {
            let dir = tempfile::tempdir().unwrap();
            let ctx = context(&dir);
            let writer = MessageWriter::new(&ctx);
            let account = AccountId::new("a@x.com");
            let label = format!("Label: {}", "プロジェクト".repeat(20));

            let path = writer.message_path(&account, &record(&label, 7, &"日本語".repeat(34)));
            let name = path.file_name().unwrap().to_str().unwrap();
            assert!(name.len() <= 255, "{} bytes", name.len());
            assert!(name.ends_with(".eml"));
            for component in path.strip_prefix(dir.path()).unwrap() {
                assert!(component.len() <= 255);
            }

            let other = writer.message_path(&account, &record(&label, 8, &"日本語".repeat(34)));
            assert_ne!(path, other);
        }

        #[test]
        fn unique_names_are_deterministic() {
            let mut used = HashSet::new();
            assert_eq!(unique_name("a.pdf", &mut used), "a.pdf");
            assert_eq!(unique_name("a.pdf", &mut used), "a (1).pdf");
            assert_eq!(unique_name("a.pdf", &mut used), "a (2).pdf");
            assert_eq!(unique_name("README", &mut used), "README");
            assert_eq!(unique_name("README", &mut used), "README (1)");
            assert_eq!(unique_name(".env", &mut used), ".env");
            assert_eq!(unique_name(".env", &mut used), ".env (1)");
        }
    }

    mod persist_tests {
        use super::*;

        #[tokio::test]
        async fn writes_multipart_message() {
            let dir = tempfile::tempdir().unwrap();
            let ctx = context(&dir);
            let writer = MessageWriter::new(&ctx);

            let path = writer
                .persist(&record("Inbox", 0, "Hello"), &AccountId::new("a@x.com"))
                .await
                .unwrap();
            let raw = tokio::fs::read_to_string(&path).await.unwrap();
            assert!(raw.contains("Subject: Hello\r\n"));
            assert!(raw.contains("From: Alice <alice@example.test>\r\n"));
            assert!(raw.contains("Date: Mar 9, 2025\r\n"));
            assert!(raw.contains("multipart/alternative"));
            assert!(raw.contains("<p>Hello</p>"));
        }

        #[tokio::test]
        async fn text_only_without_html() {
            let dir = tempfile::tempdir().unwrap();
            let ctx = context(&dir);
            let mut rec = record("Inbox", 0, "Plain");
            rec.body_html = String::new();

            let path = MessageWriter::new(&ctx)
                .persist(&rec, &AccountId::new("a@x.com"))
                .await
                .unwrap();
            let raw = tokio::fs::read_to_string(&path).await.unwrap();
            assert!(raw.contains("text/plain"));
            assert!(!raw.contains("multipart"));
        }

        #[tokio::test]
        async fn long_multibyte_subject_is_written() {
            let dir = tempfile::tempdir().unwrap();
            let ctx = context(&dir);
            let rec = record("Inbox", 0, &"日本語".repeat(34));

            let path = MessageWriter::new(&ctx)
                .persist(&rec, &AccountId::new("a@x.com"))
                .await
                .unwrap();
            assert!(path.exists());
            let raw = tokio::fs::read_to_string(&path).await.unwrap();
            assert!(raw.contains("Subject: =?utf-8?B?"));
        }

        #[tokio::test]
        async fn rewrite_is_byte_identical() {
            let dir = tempfile::tempdir().unwrap();
            let ctx = context(&dir);
            let writer = MessageWriter::new(&ctx);
            let account = AccountId::new("a@x.com");
            let rec = record("Inbox", 0, "Hello");

            let path = writer.persist(&rec, &account).await.unwrap();
            let first = tokio::fs::read(&path).await.unwrap();
            let again = writer.persist(&rec, &account).await.unwrap();
            assert_eq!(path, again);
            assert_eq!(first, tokio::fs::read(&path).await.unwrap());
        }

        #[test]
        fn boundary_depends_on_content() {
            let a = record("Inbox", 0, "Hello");
            let mut b = a.clone();
            b.body_text = "Other".to_string();
            assert_eq!(boundary_for(&a), boundary_for(&a.clone()));
            assert_ne!(boundary_for(&a), boundary_for(&b));
            assert!(boundary_for(&a).len() <= 60);
        }
    }

    mod attachment_tests {
        use super::*;
        use crate::crawl::{Folder, FolderCrawler};
        use crate::driver::mock::MockSession;

        async fn opened(mailbox: &MockMailbox, ctx: &CrawlContext) -> (MockSession, EmailRecord) {
            let layout = MailboxLayout::default();
            let mut session = mailbox.launch().await.unwrap();
            session.navigate(&layout.login_url).await.unwrap();
            session
                .click(&Locator::css(layout.submit_button.as_str()))
                .await
                .unwrap();

            let system = &layout.system_folders[0];
            let folder = Folder::new(&system.name, Locator::css(system.selector.as_str()));
            let crawler = FolderCrawler::new(ctx);
            let scan = crawler.extract(&mut session, &folder).await.unwrap();
            let record = scan.records[0].clone();
            assert!(crawler.reopen(&mut session, &folder, &record).await.unwrap());
            (session, record)
        }

        #[tokio::test]
        async fn failed_download_does_not_stop_others() {
            let dir = tempfile::tempdir().unwrap();
            let ctx = CrawlContext::builder(dir.path())
                .days_back(100_000)
                .timeouts(Timeouts::immediate())
                .build();
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
                "Inbox",
                vec![
                    MockMessage::new("files", "2025-03-09")
                        .with_attachment("a.txt", b"one")
                        .with_failing_attachment("b.txt")
                        .with_attachment("a.txt", b"two"),
                ],
            );
            let (mut session, record) = opened(&mailbox, &ctx).await;
            let account = AccountId::new("a@x.com");

            let report = MessageWriter::new(&ctx)
                .persist_attachments(&record, &account, &mut session)
                .await;

            assert_eq!(report.failures.len(), 1);
            assert_eq!(report.failures[0].name, "b.txt");
            assert_eq!(report.saved.len(), 2);
            let dir = MessageWriter::new(&ctx).attachments_dir(&account, &record);
            assert_eq!(tokio::fs::read(dir.join("a.txt")).await.unwrap(), b"one");
            assert_eq!(tokio::fs::read(dir.join("a (1).txt")).await.unwrap(), b"two");
        }

        #[test]
        fn unavailable_fails_every_attachment() {
            let mut rec = record("Inbox", 0, "s");
            rec.attachments = vec!["a".to_string(), "b".to_string()];
            let report = AttachmentReport::unavailable(&rec, "gone");
            assert!(report.saved.is_empty());
            assert_eq!(report.failures.len(), 2);
        }
    }
}
