//! Folder crawler over a [`PageDriver`].

use std::collections::HashSet;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::date::parse_ui_date;
use super::record::{
    EmailRecord, ExtractionFailure, Folder, FolderScan, NO_SUBJECT, UNKNOWN_SENDER, record_id,
};
use crate::config::CrawlContext;
use crate::driver::{DriverError, DriverResult, Locator, PageDriver};

/// Consecutive equal row counts after which the list counts as loaded.
const STABLE_OBSERVATIONS: usize = 3;

/// Upper bound on row count observations per list.
const MAX_OBSERVATIONS: usize = 50;

/// Prefix of folder names discovered from user labels.
const LABEL_PREFIX: &str = "Label: ";

/// Extracts messages from folders of one mailbox session.
#[derive(Debug, Clone, Copy)]
pub struct FolderCrawler<'a> {
    context: &'a CrawlContext,
}

impl<'a> FolderCrawler<'a> {
    /// Creates a crawler for the given run.
    #[must_use]
    pub const fn new(context: &'a CrawlContext) -> Self {
        Self { context }
    }

    /// Lists the folders of the mailbox: configured system folders present in
    /// the sidebar, in configured order, then user labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidebar does not appear.
    pub async fn discover_folders<D>(&self, driver: &mut D) -> DriverResult<Vec<Folder>>
    where
        D: PageDriver + ?Sized,
    {
        let layout = &self.context.layout;
        let ready = driver
            .wait_for_element(layout.mailbox_ready(), self.context.timeouts.sidebar())
            .await?;
        if !ready {
            return Err(DriverError::Timeout("folder sidebar".to_string()));
        }

        let mut folders = Vec::new();
        for system in &layout.system_folders {
            if driver.element_count(&system.selector).await? > 0 {
                folders.push(Folder::new(&system.name, Locator::css(&system.selector)));
            } else {
                debug!("System folder {} not present", system.name);
            }
        }

        match self.discover_labels(driver).await {
            Ok(labels) => {
                let mut names: HashSet<String> = folders.iter().map(|f| f.name.clone()).collect();
                for label in labels {
                    if names.insert(label.name.clone()) {
                        folders.push(label);
                    } else {
                        warn!("Skipping duplicate folder name {}", label.name);
                    }
                }
            }
            Err(e) => warn!("Could not list labels: {}", e),
        }

        info!("Found {} folders", folders.len());
        Ok(folders)
    }

    async fn discover_labels<D>(&self, driver: &mut D) -> DriverResult<Vec<Folder>>
    where
        D: PageDriver + ?Sized,
    {
        let selector = &self.context.layout.label_links;
        let count = driver.element_count(selector).await?;
        let mut labels = Vec::with_capacity(count);
        for index in 0..count {
            let locator = Locator::nth(selector.as_str(), index);
            let name = driver.read_text(&locator).await?.unwrap_or_default();
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            labels.push(Folder::new(format!("{LABEL_PREFIX}{name}"), locator));
        }
        Ok(labels)
    }

    /// Scans a folder newest-first, stopping at the first message older than
    /// the cutoff.
    ///
    /// A folder that cannot be opened (including an empty one) yields an
    /// empty scan with `navigation_failed` set. A message that cannot be read
    /// is recorded as a failure and the scan moves on.
    ///
    /// # Errors
    ///
    /// Returns an error only if the browser itself fails.
    pub async fn extract<D>(&self, driver: &mut D, folder: &Folder) -> DriverResult<FolderScan>
    where
        D: PageDriver + ?Sized,
    {
        info!("Scanning folder {}", folder.name);
        let opened = match self.open_folder(driver, folder).await {
            Ok(()) => self.load_list(driver, None).await,
            Err(e) => Err(e),
        };
        let listed = match opened {
            Ok(listed) => listed,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Could not open folder {}: {}", folder.name, e);
                return Ok(FolderScan::navigation_failure());
            }
        };
        info!("Folder {} lists {} messages", folder.name, listed);

        let cutoff = self.context.cutoff;
        let mut scan = FolderScan {
            listed,
            ..FolderScan::default()
        };
        let mut seen = HashSet::new();

        for index in 0..listed {
            let id = record_id(&folder.name, index);

            if let Some(date) = self.list_date(driver, index).await {
                if cutoff.is_expired(date) {
                    info!("{}: message {} is older than the cutoff, stopping", folder.name, index);
                    scan.stopped_at_cutoff = true;
                    break;
                }
            }

            let result = self.read_message(driver, folder, index, id).await;
            self.return_to_list(driver).await;

            match result {
                Ok(record) => {
                    if record.parsed_date.is_some_and(|date| cutoff.is_expired(date)) {
                        info!(
                            "{}: {:?} is older than the cutoff, stopping",
                            folder.name, record.subject
                        );
                        scan.stopped_at_cutoff = true;
                        break;
                    }
                    // A reflow can show the same message again further down.
                    if !seen.insert(record.content_digest()) {
                        debug!("{}: row {} repeats an earlier message", folder.name, index);
                        scan.duplicates += 1;
                        continue;
                    }
                    debug!("[{}/{}] {}", index + 1, listed, record.subject);
                    scan.records.push(record);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("{}: could not read message {}: {}", folder.name, index, e);
                    scan.failures.push(ExtractionFailure {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(scan)
    }

    /// Navigates back to a previously extracted message so its attachments
    /// can be downloaded.
    ///
    /// Returns `false` if the message at the record's position no longer
    /// shows the same subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder or message cannot be opened.
    pub async fn reopen<D>(
        &self,
        driver: &mut D,
        folder: &Folder,
        record: &EmailRecord,
    ) -> DriverResult<bool>
    where
        D: PageDriver + ?Sized,
    {
        self.open_folder(driver, folder).await?;
        let loaded = self.load_list(driver, Some(record.list_index)).await?;
        if loaded <= record.list_index {
            return Err(DriverError::ElementNotFound(format!(
                "{} is no longer listed",
                record.id
            )));
        }
        self.open_message(driver, record.list_index).await?;

        let subject = self.read_field(driver, &self.context.layout.message_subject).await?;
        let subject = subject.unwrap_or_else(|| NO_SUBJECT.to_string());
        if subject != record.subject {
            warn!(
                "{}: expected {:?} at position {}, found {:?}",
                folder.name, record.subject, record.list_index, subject
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Leaves the opened message and waits for the list to show again.
    pub async fn return_to_list<D>(&self, driver: &mut D)
    where
        D: PageDriver + ?Sized,
    {
        if let Err(e) = driver.go_back().await {
            warn!("Could not go back to the message list: {}", e);
            return;
        }
        let shown = driver
            .wait_for_element(&self.context.layout.message_item, self.context.timeouts.folder())
            .await;
        if !matches!(shown, Ok(true)) {
            debug!("Message list did not reappear");
        }
    }

    async fn open_folder<D>(&self, driver: &mut D, folder: &Folder) -> DriverResult<()>
    where
        D: PageDriver + ?Sized,
    {
        driver.click(&folder.locator).await?;
        let listed = driver
            .wait_for_element(&self.context.layout.message_item, self.context.timeouts.folder())
            .await?;
        if listed {
            Ok(())
        } else {
            Err(DriverError::Timeout(format!("no messages in {}", folder.name)))
        }
    }

    /// Scrolls the list until the row count stops changing.
    ///
    /// With `until`, stops early once the row at that index is loaded.
    async fn load_list<D>(&self, driver: &mut D, until: Option<usize>) -> DriverResult<usize>
    where
        D: PageDriver + ?Sized,
    {
        let selector = self.context.layout.message_item.as_str();
        let mut previous = None;
        let mut stable = 0;
        let mut count = 0;

        for _ in 0..MAX_OBSERVATIONS {
            count = driver.element_count(selector).await?;
            if until.is_some_and(|index| count > index) {
                return Ok(count);
            }
            if previous == Some(count) {
                stable += 1;
                if stable >= STABLE_OBSERVATIONS {
                    return Ok(count);
                }
            } else {
                stable = 0;
            }
            previous = Some(count);

            if count > 0 {
                driver
                    .scroll_into_view(&Locator::nth(selector, count - 1))
                    .await?;
            }
            tokio::time::sleep(self.context.timeouts.scroll_settle()).await;
        }

        debug!("List did not settle after {} observations", MAX_OBSERVATIONS);
        Ok(count)
    }

    async fn list_date<D>(&self, driver: &mut D, index: usize) -> Option<NaiveDateTime>
    where
        D: PageDriver + ?Sized,
    {
        let layout = &self.context.layout;
        let locator = Locator::within(
            layout.message_item.as_str(),
            index,
            layout.list_item_date.as_str(),
        );
        match driver.read_text(&locator).await {
            Ok(text) => text.and_then(|raw| parse_ui_date(&raw, self.context.clock.now())),
            Err(e) => {
                debug!("No list date for row {}: {}", index, e);
                None
            }
        }
    }

    async fn open_message<D>(&self, driver: &mut D, index: usize) -> DriverResult<()>
    where
        D: PageDriver + ?Sized,
    {
        let layout = &self.context.layout;
        // Rows may have been unloaded by navigating back.
        if driver.element_count(&layout.message_item).await? <= index {
            self.load_list(driver, Some(index)).await?;
        }
        driver
            .click(&Locator::nth(layout.message_item.as_str(), index))
            .await?;
        let opened = driver
            .wait_for_element(&layout.message_content, self.context.timeouts.message())
            .await?;
        if opened {
            Ok(())
        } else {
            Err(DriverError::Timeout(format!("message body at position {index}")))
        }
    }

    async fn read_message<D>(
        &self,
        driver: &mut D,
        folder: &Folder,
        index: usize,
        id: String,
    ) -> DriverResult<EmailRecord>
    where
        D: PageDriver + ?Sized,
    {
        let layout = &self.context.layout;
        self.open_message(driver, index).await?;

        let subject = self
            .read_field(driver, &layout.message_subject)
            .await?
            .unwrap_or_else(|| NO_SUBJECT.to_string());
        let sender = self
            .read_field(driver, &layout.message_from)
            .await?
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
        let raw_date = self
            .read_field(driver, &layout.message_date)
            .await?
            .unwrap_or_default();
        let parsed_date = parse_ui_date(&raw_date, self.context.clock.now());

        let content = Locator::css(layout.message_content.as_str());
        let body_html = driver.read_html(&content).await?.unwrap_or_default();
        let body_text = driver.read_text(&content).await?.unwrap_or_default();

        let mut attachments = Vec::new();
        let count = driver.element_count(&layout.attachment_item).await?;
        for position in 0..count {
            let locator = Locator::nth(layout.attachment_item.as_str(), position);
            if let Some(name) = driver.read_text(&locator).await? {
                let name = name.trim();
                if !name.is_empty() {
                    attachments.push(name.to_string());
                }
            }
        }

        Ok(EmailRecord {
            id,
            list_index: index,
            subject,
            sender,
            raw_date,
            parsed_date,
            body_html,
            body_text,
            attachments,
            folder: folder.name.clone(),
        })
    }

    /// Reads trimmed header text; empty counts as absent.
    async fn read_field<D>(&self, driver: &mut D, selector: &str) -> DriverResult<Option<String>>
    where
        D: PageDriver + ?Sized,
    {
        let text = driver.read_text(&Locator::css(selector)).await?;
        Ok(text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
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
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::clock::FixedClock;
    use crate::config::Timeouts;
    use crate::driver::BrowserLauncher;
    use crate::driver::mock::{MockMailbox, MockMessage, MockSession};
    use crate::layout::MailboxLayout;

    fn context(days_back: u32) -> CrawlContext {
        let now = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        CrawlContext::builder("unused")
            .days_back(days_back)
            .timeouts(Timeouts::immediate())
            .clock(Arc::new(FixedClock::new(now)))
            .build()
    }

    async fn session(mailbox: &MockMailbox) -> MockSession {
        let layout = MailboxLayout::default();
        let mut session = mailbox.launch().await.unwrap();
        session.navigate(&layout.login_url).await.unwrap();
        session.fill(&layout.username_input, "a@x.com").await.unwrap();
        session
            .click(&Locator::css(layout.submit_button.as_str()))
            .await
            .unwrap();
        session
    }

    fn inbox(context: &CrawlContext) -> Folder {
        let system = &context.layout.system_folders[0];
        Folder::new(&system.name, Locator::css(system.selector.as_str()))
    }

    mod discovery_tests {
        use super::*;

        #[tokio::test]
        async fn system_folders_then_labels() {
            let mailbox = MockMailbox::new(MailboxLayout::default())
                .folder("Inbox", vec![])
                .folder("Sent", vec![])
                .label("Work", vec![])
                .label("Family", vec![]);
            let ctx = context(30);
            let mut driver = session(&mailbox).await;

            let folders = FolderCrawler::new(&ctx)
                .discover_folders(&mut driver)
                .await
                .unwrap();
            let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, ["Inbox", "Sent", "Label: Work", "Label: Family"]);
            assert_eq!(
                folders[3].locator,
                Locator::nth(ctx.layout.label_links.as_str(), 1)
            );
        }

        #[tokio::test]
        async fn missing_sidebar_is_an_error() {
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder("Inbox", vec![]);
            let ctx = context(30);
            // Never logged in.
            let mut driver = mailbox.launch().await.unwrap();
            let result = FolderCrawler::new(&ctx).discover_folders(&mut driver).await;
            assert!(matches!(result, Err(DriverError::Timeout(_))));
        }
    }

    mod extract_tests {
        use super::*;

        #[tokio::test]
        async fn stops_at_cutoff_without_opening_old_message() {
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
                "Inbox",
                vec![
                    MockMessage::new("one day", "2025-03-09"),
                    MockMessage::new("three days", "2025-03-07"),
                    MockMessage::new("ten days", "2025-02-28"),
                ],
            );
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let scan = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await
                .unwrap();

            assert_eq!(scan.records.len(), 2);
            assert_eq!(scan.records[0].id, "Inbox_0");
            assert_eq!(scan.records[1].id, "Inbox_1");
            assert!(scan.stopped_at_cutoff);
            assert_eq!(
                mailbox.opened(),
                vec![("Inbox".to_string(), 0), ("Inbox".to_string(), 1)]
            );
        }

        #[tokio::test]
        async fn header_date_stops_when_row_has_none() {
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
                "Inbox",
                vec![
                    MockMessage::new("fresh", "2025-03-09"),
                    MockMessage::new("old", "2025-01-01").without_list_date(),
                    MockMessage::new("older", "2024-12-01"),
                ],
            );
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let scan = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await
                .unwrap();

            assert_eq!(scan.records.len(), 1);
            assert!(scan.stopped_at_cutoff);
            assert_eq!(mailbox.opened().len(), 2);
        }

        #[tokio::test]
        async fn unreadable_message_is_isolated() {
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
                "Inbox",
                vec![
                    MockMessage::new("a", "2025-03-09"),
                    MockMessage::new("b", "2025-03-09").broken(),
                    MockMessage::new("c", "2025-03-08"),
                ],
            );
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let scan = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await
                .unwrap();

            let ids: Vec<_> = scan.records.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, ["Inbox_0", "Inbox_2"]);
            assert_eq!(scan.failures.len(), 1);
            assert_eq!(scan.failures[0].index, 1);
        }

        #[tokio::test]
        async fn empty_folder_is_navigation_failure() {
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder("Inbox", vec![]);
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let scan = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await
                .unwrap();
            assert!(scan.navigation_failed);
            assert!(scan.records.is_empty());
        }

        #[tokio::test]
        async fn browser_crash_is_an_error() {
            let mailbox = MockMailbox::new(MailboxLayout::default())
                .folder("Inbox", vec![MockMessage::new("a", "2025-03-09")]);
            mailbox.crash_on_folder("Inbox");
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let result = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await;
            assert!(matches!(result, Err(DriverError::Browser(_))));
        }

        #[tokio::test]
        async fn lazy_list_is_fully_loaded() {
            let messages = (0..12)
                .map(|i| MockMessage::new(&format!("m{i}"), "2025-03-09"))
                .collect();
            let mailbox = MockMailbox::new(MailboxLayout::default())
                .folder("Inbox", messages)
                .with_page_size(5);
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let scan = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await
                .unwrap();
            assert_eq!(scan.listed, 12);
            assert_eq!(scan.records.len(), 12);
            assert!(!scan.stopped_at_cutoff);
        }

        #[tokio::test]
        async fn unsettled_list_is_crawled_as_loaded() {
            // One more row appears on every scroll, so the count never holds.
            let messages = (0..200)
                .map(|i| MockMessage::new(&format!("m{i}"), "2025-03-09"))
                .collect();
            let mailbox = MockMailbox::new(MailboxLayout::default())
                .folder("Inbox", messages)
                .with_page_size(1);
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let scan = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await
                .unwrap();
            assert_eq!(scan.listed, MAX_OBSERVATIONS);
            assert_eq!(scan.records.len(), MAX_OBSERVATIONS);
            assert!(scan.failures.is_empty());
            assert!(!scan.navigation_failed);
        }

        #[tokio::test]
        async fn detached_body_is_isolated() {
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
                "Inbox",
                vec![
                    MockMessage::new("a", "2025-03-09"),
                    MockMessage::new("b", "2025-03-09").detached(),
                    MockMessage::new("c", "2025-03-08"),
                ],
            );
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let scan = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await
                .unwrap();

            let ids: Vec<_> = scan.records.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, ["Inbox_0", "Inbox_2"]);
            assert_eq!(scan.failures.len(), 1);
            assert!(scan.failures[0].reason.contains("No node with given id"));
        }

        #[tokio::test]
        async fn undated_row_does_not_shift_later_dates() {
            // A page-wide `time` lookup would give row 2 the date of row 3.
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
                "Inbox",
                vec![
                    MockMessage::new("sent today", "2025-03-09"),
                    MockMessage::new("draft", "2025-03-09").without_list_date(),
                    MockMessage::new("two days", "2025-03-08"),
                    MockMessage::new("months", "2025-01-01"),
                ],
            );
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let scan = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await
                .unwrap();

            let subjects: Vec<_> = scan.records.iter().map(|r| r.subject.as_str()).collect();
            assert_eq!(subjects, ["sent today", "draft", "two days"]);
            assert!(scan.stopped_at_cutoff);
            assert!(!mailbox.opened().contains(&("Inbox".to_string(), 3)));
        }

        #[tokio::test]
        async fn repeated_row_is_extracted_once() {
            let repeated = MockMessage::new("weekly digest", "2025-03-08");
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
                "Inbox",
                vec![
                    MockMessage::new("newest", "2025-03-09"),
                    repeated.clone(),
                    repeated,
                    MockMessage::new("last", "2025-03-07"),
                ],
            );
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let scan = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await
                .unwrap();

            let ids: Vec<_> = scan.records.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, ["Inbox_0", "Inbox_1", "Inbox_3"]);
            assert_eq!(scan.duplicates, 1);
            assert!(scan.failures.is_empty());
        }

        #[tokio::test]
        async fn missing_headers_use_defaults() {
            let mut message = MockMessage::new("", "2025-03-09");
            message.sender = String::new();
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder("Inbox", vec![message]);
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let scan = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await
                .unwrap();
            assert_eq!(scan.records[0].subject, NO_SUBJECT);
            assert_eq!(scan.records[0].sender, UNKNOWN_SENDER);
        }

        #[tokio::test]
        async fn attachments_are_listed_by_name() {
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
                "Inbox",
                vec![
                    MockMessage::new("report", "2025-03-09")
                        .with_attachment("a.pdf", b"%PDF")
                        .with_attachment("b.txt", b"hi"),
                ],
            );
            let ctx = context(7);
            let mut driver = session(&mailbox).await;

            let scan = FolderCrawler::new(&ctx)
                .extract(&mut driver, &inbox(&ctx))
                .await
                .unwrap();
            assert_eq!(scan.records[0].attachments, ["a.pdf", "b.txt"]);
        }
    }

    mod reopen_tests {
        use super::*;

        #[tokio::test]
        async fn reopens_same_message() {
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
                "Inbox",
                vec![
                    MockMessage::new("a", "2025-03-09"),
                    MockMessage::new("b", "2025-03-09").with_attachment("x.bin", b"x"),
                ],
            );
            let ctx = context(7);
            let crawler = FolderCrawler::new(&ctx);
            let mut driver = session(&mailbox).await;
            let folder = inbox(&ctx);

            let scan = crawler.extract(&mut driver, &folder).await.unwrap();
            let record = &scan.records[1];
            assert!(crawler.reopen(&mut driver, &folder, record).await.unwrap());
            assert_eq!(mailbox.opened().last().unwrap(), &("Inbox".to_string(), 1));
        }

        #[tokio::test]
        async fn shifted_list_is_detected() {
            let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
                "Inbox",
                vec![
                    MockMessage::new("a", "2025-03-09"),
                    MockMessage::new("b", "2025-03-09"),
                ],
            );
            let ctx = context(7);
            let crawler = FolderCrawler::new(&ctx);
            let mut driver = session(&mailbox).await;
            let folder = inbox(&ctx);

            let scan = crawler.extract(&mut driver, &folder).await.unwrap();
            mailbox.set_messages(
                "Inbox",
                vec![
                    MockMessage::new("new", "2025-03-10"),
                    MockMessage::new("a", "2025-03-09"),
                ],
            );
            assert!(!crawler.reopen(&mut driver, &folder, &scan.records[1]).await.unwrap());
        }
    }
}
