//! Scripted in-memory mailbox implementing the driver traits.
//!
//! `MockMailbox` models a webmail UI laid out according to a
//! [`MailboxLayout`]: a login form, sidebar folders and labels, a lazily
//! loading message list, and an opened-message view. It records what the
//! crawler touched (folders visited, messages opened, sessions closed) so
//! tests can assert on crawler behavior without a browser.
//!
//! # Example
//!
//! ```
//! use mailharvest_core::driver::mock::{MockMailbox, MockMessage};
//! use mailharvest_core::layout::MailboxLayout;
//!
//! let mailbox = MockMailbox::new(MailboxLayout::default())
//!     .folder("Inbox", vec![MockMessage::new("Hello", "2025-03-10")])
//!     .label("Work", vec![]);
//! assert!(mailbox.opened().is_empty());
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{BrowserLauncher, DriverError, DriverResult, Locator, PageDriver};
use crate::layout::MailboxLayout;

/// An attachment in a scripted message.
#[derive(Debug, Clone)]
pub struct MockAttachment {
    /// File name shown in the UI.
    pub name: String,
    /// Downloaded content.
    pub content: Vec<u8>,
    /// Whether downloading it fails.
    pub fails: bool,
}

/// A scripted message.
#[derive(Debug, Clone)]
pub struct MockMessage {
    /// Subject header.
    pub subject: String,
    /// Sender header.
    pub sender: String,
    /// Date header text.
    pub date: String,
    /// Date shown on the list row, if any.
    pub list_date: Option<String>,
    /// Body HTML.
    pub html: String,
    /// Body text.
    pub text: String,
    /// Attachments.
    pub attachments: Vec<MockAttachment>,
    /// Whether reading the opened message fails.
    pub broken: bool,
    /// Whether the opened message's body node is detached when read.
    pub detached: bool,
}

impl MockMessage {
    /// A message with the given subject and date (shown both on the row and
    /// in the header).
    #[must_use]
    pub fn new(subject: &str, date: &str) -> Self {
        Self {
            subject: subject.to_string(),
            sender: "Sender <sender@example.test>".to_string(),
            date: date.to_string(),
            list_date: Some(date.to_string()),
            html: format!("<p>{subject}</p>"),
            text: subject.to_string(),
            attachments: Vec::new(),
            broken: false,
            detached: false,
        }
    }

    /// Adds an attachment.
    #[must_use]
    pub fn with_attachment(mut self, name: &str, content: &[u8]) -> Self {
        self.attachments.push(MockAttachment {
            name: name.to_string(),
            content: content.to_vec(),
            fails: false,
        });
        self
    }

    /// Adds an attachment whose download fails.
    #[must_use]
    pub fn with_failing_attachment(mut self, name: &str) -> Self {
        self.attachments.push(MockAttachment {
            name: name.to_string(),
            content: Vec::new(),
            fails: true,
        });
        self
    }

    /// Hides the row date so the crawler has to open the message.
    #[must_use]
    pub fn without_list_date(mut self) -> Self {
        self.list_date = None;
        self
    }

    /// Makes reading the opened message fail.
    #[must_use]
    pub const fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    /// Makes reading the body fail with a [`DriverError::Page`], as when a
    /// re-render detaches the node.
    #[must_use]
    pub const fn detached(mut self) -> Self {
        self.detached = true;
        self
    }
}

#[derive(Debug, Clone)]
enum FolderLink {
    System(String),
    Label(String),
}

#[derive(Debug, Clone)]
struct MockFolder {
    name: String,
    link: FolderLink,
    messages: Vec<MockMessage>,
}

#[derive(Debug, Default)]
struct MockState {
    folders: Vec<MockFolder>,
    page_size: usize,
    rejected: HashSet<String>,
    two_factor_polls: usize,
    fail_launch: bool,
    crash_on_folder: Option<String>,
    launched: usize,
    closed: usize,
    logins: usize,
    folder_visits: Vec<String>,
    opened: Vec<(String, usize)>,
    downloads: Vec<(String, usize, String)>,
}

/// Scripted mailbox shared by all sessions it launches.
#[derive(Debug, Clone)]
pub struct MockMailbox {
    layout: Arc<MailboxLayout>,
    state: Arc<Mutex<MockState>>,
}

impl MockMailbox {
    /// Creates an empty mailbox using the given layout's selectors.
    #[must_use]
    pub fn new(layout: MailboxLayout) -> Self {
        Self {
            layout: Arc::new(layout),
            state: Arc::new(Mutex::new(MockState {
                page_size: 25,
                ..MockState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a folder, newest message first. Names matching a system folder
    /// of the layout use its sidebar link; other names become labels.
    #[must_use]
    pub fn folder(self, name: &str, messages: Vec<MockMessage>) -> Self {
        let system = self
            .layout
            .system_folders
            .iter()
            .find(|folder| folder.name == name)
            .map(|folder| folder.selector.clone());
        let (display, link) = system.map_or_else(
            || (format!("Label: {name}"), FolderLink::Label(name.to_string())),
            |selector| (name.to_string(), FolderLink::System(selector)),
        );
        self.lock().folders.push(MockFolder {
            name: display,
            link,
            messages,
        });
        self
    }

    /// Adds a user label, newest message first.
    #[must_use]
    pub fn label(self, name: &str, messages: Vec<MockMessage>) -> Self {
        self.lock().folders.push(MockFolder {
            name: format!("Label: {name}"),
            link: FolderLink::Label(name.to_string()),
            messages,
        });
        self
    }

    /// Number of rows the list reveals initially and per scroll.
    #[must_use]
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    /// Makes the login for `address` fail.
    #[must_use]
    pub fn reject_login(self, address: &str) -> Self {
        self.lock().rejected.insert(address.to_string());
        self
    }

    /// Requires a second factor that completes after `polls` URL checks.
    #[must_use]
    pub fn with_two_factor(self, polls: usize) -> Self {
        self.lock().two_factor_polls = polls;
        self
    }

    /// Makes every launch fail.
    #[must_use]
    pub fn with_launch_failure(self) -> Self {
        self.lock().fail_launch = true;
        self
    }

    /// Makes opening the named folder crash the page.
    pub fn crash_on_folder(&self, name: &str) {
        self.lock().crash_on_folder = Some(name.to_string());
    }

    /// Stops crashing on folder open.
    pub fn clear_crash(&self) {
        self.lock().crash_on_folder = None;
    }

    /// Replaces the messages of an existing folder.
    pub fn set_messages(&self, folder: &str, messages: Vec<MockMessage>) {
        if let Some(existing) = self.lock().folders.iter_mut().find(|f| f.name == folder) {
            existing.messages = messages;
        }
    }

    /// Folders opened from the sidebar, in order.
    #[must_use]
    pub fn folder_visits(&self) -> Vec<String> {
        self.lock().folder_visits.clone()
    }

    /// Messages opened, as (folder, list index), in order.
    #[must_use]
    pub fn opened(&self) -> Vec<(String, usize)> {
        self.lock().opened.clone()
    }

    /// Attachment downloads, as (folder, list index, attachment name).
    #[must_use]
    pub fn downloads(&self) -> Vec<(String, usize, String)> {
        self.lock().downloads.clone()
    }

    /// Sessions launched so far.
    #[must_use]
    pub fn sessions_launched(&self) -> usize {
        self.lock().launched
    }

    /// Sessions closed so far.
    #[must_use]
    pub fn sessions_closed(&self) -> usize {
        self.lock().closed
    }

    /// Successful logins so far.
    #[must_use]
    pub fn logins(&self) -> usize {
        self.lock().logins
    }

    /// Clears the recorded visits, opens, and downloads.
    pub fn reset_observations(&self) {
        let mut state = self.lock();
        state.folder_visits.clear();
        state.opened.clear();
        state.downloads.clear();
    }
}

#[async_trait]
impl BrowserLauncher for MockMailbox {
    type Session = MockSession;

    async fn launch(&self) -> DriverResult<MockSession> {
        let mut state = self.lock();
        if state.fail_launch {
            return Err(DriverError::Browser("browser failed to start".to_string()));
        }
        state.launched += 1;
        drop(state);

        Ok(MockSession {
            mailbox: self.clone(),
            view: View::Blank,
            username: String::new(),
            pending_polls: 0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Blank,
    Login,
    TwoFactor,
    Mailbox,
    List { folder: usize, revealed: usize },
    Message { folder: usize, index: usize, revealed: usize },
}

/// One session on a [`MockMailbox`].
#[derive(Debug)]
pub struct MockSession {
    mailbox: MockMailbox,
    view: View,
    username: String,
    pending_polls: usize,
}

impl MockSession {
    fn layout(&self) -> &MailboxLayout {
        &self.mailbox.layout
    }

    const fn logged_in(&self) -> bool {
        matches!(
            self.view,
            View::Mailbox | View::List { .. } | View::Message { .. }
        )
    }

    fn mailbox_url(&self) -> String {
        format!("https://mail.example.test{}/inbox", self.layout().mailbox_url_marker)
    }

    fn folder_for(&self, target: &Locator) -> Option<usize> {
        let state = self.mailbox.lock();
        let labels: Vec<usize> = state
            .folders
            .iter()
            .enumerate()
            .filter(|(_, f)| matches!(f.link, FolderLink::Label(_)))
            .map(|(i, _)| i)
            .collect();

        if target.selector() == self.layout().label_links {
            return labels.get(target.index()).copied();
        }
        state.folders.iter().position(
            |f| matches!(&f.link, FolderLink::System(selector) if selector == target.selector()),
        )
    }

    fn message(&self, folder: usize, index: usize) -> Option<MockMessage> {
        self.mailbox
            .lock()
            .folders
            .get(folder)
            .and_then(|f| f.messages.get(index))
            .cloned()
    }

    fn open_message(&self) -> DriverResult<(usize, usize, MockMessage)> {
        let View::Message { folder, index, .. } = self.view else {
            return Err(DriverError::ElementNotFound("no message open".to_string()));
        };
        let message = self
            .message(folder, index)
            .ok_or_else(|| DriverError::ElementNotFound("message vanished".to_string()))?;
        Ok((folder, index, message))
    }

    fn submit_login(&mut self) {
        let mut state = self.mailbox.lock();
        if state.rejected.contains(&self.username) {
            return;
        }
        if state.two_factor_polls > 0 {
            self.pending_polls = state.two_factor_polls;
            self.view = View::TwoFactor;
        } else {
            state.logins += 1;
            self.view = View::Mailbox;
        }
    }

    fn open_folder(&mut self, folder: usize) -> DriverResult<()> {
        let mut state = self.mailbox.lock();
        let Some(entry) = state.folders.get(folder) else {
            return Err(DriverError::ElementNotFound("folder".to_string()));
        };
        let name = entry.name.clone();
        let revealed = entry.messages.len().min(state.page_size);
        if state.crash_on_folder.as_deref() == Some(name.as_str()) {
            return Err(DriverError::Browser(format!("page crashed opening {name}")));
        }
        state.folder_visits.push(name);
        drop(state);
        self.view = View::List { folder, revealed };
        Ok(())
    }
}

#[async_trait]
impl PageDriver for MockSession {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        if url == self.layout().login_url {
            self.view = View::Login;
        } else {
            self.view = View::Blank;
        }
        Ok(())
    }

    async fn wait_for_element(&mut self, selector: &str, _timeout: Duration) -> DriverResult<bool> {
        Ok(self.element_count(selector).await? > 0)
    }

    async fn click(&mut self, target: &Locator) -> DriverResult<()> {
        let layout = self.mailbox.layout.clone();

        if self.view == View::Login && target.selector() == layout.submit_button {
            self.submit_login();
            return Ok(());
        }

        if self.logged_in() {
            if let Some(folder) = self.folder_for(target) {
                return self.open_folder(folder);
            }
        }

        if let View::List { folder, revealed } = self.view {
            if target.selector() == layout.message_item && target.index() < revealed {
                let index = target.index();
                let name = self.mailbox.lock().folders[folder].name.clone();
                self.mailbox.lock().opened.push((name, index));
                self.view = View::Message {
                    folder,
                    index,
                    revealed,
                };
                return Ok(());
            }
        }

        Err(DriverError::ElementNotFound(target.to_string()))
    }

    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()> {
        if self.view != View::Login {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        if selector == self.layout().username_input {
            self.username = value.to_string();
        }
        Ok(())
    }

    async fn read_text(&mut self, target: &Locator) -> DriverResult<Option<String>> {
        let layout = self.mailbox.layout.clone();
        let selector = target.selector();

        if selector == layout.label_links {
            let state = self.mailbox.lock();
            return Ok(state
                .folders
                .iter()
                .filter_map(|f| match &f.link {
                    FolderLink::Label(label) => Some(label.clone()),
                    FolderLink::System(_) => None,
                })
                .nth(target.index()));
        }

        if let View::List { folder, revealed } = self.view {
            let rows = self.revealed_rows(folder, revealed);
            let date = match target.child() {
                Some(child)
                    if selector == layout.message_item && child == layout.list_item_date =>
                {
                    rows.get(target.index()).and_then(|m| m.list_date.clone())
                }
                // Page-wide match: the n-th date among rows that show one.
                None if selector == layout.list_item_date => rows
                    .iter()
                    .filter_map(|m| m.list_date.clone())
                    .nth(target.index()),
                _ => None,
            };
            return Ok(date);
        }

        let (_, _, message) = self.open_message()?;
        if message.broken {
            return Err(DriverError::ElementNotFound(target.to_string()));
        }
        let text = if selector == layout.message_subject {
            Some(message.subject)
        } else if selector == layout.message_from {
            Some(message.sender)
        } else if selector == layout.message_date {
            Some(message.date).filter(|d| !d.is_empty())
        } else if selector == layout.message_content {
            Some(message.text)
        } else if selector == layout.attachment_item {
            message
                .attachments
                .get(target.index())
                .map(|a| a.name.clone())
        } else {
            None
        };
        Ok(text)
    }

    async fn read_html(&mut self, target: &Locator) -> DriverResult<Option<String>> {
        let (_, _, message) = self.open_message()?;
        if message.broken {
            return Err(DriverError::ElementNotFound(target.to_string()));
        }
        if message.detached {
            return Err(DriverError::Page("No node with given id found".to_string()));
        }
        Ok((target.selector() == self.layout().message_content).then_some(message.html))
    }

    async fn element_count(&mut self, selector: &str) -> DriverResult<usize> {
        let layout = self.mailbox.layout.clone();
        let count = match self.view {
            View::Login => usize::from(
                selector == layout.username_input
                    || selector == layout.password_input
                    || selector == layout.submit_button,
            ),
            View::TwoFactor => usize::from(selector == layout.two_factor_input),
            View::Blank => 0,
            View::Mailbox | View::List { .. } | View::Message { .. } => {
                let (labels, is_system_link) = {
                    let state = self.mailbox.lock();
                    let labels = state
                        .folders
                        .iter()
                        .filter(|f| matches!(f.link, FolderLink::Label(_)))
                        .count();
                    let is_system_link = state.folders.iter().any(
                        |f| matches!(&f.link, FolderLink::System(s) if s == selector),
                    );
                    (labels, is_system_link)
                };
                if selector == layout.label_links {
                    labels
                } else if is_system_link {
                    1
                } else {
                    self.view_count(selector, &layout)
                }
            }
        };
        Ok(count)
    }

    async fn scroll_into_view(&mut self, target: &Locator) -> DriverResult<()> {
        if let View::List { folder, revealed } = self.view {
            if target.selector() == self.layout().message_item {
                let state = self.mailbox.lock();
                let total = state.folders[folder].messages.len();
                let revealed = total.min(revealed + state.page_size);
                drop(state);
                self.view = View::List { folder, revealed };
            }
        }
        Ok(())
    }

    async fn trigger_download(&mut self, target: &Locator) -> DriverResult<Vec<u8>> {
        let (folder, index, message) = self.open_message()?;
        let attachment = message
            .attachments
            .get(target.index())
            .ok_or_else(|| DriverError::ElementNotFound(target.to_string()))?;
        if attachment.fails {
            return Err(DriverError::Download(format!(
                "{} could not be fetched",
                attachment.name
            )));
        }
        let mut state = self.mailbox.lock();
        let name = state.folders[folder].name.clone();
        state.downloads.push((name, index, attachment.name.clone()));
        Ok(attachment.content.clone())
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        if self.view == View::TwoFactor {
            self.pending_polls = self.pending_polls.saturating_sub(1);
            if self.pending_polls == 0 {
                self.mailbox.lock().logins += 1;
                self.view = View::Mailbox;
            } else {
                let marker = self.layout().two_factor_url_marker.clone();
                return Ok(format!("{}/{marker}", self.layout().login_url));
            }
        }
        Ok(match self.view {
            View::Blank => "about:blank".to_string(),
            View::Login | View::TwoFactor => self.layout().login_url.clone(),
            _ => self.mailbox_url(),
        })
    }

    async fn go_back(&mut self) -> DriverResult<()> {
        self.view = match self.view {
            View::Message {
                folder, revealed, ..
            } => View::List { folder, revealed },
            View::List { .. } => View::Mailbox,
            other => other,
        };
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.mailbox.lock().closed += 1;
        self.view = View::Blank;
        Ok(())
    }
}

impl MockSession {
    fn revealed_rows(&self, folder: usize, revealed: usize) -> Vec<MockMessage> {
        self.mailbox
            .lock()
            .folders
            .get(folder)
            .map(|f| f.messages.iter().take(revealed).cloned().collect())
            .unwrap_or_default()
    }

    fn view_count(&self, selector: &str, layout: &MailboxLayout) -> usize {
        match self.view {
            View::List { folder, revealed } => {
                if selector == layout.message_item {
                    revealed
                } else if selector == layout.list_item_date {
                    self.revealed_rows(folder, revealed)
                        .iter()
                        .filter(|m| m.list_date.is_some())
                        .count()
                } else {
                    0
                }
            }
            View::Message { folder, index, .. } => {
                if selector == layout.attachment_item {
                    self.message(folder, index)
                        .map_or(0, |m| m.attachments.len())
                } else {
                    usize::from(
                        selector == layout.message_content
                            || selector == layout.message_subject
                            || selector == layout.message_from
                            || selector == layout.message_date,
                    )
                }
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn mailbox() -> MockMailbox {
        MockMailbox::new(MailboxLayout::default())
            .folder(
                "Inbox",
                (0..5)
                    .map(|i| MockMessage::new(&format!("m{i}"), "2025-03-10"))
                    .collect(),
            )
            .label("Work", vec![MockMessage::new("w0", "2025-03-10")])
            .with_page_size(2)
    }

    async fn logged_in(mailbox: &MockMailbox) -> MockSession {
        let layout = MailboxLayout::default();
        let mut session = mailbox.launch().await.unwrap();
        session.navigate(&layout.login_url).await.unwrap();
        session.fill(&layout.username_input, "a@x.com").await.unwrap();
        session.click(&Locator::css(&layout.submit_button)).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_login_reaches_mailbox() {
        let mailbox = mailbox();
        let mut session = logged_in(&mailbox).await;
        assert!(session.current_url().await.unwrap().contains("/mail"));
        assert_eq!(mailbox.logins(), 1);
    }

    #[tokio::test]
    async fn test_rejected_login_stays_on_form() {
        let mailbox = mailbox().reject_login("a@x.com");
        let mut session = logged_in(&mailbox).await;
        assert_eq!(
            session.current_url().await.unwrap(),
            MailboxLayout::default().login_url
        );
    }

    #[tokio::test]
    async fn test_list_reveals_rows_on_scroll() {
        let layout = MailboxLayout::default();
        let mailbox = mailbox();
        let mut session = logged_in(&mailbox).await;
        session
            .click(&Locator::css(&layout.system_folders[0].selector))
            .await
            .unwrap();
        assert_eq!(session.element_count(&layout.message_item).await.unwrap(), 2);

        session
            .scroll_into_view(&Locator::nth(&layout.message_item, 1))
            .await
            .unwrap();
        assert_eq!(session.element_count(&layout.message_item).await.unwrap(), 4);
        assert_eq!(mailbox.folder_visits(), vec!["Inbox".to_string()]);
    }

    #[tokio::test]
    async fn test_labels_are_listed_by_name() {
        let layout = MailboxLayout::default();
        let mailbox = mailbox();
        let mut session = logged_in(&mailbox).await;
        assert_eq!(session.element_count(&layout.label_links).await.unwrap(), 1);
        let name = session
            .read_text(&Locator::nth(&layout.label_links, 0))
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("Work"));
    }

    #[tokio::test]
    async fn test_close_is_counted() {
        let mailbox = mailbox();
        let mut session = mailbox.launch().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(mailbox.sessions_launched(), 1);
        assert_eq!(mailbox.sessions_closed(), 1);
    }
}
