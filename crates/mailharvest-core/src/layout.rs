//! Selector table describing the webmail UI.
//!
//! Everything the crawler knows about the page structure lives here, so a
//! different webmail client (or a redesign) only needs a new table in the
//! run configuration. Defaults target Proton Mail.

use serde::{Deserialize, Serialize};

/// A built-in folder link in the mailbox sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemFolder {
    /// Folder name used for checkpoints and directory names.
    pub name: String,
    /// CSS selector of the sidebar link.
    pub selector: String,
}

impl SystemFolder {
    fn new(name: &str, selector: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
        }
    }
}

/// Selectors and URLs for one webmail client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxLayout {
    /// Login page URL.
    pub login_url: String,
    /// Username input on the login page.
    pub username_input: String,
    /// Password input on the login page.
    pub password_input: String,
    /// Login submit button.
    pub submit_button: String,
    /// Input shown when a second factor is requested.
    pub two_factor_input: String,
    /// URL fragment that signals a second factor page.
    pub two_factor_url_marker: String,
    /// URL fragment present once the mailbox has loaded.
    pub mailbox_url_marker: String,
    /// Built-in folders, in crawl order.
    pub system_folders: Vec<SystemFolder>,
    /// Sidebar links for user labels; their text is the label name.
    pub label_links: String,
    /// One row of the message list.
    pub message_item: String,
    /// Date shown inside a message row, relative to [`Self::message_item`].
    pub list_item_date: String,
    /// Body container of an opened message.
    pub message_content: String,
    /// Subject header of an opened message.
    pub message_subject: String,
    /// Sender header of an opened message.
    pub message_from: String,
    /// Date header of an opened message.
    pub message_date: String,
    /// Attachment entries of an opened message; their text is the file name.
    pub attachment_item: String,
    /// Download button inside an attachment entry.
    pub attachment_download: String,
}

impl MailboxLayout {
    /// Selector that proves the mailbox sidebar is present.
    #[must_use]
    pub fn mailbox_ready(&self) -> &str {
        self.system_folders
            .first()
            .map_or(self.message_item.as_str(), |folder| folder.selector.as_str())
    }
}

impl Default for MailboxLayout {
    fn default() -> Self {
        Self {
            login_url: "https://account.proton.me/login".to_string(),
            username_input: r#"input[name="username"]"#.to_string(),
            password_input: r#"input[name="password"]"#.to_string(),
            submit_button: r#"button[type="submit"]"#.to_string(),
            two_factor_input: r#"input[type="text"][placeholder*="code"]"#.to_string(),
            two_factor_url_marker: "two-factor".to_string(),
            mailbox_url_marker: "/mail".to_string(),
            system_folders: vec![
                SystemFolder::new("Inbox", r#"[data-testid="navigation-link:inbox"]"#),
                SystemFolder::new("Sent", r#"[data-testid="navigation-link:sent"]"#),
                SystemFolder::new("Drafts", r#"[data-testid="navigation-link:drafts"]"#),
                SystemFolder::new("Starred", r#"[data-testid="navigation-link:starred"]"#),
                SystemFolder::new("Archive", r#"[data-testid="navigation-link:archive"]"#),
                SystemFolder::new("Spam", r#"[data-testid="navigation-link:spam"]"#),
                SystemFolder::new("Trash", r#"[data-testid="navigation-link:trash"]"#),
            ],
            label_links: r#"[data-testid^="navigation-link:label-"]"#.to_string(),
            message_item: r#"[data-testid="message-item"]"#.to_string(),
            list_item_date: "time".to_string(),
            message_content: r#"[data-testid="message-content"]"#.to_string(),
            message_subject: r#"[data-testid="message-header-subject"]"#.to_string(),
            message_from: r#"[data-testid="message-header-from"]"#.to_string(),
            message_date: r#"[data-testid="message-header-date"]"#.to_string(),
            attachment_item: r#"[data-testid^="attachment-"]"#.to_string(),
            attachment_download: r#"button[title*="Download"]"#.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_starts_with_inbox() {
        let layout = MailboxLayout::default();
        assert_eq!(layout.system_folders[0].name, "Inbox");
        assert_eq!(layout.mailbox_ready(), layout.system_folders[0].selector);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let layout: MailboxLayout =
            serde_json::from_str(r#"{"login_url": "https://mail.example.test/login"}"#).unwrap();
        assert_eq!(layout.login_url, "https://mail.example.test/login");
        assert_eq!(layout.message_item, MailboxLayout::default().message_item);
    }
}
