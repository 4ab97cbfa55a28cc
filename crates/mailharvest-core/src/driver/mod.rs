//! Page-automation capability consumed by the crawler.
//!
//! The crawler never talks to a browser directly. It drives a
//! [`PageDriver`] session, one per account, obtained from a
//! [`BrowserLauncher`]. The binary provides a Chromium implementation;
//! [`mock::MockMailbox`] provides a scripted one for tests.

pub mod mock;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Errors reported by a driver.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriverError {
    /// A wait or page load exceeded its timeout.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// No element matched the locator.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A page operation failed but the page is still usable, e.g. a node
    /// detached by a re-render or a script error.
    #[error("Page error: {0}")]
    Page(String),

    /// The browser or its connection is gone.
    #[error("Browser error: {0}")]
    Browser(String),

    /// A download could not be completed.
    #[error("Download failed: {0}")]
    Download(String),
}

impl DriverError {
    /// True if the browser is gone and further calls cannot succeed.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Browser(_))
    }
}

/// Result type for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Addresses an element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// First element matching a CSS selector.
    Css(String),
    /// The `index`-th element (zero-based) matching a CSS selector.
    Nth {
        /// CSS selector.
        selector: String,
        /// Zero-based position among the matches.
        index: usize,
    },
    /// First element matching `child` inside the `index`-th match of
    /// `parent`.
    Within {
        /// CSS selector of the containing elements.
        parent: String,
        /// Zero-based position among the containers.
        index: usize,
        /// CSS selector evaluated inside the container.
        child: String,
    },
}

impl Locator {
    /// First match of `selector`.
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// The `index`-th match of `selector`.
    #[must_use]
    pub fn nth(selector: impl Into<String>, index: usize) -> Self {
        Self::Nth {
            selector: selector.into(),
            index,
        }
    }

    /// First match of `child` inside the `index`-th match of `parent`.
    #[must_use]
    pub fn within(parent: impl Into<String>, index: usize, child: impl Into<String>) -> Self {
        Self::Within {
            parent: parent.into(),
            index,
            child: child.into(),
        }
    }

    /// The CSS selector of the addressed element, or of its container.
    #[must_use]
    pub fn selector(&self) -> &str {
        match self {
            Self::Css(selector) | Self::Nth { selector, .. } => selector,
            Self::Within { parent, .. } => parent,
        }
    }

    /// Zero-based index among the matches of [`Self::selector`].
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Css(_) => 0,
            Self::Nth { index, .. } | Self::Within { index, .. } => *index,
        }
    }

    /// Selector applied inside the container, for [`Locator::Within`].
    #[must_use]
    pub fn child(&self) -> Option<&str> {
        match self {
            Self::Within { child, .. } => Some(child),
            _ => None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => f.write_str(selector),
            Self::Nth { selector, index } => write!(f, "{selector} [{index}]"),
            Self::Within {
                parent,
                index,
                child,
            } => write!(f, "{parent} [{index}] {child}"),
        }
    }
}

/// One live browser page.
///
/// Text and HTML reads return `None` when the element is absent rather
/// than failing; callers decide whether absence matters.
#[async_trait]
pub trait PageDriver: Send {
    /// Loads a URL in the page.
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// Waits until an element matching `selector` exists.
    ///
    /// Returns `false` on timeout.
    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> DriverResult<bool>;

    /// Clicks an element.
    async fn click(&mut self, target: &Locator) -> DriverResult<()>;

    /// Types a value into an input.
    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()>;

    /// Reads the rendered text of an element.
    async fn read_text(&mut self, target: &Locator) -> DriverResult<Option<String>>;

    /// Reads the inner HTML of an element.
    async fn read_html(&mut self, target: &Locator) -> DriverResult<Option<String>>;

    /// Counts elements matching `selector`.
    async fn element_count(&mut self, selector: &str) -> DriverResult<usize>;

    /// Scrolls an element into view, which makes lazy lists load more rows.
    async fn scroll_into_view(&mut self, target: &Locator) -> DriverResult<()>;

    /// Triggers the download behind an element and returns the file content.
    async fn trigger_download(&mut self, target: &Locator) -> DriverResult<Vec<u8>>;

    /// Returns the current page URL.
    async fn current_url(&mut self) -> DriverResult<String>;

    /// Navigates back in history.
    async fn go_back(&mut self) -> DriverResult<()>;

    /// Closes the session and releases the browser.
    async fn close(&mut self) -> DriverResult<()>;
}

/// Opens browser sessions, one per account.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Session type produced by this launcher.
    type Session: PageDriver;

    /// Starts a fresh browser session.
    async fn launch(&self) -> DriverResult<Self::Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_accessors() {
        let css = Locator::css("#a");
        assert_eq!(css.selector(), "#a");
        assert_eq!(css.index(), 0);

        let nth = Locator::nth(".row", 4);
        assert_eq!(nth.selector(), ".row");
        assert_eq!(nth.index(), 4);
        assert_eq!(nth.to_string(), ".row [4]");
        assert_eq!(nth.child(), None);

        let within = Locator::within(".row", 2, "time");
        assert_eq!(within.selector(), ".row");
        assert_eq!(within.index(), 2);
        assert_eq!(within.child(), Some("time"));
        assert_eq!(within.to_string(), ".row [2] time");
    }

    #[test]
    fn test_only_browser_errors_are_fatal() {
        assert!(DriverError::Browser("gone".to_string()).is_fatal());
        assert!(!DriverError::Timeout("slow".to_string()).is_fatal());
        assert!(!DriverError::ElementNotFound("row".to_string()).is_fatal());
        assert!(!DriverError::Page("No node with given id found".to_string()).is_fatal());
    }
}
