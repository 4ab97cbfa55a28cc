//! Chromium driver over the DevTools protocol.
//!
//! Each account gets its own browser process and a private download
//! directory. Attachments are fetched by clicking their download button and
//! waiting for the file to land in that directory.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use mailharvest_core::{BrowserLauncher, DriverError, DriverResult, Locator, PageDriver};

/// Interval between element and download polls.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Suffix Chromium uses for downloads in progress.
const PARTIAL_DOWNLOAD: &str = "crdownload";

fn browser_error(e: CdpError) -> DriverError {
    DriverError::Browser(e.to_string())
}

/// True if the error means the connection to the browser is gone.
const fn connection_lost(e: &CdpError) -> bool {
    matches!(
        e,
        CdpError::Ws(..) | CdpError::ChannelSendError(..) | CdpError::NoResponse | CdpError::Io(..)
    )
}

fn download_error(e: std::io::Error) -> DriverError {
    DriverError::Download(e.to_string())
}

/// Launches one Chromium process per account.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    headless: bool,
    download_button: String,
    download_timeout: Duration,
}

impl ChromiumLauncher {
    /// Creates a launcher. `download_button` is looked up inside each
    /// attachment entry.
    pub fn new(headless: bool, download_button: impl Into<String>) -> Self {
        Self {
            headless,
            download_button: download_button.into(),
            download_timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self) -> DriverResult<ChromiumSession> {
        let downloads = TempDir::new().map_err(download_error)?;

        let mut builder = BrowserConfig::builder().window_size(1920, 1080);
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Browser)?;

        let (mut browser, mut handler) = Browser::launch(config).await.map_err(browser_error)?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {}", e);
                }
            }
        });

        let setup = async {
            let behavior = SetDownloadBehaviorParams::builder()
                .behavior(SetDownloadBehaviorBehavior::Allow)
                .download_path(downloads.path().to_string_lossy())
                .build()
                .map_err(DriverError::Browser)?;
            browser.execute(behavior).await.map_err(browser_error)?;
            browser.new_page("about:blank").await.map_err(browser_error)
        };
        let page = match setup.await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close) = browser.close().await {
                    warn!("Could not close the browser: {}", close);
                }
                events.abort();
                return Err(e);
            }
        };

        debug!("Browser started, downloads in {}", downloads.path().display());
        Ok(ChromiumSession {
            browser: Some(browser),
            page,
            events: Some(events),
            downloads,
            download_button: self.download_button.clone(),
            download_timeout: self.download_timeout,
        })
    }
}

/// One browser process with a single page.
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Page,
    events: Option<JoinHandle<()>>,
    downloads: TempDir,
    download_button: String,
    download_timeout: Duration,
}

impl ChromiumSession {
    /// Maps a failed page operation to a driver error.
    ///
    /// Node, script, and input errors leave the page usable and are
    /// reported as [`DriverError::Page`], unless the page no longer answers
    /// at all.
    async fn check<T>(&self, result: Result<T, CdpError>) -> DriverResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if connection_lost(&e) => Err(browser_error(e)),
            Err(e) => match self.page.url().await {
                Ok(_) => Err(DriverError::Page(e.to_string())),
                Err(alive) => {
                    warn!("Page stopped responding after {}: {}", e, alive);
                    Err(browser_error(alive))
                }
            },
        }
    }

    async fn elements(&self, selector: &str) -> DriverResult<Vec<Element>> {
        self.check(self.page.find_elements(selector).await).await
    }

    async fn optional_element(&self, target: &Locator) -> DriverResult<Option<Element>> {
        let Some(found) = self
            .elements(target.selector())
            .await?
            .into_iter()
            .nth(target.index())
        else {
            return Ok(None);
        };
        match target.child() {
            None => Ok(Some(found)),
            Some(child) => Ok(self
                .check(found.find_elements(child).await)
                .await?
                .into_iter()
                .next()),
        }
    }

    async fn element(&self, target: &Locator) -> DriverResult<Element> {
        self.optional_element(target)
            .await?
            .ok_or_else(|| DriverError::ElementNotFound(target.to_string()))
    }

    /// Completed files in the download directory.
    async fn finished_downloads(&self) -> DriverResult<HashSet<PathBuf>> {
        let mut entries = tokio::fs::read_dir(self.downloads.path())
            .await
            .map_err(download_error)?;
        let mut files = HashSet::new();
        while let Some(entry) = entries.next_entry().await.map_err(download_error)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == PARTIAL_DOWNLOAD) {
                continue;
            }
            files.insert(path);
        }
        Ok(files)
    }
}

#[async_trait]
impl PageDriver for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.check(self.page.goto(url).await).await?;
        Ok(())
    }

    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> DriverResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.elements(selector).await?.is_empty() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&mut self, target: &Locator) -> DriverResult<()> {
        let element = self.element(target).await?;
        self.check(element.click().await).await?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()> {
        let input = self.element(&Locator::css(selector)).await?;
        self.check(input.click().await).await?;
        self.check(
            input
                .call_js_fn("function() { this.value = ''; }", false)
                .await,
        )
        .await?;
        self.check(input.type_str(value).await).await?;
        Ok(())
    }

    async fn read_text(&mut self, target: &Locator) -> DriverResult<Option<String>> {
        match self.optional_element(target).await? {
            Some(element) => self.check(element.inner_text().await).await,
            None => Ok(None),
        }
    }

    async fn read_html(&mut self, target: &Locator) -> DriverResult<Option<String>> {
        match self.optional_element(target).await? {
            Some(element) => self.check(element.inner_html().await).await,
            None => Ok(None),
        }
    }

    async fn element_count(&mut self, selector: &str) -> DriverResult<usize> {
        Ok(self.elements(selector).await?.len())
    }

    async fn scroll_into_view(&mut self, target: &Locator) -> DriverResult<()> {
        let element = self.element(target).await?;
        self.check(element.scroll_into_view().await).await?;
        Ok(())
    }

    async fn trigger_download(&mut self, target: &Locator) -> DriverResult<Vec<u8>> {
        let before = self.finished_downloads().await?;
        let item = self.element(target).await?;
        match item.find_element(self.download_button.as_str()).await {
            Ok(button) => {
                self.check(button.click().await).await?;
            }
            Err(_) => {
                self.check(item.click().await).await?;
            }
        }

        let deadline = Instant::now() + self.download_timeout;
        loop {
            let fresh = self
                .finished_downloads()
                .await?
                .into_iter()
                .find(|path| !before.contains(path));
            if let Some(path) = fresh {
                let content = tokio::fs::read(&path).await.map_err(download_error)?;
                // Free the name for the next attachment with the same name.
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    debug!("Could not remove {}: {}", path.display(), e);
                }
                return Ok(content);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Download(format!("{target} did not finish")));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(browser_error)?
            .unwrap_or_default())
    }

    async fn go_back(&mut self) -> DriverResult<()> {
        self.check(self.page.evaluate("window.history.back()").await)
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        let result = match self.browser.take() {
            Some(mut browser) => {
                let closed = browser.close().await.map_err(browser_error);
                if let Err(e) = browser.wait().await {
                    debug!("Browser did not exit cleanly: {}", e);
                }
                closed.map(|_| ())
            }
            None => Ok(()),
        };
        if let Some(events) = self.events.take() {
            events.abort();
        }
        result
    }
}
