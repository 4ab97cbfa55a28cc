//! Run configuration and the immutable crawl context.
//!
//! [`RunConfig`] is what the user writes (a JSON file). [`CrawlContext`] is
//! what the crawler runs with: the cutoff resolved once, selectors, and
//! timeouts, threaded explicitly through orchestrator, crawler, and writer.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::account::{Account, AccountId, credentials};
use crate::clock::{Clock, SharedClock, SystemClock};
use crate::layout::MailboxLayout;
use crate::{Error, Result};

/// Default output directory.
pub const DEFAULT_BASE_DIR: &str = "mailharvest_data";

/// Default number of days to look back.
pub const DEFAULT_DAYS_BACK: u32 = 30;

/// Per-operation wait limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Waiting for the login form and for the mailbox after submitting.
    pub login_secs: u64,
    /// Extra time granted when a second factor is requested.
    pub two_factor_secs: u64,
    /// Waiting for the folder sidebar.
    pub sidebar_secs: u64,
    /// Waiting for a folder's first message row.
    pub folder_secs: u64,
    /// Waiting for an opened message's body.
    pub message_secs: u64,
    /// Interval between condition polls.
    pub poll_interval_ms: u64,
    /// Pause after each scroll before counting rows again.
    pub scroll_settle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            login_secs: 30,
            two_factor_secs: 60,
            sidebar_secs: 10,
            folder_secs: 10,
            message_secs: 5,
            poll_interval_ms: 250,
            scroll_settle_ms: 1000,
        }
    }
}

impl Timeouts {
    /// Timeouts that never sleep, for scripted drivers.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            login_secs: 1,
            two_factor_secs: 1,
            sidebar_secs: 1,
            folder_secs: 1,
            message_secs: 1,
            poll_interval_ms: 0,
            scroll_settle_ms: 0,
        }
    }

    /// Login wait.
    #[must_use]
    pub const fn login(&self) -> Duration {
        Duration::from_secs(self.login_secs)
    }

    /// Second factor wait.
    #[must_use]
    pub const fn two_factor(&self) -> Duration {
        Duration::from_secs(self.two_factor_secs)
    }

    /// Sidebar wait.
    #[must_use]
    pub const fn sidebar(&self) -> Duration {
        Duration::from_secs(self.sidebar_secs)
    }

    /// Folder list wait.
    #[must_use]
    pub const fn folder(&self) -> Duration {
        Duration::from_secs(self.folder_secs)
    }

    /// Message body wait.
    #[must_use]
    pub const fn message(&self) -> Duration {
        Duration::from_secs(self.message_secs)
    }

    /// Poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Scroll settle time.
    #[must_use]
    pub const fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
}

/// An account entry in the run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Mailbox address.
    pub email: String,
    /// Inline password.
    pub password: Option<String>,
    /// Read the password from the system keyring instead.
    pub keyring: bool,
}

impl AccountConfig {
    /// Resolves the entry into an account with its credential.
    ///
    /// # Errors
    ///
    /// Returns an error if no password is configured or the keyring lookup fails.
    pub fn resolve(&self) -> Result<Account> {
        let id = AccountId::new(self.email.trim());
        if let Some(password) = &self.password {
            return Ok(Account::new(id.as_str(), password.as_str()));
        }
        if self.keyring {
            let password = credentials::get_password(&id)?;
            return Ok(Account::new(id.as_str(), password));
        }
        Err(Error::Config(format!(
            "account {id} has neither a password nor \"keyring\": true"
        )))
    }
}

/// Run configuration as read from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Output directory for artifacts and checkpoint files.
    pub base_dir: PathBuf,
    /// How many days back to crawl.
    pub days_back: u32,
    /// Accounts, crawled in this order.
    pub accounts: Vec<AccountConfig>,
    /// Webmail selectors.
    pub layout: MailboxLayout,
    /// Wait limits.
    pub timeouts: Timeouts,
    /// Pause between accounts.
    pub account_pause_secs: u64,
    /// Run the browser without a window.
    pub headless: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            days_back: DEFAULT_DAYS_BACK,
            accounts: Vec::new(),
            layout: MailboxLayout::default(),
            timeouts: Timeouts::default(),
            account_pause_secs: 10,
            headless: false,
        }
    }
}

impl RunConfig {
    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails validation.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the account list.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no accounts, an address is malformed,
    /// or an address is listed twice.
    pub fn validate(&self) -> Result<()> {
        if self.accounts.is_empty() {
            return Err(Error::Config("no accounts configured".to_string()));
        }
        let mut seen = HashSet::new();
        for account in &self.accounts {
            let email = account.email.trim();
            if !email.contains('@') {
                return Err(Error::Config(format!("invalid account address: {email:?}")));
            }
            if !seen.insert(email.to_lowercase()) {
                return Err(Error::Config(format!("account listed twice: {email}")));
            }
        }
        Ok(())
    }

    /// Resolves every account's credential.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error.
    pub fn resolve_accounts(&self) -> Result<Vec<Account>> {
        self.accounts.iter().map(AccountConfig::resolve).collect()
    }
}

/// The cutoff for one run: `now - days_back`, fixed for the run's duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffPolicy {
    cutoff: NaiveDateTime,
}

impl CutoffPolicy {
    /// Computes the cutoff from the clock.
    #[must_use]
    pub fn from_days_back(days_back: u32, clock: &dyn Clock) -> Self {
        Self {
            cutoff: clock.now() - TimeDelta::days(i64::from(days_back)),
        }
    }

    /// Uses an explicit cutoff.
    #[must_use]
    pub const fn at(cutoff: NaiveDateTime) -> Self {
        Self { cutoff }
    }

    /// The earliest date still in scope.
    #[must_use]
    pub const fn cutoff(&self) -> NaiveDateTime {
        self.cutoff
    }

    /// True if `date` is strictly older than the cutoff.
    #[must_use]
    pub fn is_expired(&self, date: NaiveDateTime) -> bool {
        date < self.cutoff
    }
}

/// Immutable settings shared by orchestrator, crawler, and writer.
#[derive(Clone)]
pub struct CrawlContext {
    /// Output directory.
    pub base_dir: PathBuf,
    /// Cutoff for this run.
    pub cutoff: CutoffPolicy,
    /// Webmail selectors.
    pub layout: MailboxLayout,
    /// Wait limits.
    pub timeouts: Timeouts,
    /// Pause between accounts.
    pub account_pause: Duration,
    /// Clock used for relative dates.
    pub clock: SharedClock,
}

impl std::fmt::Debug for CrawlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlContext")
            .field("base_dir", &self.base_dir)
            .field("cutoff", &self.cutoff)
            .field("timeouts", &self.timeouts)
            .field("account_pause", &self.account_pause)
            .finish_non_exhaustive()
    }
}

impl CrawlContext {
    /// Creates a context builder.
    #[must_use]
    pub fn builder(base_dir: impl Into<PathBuf>) -> CrawlContextBuilder {
        CrawlContextBuilder::new(base_dir)
    }

    /// Builds the context for a run configuration using the system clock.
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self::builder(&config.base_dir)
            .days_back(config.days_back)
            .layout(config.layout.clone())
            .timeouts(config.timeouts)
            .account_pause(Duration::from_secs(config.account_pause_secs))
            .build()
    }

    /// Path of the progress checkpoint file.
    #[must_use]
    pub fn progress_file(&self) -> PathBuf {
        self.base_dir.join("progress.json")
    }

    /// Path of the completed accounts file.
    #[must_use]
    pub fn completed_file(&self) -> PathBuf {
        self.base_dir.join("completed_accounts.json")
    }
}

/// Builder for [`CrawlContext`].
pub struct CrawlContextBuilder {
    base_dir: PathBuf,
    days_back: u32,
    layout: MailboxLayout,
    timeouts: Timeouts,
    account_pause: Duration,
    clock: SharedClock,
}

impl CrawlContextBuilder {
    /// Creates a new builder with the given output directory.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            days_back: DEFAULT_DAYS_BACK,
            layout: MailboxLayout::default(),
            timeouts: Timeouts::default(),
            account_pause: Duration::from_secs(10),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets how many days back to crawl.
    #[must_use]
    pub const fn days_back(mut self, days_back: u32) -> Self {
        self.days_back = days_back;
        self
    }

    /// Sets the selectors.
    #[must_use]
    pub fn layout(mut self, layout: MailboxLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the wait limits.
    #[must_use]
    pub const fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets the pause between accounts.
    #[must_use]
    pub const fn account_pause(mut self, pause: Duration) -> Self {
        self.account_pause = pause;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the context, fixing the cutoff.
    #[must_use]
    pub fn build(self) -> CrawlContext {
        let cutoff = CutoffPolicy::from_days_back(self.days_back, self.clock.as_ref());
        CrawlContext {
            base_dir: self.base_dir,
            cutoff,
            layout: self.layout,
            timeouts: self.timeouts,
            account_pause: self.account_pause,
            clock: self.clock,
        }
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
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;

    fn noon(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_cutoff_from_days_back() {
        let policy = CutoffPolicy::from_days_back(7, &FixedClock::new(noon(10)));
        assert_eq!(policy.cutoff(), noon(3));
        assert!(policy.is_expired(noon(2)));
        assert!(!policy.is_expired(noon(3)));
        assert!(!policy.is_expired(noon(9)));
    }

    #[test]
    fn test_builder_defaults() {
        let context = CrawlContext::builder("/tmp/out")
            .clock(Arc::new(FixedClock::new(noon(31))))
            .build();
        assert_eq!(context.cutoff.cutoff(), noon(1));
        assert_eq!(context.progress_file(), PathBuf::from("/tmp/out/progress.json"));
        assert_eq!(
            context.completed_file(),
            PathBuf::from("/tmp/out/completed_accounts.json")
        );
    }

    #[test]
    fn test_config_defaults_from_minimal_json() {
        let config: RunConfig =
            serde_json::from_str(r#"{"accounts": [{"email": "a@x.com", "password": "pw"}]}"#)
                .unwrap();
        assert_eq!(config.days_back, DEFAULT_DAYS_BACK);
        assert_eq!(config.base_dir, PathBuf::from(DEFAULT_BASE_DIR));
        assert!(!config.headless);
        config.validate().unwrap();

        let accounts = config.resolve_accounts().unwrap();
        assert_eq!(accounts[0].id.as_str(), "a@x.com");
        assert_eq!(accounts[0].credential.expose(), "pw");
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let config: RunConfig = serde_json::from_str(
            r#"{"accounts": [{"email": "a@x.com"}, {"email": "A@x.com"}]}"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_and_malformed() {
        assert!(RunConfig::default().validate().is_err());

        let config: RunConfig =
            serde_json::from_str(r#"{"accounts": [{"email": "not-an-address"}]}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_account_without_secret_is_rejected() {
        let account = AccountConfig {
            email: "a@x.com".to_string(),
            ..AccountConfig::default()
        };
        assert!(matches!(account.resolve(), Err(Error::Config(_))));
    }

    #[test]
    fn test_timeouts_partial_override() {
        let timeouts: Timeouts = serde_json::from_str(r#"{"message_secs": 9}"#).unwrap();
        assert_eq!(timeouts.message(), Duration::from_secs(9));
        assert_eq!(timeouts.folder(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(
            &path,
            r#"{"base_dir": "out", "days_back": 7, "accounts": [{"email": "a@x.com", "password": "pw"}]}"#,
        )
        .await
        .unwrap();

        let config = RunConfig::load(&path).await.unwrap();
        assert_eq!(config.days_back, 7);
        assert_eq!(config.base_dir, PathBuf::from("out"));
    }
}
