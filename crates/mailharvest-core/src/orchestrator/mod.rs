//! Sequential multi-account crawl with folder checkpoints.
//!
//! For each account the orchestrator consults the completion registry,
//! opens a browser session, signs in, and crawls every folder not yet
//! completed. After each folder it rewrites `progress.json`; after the last
//! folder it registers the account as completed and drops its progress
//! entry. The session is closed whatever happens.
//!
//! Failure handling:
//!
//! - A login that does not reach the mailbox ends the account without
//!   writing progress.
//! - A message that cannot be written ends the account before its folder is
//!   checkpointed, so the folder is redone on the next run.
//! - A browser failure ends the account; earlier checkpoints remain.
//! - A checkpoint file that cannot be read or written ends the run.

mod report;

use tracing::{error, info, warn};

pub use report::{
    AccountOutcome, AccountReport, FolderCounts, FolderReport, FolderStatus, RunReport,
};

use crate::account::{Account, AccountId};
use crate::checkpoint::{CompletionRegistry, ProgressState, ProgressStore};
use crate::config::CrawlContext;
use crate::crawl::{EmailRecord, Folder, FolderCrawler};
use crate::driver::{BrowserLauncher, DriverError, PageDriver};
use crate::login::login;
use crate::writer::{AttachmentReport, MessageWriter};
use crate::{Error, Result};

/// Why an account's crawl ended early.
#[derive(Debug, thiserror::Error)]
enum AccountError {
    #[error("login failed: {0}")]
    Authentication(String),

    #[error("browser failure: {0}")]
    Driver(#[from] DriverError),

    #[error("could not write message: {0}")]
    Storage(#[source] Error),

    #[error("checkpoint failure: {0}")]
    Checkpoint(#[source] Error),
}

/// Crawls accounts one after another.
pub struct CrawlOrchestrator<L> {
    context: CrawlContext,
    launcher: L,
    progress: ProgressStore,
    registry: CompletionRegistry,
}

impl<L: BrowserLauncher> CrawlOrchestrator<L> {
    /// Creates an orchestrator whose checkpoints live in the context's
    /// output directory.
    #[must_use]
    pub fn new(context: CrawlContext, launcher: L) -> Self {
        let progress = ProgressStore::new(context.progress_file());
        let registry = CompletionRegistry::new(context.completed_file());
        Self {
            context,
            launcher,
            progress,
            registry,
        }
    }

    /// The run's context.
    #[must_use]
    pub const fn context(&self) -> &CrawlContext {
        &self.context
    }

    /// The progress store.
    #[must_use]
    pub const fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// The completion registry.
    #[must_use]
    pub const fn registry(&self) -> &CompletionRegistry {
        &self.registry
    }

    /// Crawls `accounts` in order.
    ///
    /// A failing account does not stop the run; see the module docs.
    ///
    /// # Errors
    ///
    /// Returns an error if a checkpoint file cannot be read or written.
    pub async fn run(&self, accounts: &[Account]) -> Result<RunReport> {
        info!(
            "Crawling {} accounts, cutoff {}",
            accounts.len(),
            self.context.cutoff.cutoff().format("%Y-%m-%d %H:%M")
        );

        let mut report = RunReport::default();
        for (position, account) in accounts.iter().enumerate() {
            info!("[Account {}/{}] {}", position + 1, accounts.len(), account.id);
            let result = self.crawl_account(account).await?;
            let touched_browser = result.outcome != AccountOutcome::Skipped;
            report.accounts.push(result);

            let last = position + 1 == accounts.len();
            if touched_browser && !last && !self.context.account_pause.is_zero() {
                info!(
                    "Waiting {}s before the next account",
                    self.context.account_pause.as_secs()
                );
                tokio::time::sleep(self.context.account_pause).await;
            }
        }
        Ok(report)
    }

    /// Crawls a single account.
    ///
    /// # Errors
    ///
    /// Returns an error if a checkpoint file cannot be read or written.
    pub async fn crawl_account(&self, account: &Account) -> Result<AccountReport> {
        if self.registry.contains(&account.id).await? {
            info!("Account {} already completed, skipping", account.id);
            return Ok(AccountReport::new(account.id.clone(), AccountOutcome::Skipped));
        }

        let state = self
            .progress
            .load()
            .await?
            .remove(&account.id)
            .unwrap_or_default();

        let mut session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => {
                error!("Could not start a browser for {}: {}", account.id, e);
                return Ok(AccountReport::new(
                    account.id.clone(),
                    AccountOutcome::Failed(e.to_string()),
                ));
            }
        };

        let mut report = AccountReport::new(account.id.clone(), AccountOutcome::Completed);
        let result = self
            .crawl_session(&mut session, account, state, &mut report.folders)
            .await;
        if let Err(e) = session.close().await {
            warn!("Could not close the browser for {}: {}", account.id, e);
        }

        report.outcome = match result {
            Ok(()) => {
                info!("Completed {}", account.id);
                AccountOutcome::Completed
            }
            Err(AccountError::Checkpoint(e)) => return Err(e),
            Err(AccountError::Authentication(reason)) => {
                error!("Login failed for {}: {}", account.id, reason);
                AccountOutcome::AuthenticationFailed(reason)
            }
            Err(e) => {
                error!("Stopped crawling {}: {}", account.id, e);
                AccountOutcome::Failed(e.to_string())
            }
        };
        Ok(report)
    }

    async fn crawl_session(
        &self,
        session: &mut L::Session,
        account: &Account,
        mut state: ProgressState,
        folders_done: &mut Vec<FolderReport>,
    ) -> std::result::Result<(), AccountError> {
        match login(session, account, &self.context).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(AccountError::Authentication(
                    "mailbox did not load".to_string(),
                ));
            }
            Err(e) if e.is_fatal() => return Err(AccountError::Driver(e)),
            Err(e) => return Err(AccountError::Authentication(e.to_string())),
        }

        let crawler = FolderCrawler::new(&self.context);
        let folders = crawler.discover_folders(session).await?;

        for (position, folder) in folders.iter().enumerate() {
            if state.is_completed(&folder.name) {
                info!("Folder {} already completed, skipping", folder.name);
                folders_done.push(FolderReport {
                    name: folder.name.clone(),
                    status: FolderStatus::AlreadyCompleted,
                });
                continue;
            }

            info!(
                "--- Folder {}/{}: {} ---",
                position + 1,
                folders.len(),
                folder.name
            );
            let counts = self.crawl_folder(session, &account.id, folder).await?;

            state.mark_completed(&folder.name, position);
            self.save_progress(&account.id, &state)
                .await
                .map_err(AccountError::Checkpoint)?;
            info!(
                "Completed folder {} ({} saved, {} failed)",
                folder.name, counts.saved, counts.extraction_failures
            );
            folders_done.push(FolderReport {
                name: folder.name.clone(),
                status: FolderStatus::Completed(counts),
            });
        }

        self.registry
            .mark_done(&account.id)
            .await
            .map_err(AccountError::Checkpoint)?;
        self.clear_progress(&account.id)
            .await
            .map_err(AccountError::Checkpoint)?;
        Ok(())
    }

    async fn crawl_folder(
        &self,
        session: &mut L::Session,
        account: &AccountId,
        folder: &Folder,
    ) -> std::result::Result<FolderCounts, AccountError> {
        let crawler = FolderCrawler::new(&self.context);
        let writer = MessageWriter::new(&self.context);

        let scan = crawler.extract(session, folder).await?;
        let mut counts = FolderCounts::from_scan(&scan);

        for record in &scan.records {
            let path = writer
                .persist(record, account)
                .await
                .map_err(AccountError::Storage)?;
            info!("Saved {}", path.display());
            counts.saved += 1;

            if record.has_attachments() {
                let attachments = self
                    .fetch_attachments(session, account, folder, record)
                    .await;
                counts.attachments_saved += attachments.saved.len();
                counts.attachment_failures += attachments.failures.len();
            }
        }
        Ok(counts)
    }

    async fn fetch_attachments(
        &self,
        session: &mut L::Session,
        account: &AccountId,
        folder: &Folder,
        record: &EmailRecord,
    ) -> AttachmentReport {
        let crawler = FolderCrawler::new(&self.context);
        match crawler.reopen(session, folder, record).await {
            Ok(true) => {
                let report = MessageWriter::new(&self.context)
                    .persist_attachments(record, account, session)
                    .await;
                crawler.return_to_list(session).await;
                report
            }
            Ok(false) => AttachmentReport::unavailable(record, "message moved in the list"),
            Err(e) => {
                warn!("Could not reopen {} for attachments: {}", record.id, e);
                AttachmentReport::unavailable(record, &e.to_string())
            }
        }
    }

    /// Writes `state` for `account`, keeping other accounts' entries.
    async fn save_progress(&self, account: &AccountId, state: &ProgressState) -> Result<()> {
        let mut map = self.progress.load().await?;
        map.insert(account.clone(), state.clone());
        self.progress.save(&map).await
    }

    async fn clear_progress(&self, account: &AccountId) -> Result<()> {
        let mut map = self.progress.load().await?;
        if map.remove(account).is_some() {
            self.progress.save(&map).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::clock::FixedClock;
    use crate::config::Timeouts;
    use crate::driver::mock::{MockMailbox, MockMessage};
    use crate::layout::MailboxLayout;

    fn orchestrator(
        dir: &tempfile::TempDir,
        mailbox: &MockMailbox,
    ) -> CrawlOrchestrator<MockMailbox> {
        let now = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let context = CrawlContext::builder(dir.path())
            .days_back(7)
            .timeouts(Timeouts::immediate())
            .account_pause(std::time::Duration::ZERO)
            .clock(Arc::new(FixedClock::new(now)))
            .build();
        CrawlOrchestrator::new(context, mailbox.clone())
    }

    #[tokio::test]
    async fn test_completed_account_is_skipped_without_browser() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = MockMailbox::new(MailboxLayout::default()).folder("Inbox", vec![]);
        let orchestrator = orchestrator(&dir, &mailbox);
        let account = Account::new("a@x.com", "pw");
        orchestrator.registry().mark_done(&account.id).await.unwrap();

        let report = orchestrator.crawl_account(&account).await.unwrap();
        assert_eq!(report.outcome, AccountOutcome::Skipped);
        assert_eq!(mailbox.sessions_launched(), 0);
    }

    #[tokio::test]
    async fn test_launch_failure_fails_account() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = MockMailbox::new(MailboxLayout::default()).with_launch_failure();
        let orchestrator = orchestrator(&dir, &mailbox);

        let report = orchestrator
            .crawl_account(&Account::new("a@x.com", "pw"))
            .await
            .unwrap();
        assert!(matches!(report.outcome, AccountOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_session_closed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = MockMailbox::new(MailboxLayout::default())
            .folder("Inbox", vec![MockMessage::new("hi", "2025-03-09")]);
        let orchestrator = orchestrator(&dir, &mailbox);

        let report = orchestrator
            .crawl_account(&Account::new("a@x.com", "pw"))
            .await
            .unwrap();
        assert_eq!(report.outcome, AccountOutcome::Completed);
        assert_eq!(report.saved(), 1);
        assert_eq!(mailbox.sessions_closed(), 1);
        assert!(orchestrator.progress().load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_progress_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = MockMailbox::new(MailboxLayout::default()).folder("Inbox", vec![]);
        let orchestrator = orchestrator(&dir, &mailbox);
        tokio::fs::write(orchestrator.progress().path(), "not json")
            .await
            .unwrap();

        let result = orchestrator.run(&[Account::new("a@x.com", "pw")]).await;
        assert!(matches!(result, Err(Error::Serde(_))));
    }
}
