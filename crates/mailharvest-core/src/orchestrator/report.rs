//! What a run did, per account and folder.

use crate::account::AccountId;
use crate::crawl::FolderScan;

/// How one account ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    /// Already in the completion registry; nothing was done.
    Skipped,
    /// Every folder was crawled and the account was registered as completed.
    Completed,
    /// Login did not reach the mailbox.
    AuthenticationFailed(String),
    /// Crawling stopped early; earlier folder checkpoints remain.
    Failed(String),
}

/// Counters for one crawled folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderCounts {
    /// Rows loaded in the list.
    pub listed: usize,
    /// Messages written.
    pub saved: usize,
    /// Messages that could not be read.
    pub extraction_failures: usize,
    /// Attachment files written.
    pub attachments_saved: usize,
    /// Attachments that could not be saved.
    pub attachment_failures: usize,
    /// The scan ended at the cutoff.
    pub stopped_at_cutoff: bool,
    /// The folder could not be opened.
    pub navigation_failed: bool,
}

impl FolderCounts {
    pub(crate) fn from_scan(scan: &FolderScan) -> Self {
        Self {
            listed: scan.listed,
            extraction_failures: scan.failures.len(),
            stopped_at_cutoff: scan.stopped_at_cutoff,
            navigation_failed: scan.navigation_failed,
            ..Self::default()
        }
    }
}

/// How one folder ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderStatus {
    /// Completed by an earlier run and skipped.
    AlreadyCompleted,
    /// Crawled and checkpointed in this run.
    Completed(FolderCounts),
}

/// Result for one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderReport {
    /// Folder name.
    pub name: String,
    /// What happened.
    pub status: FolderStatus,
}

/// Result for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReport {
    /// The account.
    pub account: AccountId,
    /// How it ended.
    pub outcome: AccountOutcome,
    /// Folders checkpointed or skipped before the account ended.
    pub folders: Vec<FolderReport>,
}

impl AccountReport {
    pub(crate) const fn new(account: AccountId, outcome: AccountOutcome) -> Self {
        Self {
            account,
            outcome,
            folders: Vec::new(),
        }
    }

    /// Messages written for this account in this run.
    #[must_use]
    pub fn saved(&self) -> usize {
        self.folders
            .iter()
            .map(|folder| match folder.status {
                FolderStatus::Completed(counts) => counts.saved,
                FolderStatus::AlreadyCompleted => 0,
            })
            .sum()
    }
}

/// Result of a whole run, accounts in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per input account.
    pub accounts: Vec<AccountReport>,
}

impl RunReport {
    /// Report for `account`, if it was in the input.
    #[must_use]
    pub fn account(&self, account: &AccountId) -> Option<&AccountReport> {
        self.accounts.iter().find(|report| &report.account == account)
    }

    /// Number of accounts with the given outcome kind.
    #[must_use]
    pub fn count(&self, matches: impl Fn(&AccountOutcome) -> bool) -> usize {
        self.accounts
            .iter()
            .filter(|report| matches(&report.outcome))
            .count()
    }

    /// True if every account is completed or was skipped as completed.
    #[must_use]
    pub fn all_done(&self) -> bool {
        self.accounts.iter().all(|report| {
            matches!(
                report.outcome,
                AccountOutcome::Completed | AccountOutcome::Skipped
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(name: &str, saved: usize) -> FolderReport {
        FolderReport {
            name: name.to_string(),
            status: FolderStatus::Completed(FolderCounts {
                saved,
                ..FolderCounts::default()
            }),
        }
    }

    #[test]
    fn test_saved_sums_completed_folders() {
        let mut report = AccountReport::new(AccountId::new("a@x.com"), AccountOutcome::Completed);
        report.folders.push(completed("Inbox", 3));
        report.folders.push(FolderReport {
            name: "Sent".to_string(),
            status: FolderStatus::AlreadyCompleted,
        });
        report.folders.push(completed("Trash", 1));
        assert_eq!(report.saved(), 4);
    }

    #[test]
    fn test_run_report_queries() {
        let run = RunReport {
            accounts: vec![
                AccountReport::new(AccountId::new("a@x.com"), AccountOutcome::Skipped),
                AccountReport::new(
                    AccountId::new("b@x.com"),
                    AccountOutcome::Failed("boom".to_string()),
                ),
            ],
        };
        assert!(!run.all_done());
        assert_eq!(run.count(|o| matches!(o, AccountOutcome::Failed(_))), 1);
        assert!(run.account(&AccountId::new("b@x.com")).is_some());
        assert!(run.account(&AccountId::new("c@x.com")).is_none());
    }
}
