//! # mailharvest-core
//!
//! Resumable multi-account webmail crawling for `MailHarvest`.
//!
//! This crate provides:
//! - **Crawl orchestration** - accounts one after another, folders checkpointed as they finish
//! - **Checkpoints** - `progress.json` and `completed_accounts.json`, rewritten atomically
//! - **Folder crawling** - lazy list loading, cutoff early exit, per-message failure isolation
//! - **Message writing** - `.eml` files and attachments with deterministic paths and content
//! - **Driver interface** - the page operations the crawler needs, plus a scripted mock
//!
//! ## Example
//!
//! ```no_run
//! use mailharvest_core::driver::mock::{MockMailbox, MockMessage};
//! use mailharvest_core::layout::MailboxLayout;
//! use mailharvest_core::{Account, CrawlContext, CrawlOrchestrator};
//!
//! # async fn example() -> mailharvest_core::Result<()> {
//! let mailbox = MockMailbox::new(MailboxLayout::default())
//!     .folder("Inbox", vec![MockMessage::new("Hello", "Today")]);
//! let context = CrawlContext::builder("mailharvest_data").days_back(30).build();
//!
//! let report = CrawlOrchestrator::new(context, mailbox)
//!     .run(&[Account::new("alice@proton.me", "secret")])
//!     .await?;
//! assert!(report.all_done());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod crawl;
pub mod driver;
mod error;
pub mod layout;
pub mod login;
pub mod orchestrator;
pub mod writer;

pub use account::credentials;
pub use account::{Account, AccountId, Credential, CredentialError, CredentialResult};
pub use checkpoint::{CompletionRegistry, ProgressMap, ProgressState, ProgressStore};
pub use config::{AccountConfig, CrawlContext, CutoffPolicy, RunConfig, Timeouts};
pub use crawl::{EmailRecord, ExtractionFailure, Folder, FolderCrawler, FolderScan};
pub use driver::{BrowserLauncher, DriverError, DriverResult, Locator, PageDriver};
pub use error::{Error, Result};
pub use orchestrator::{
    AccountOutcome, AccountReport, CrawlOrchestrator, FolderCounts, FolderReport, FolderStatus,
    RunReport,
};
pub use writer::{AttachmentReport, DownloadFailure, MessageWriter};
