//! Folder discovery and message extraction.
//!
//! [`FolderCrawler`] walks one folder's message list newest-first and stops
//! at the first message older than the run's cutoff. Failures reading a
//! single message are collected in the [`FolderScan`] instead of aborting
//! the folder.

mod crawler;
pub mod date;
mod record;

pub use crawler::FolderCrawler;
pub use record::{
    EmailRecord, ExtractionFailure, Folder, FolderScan, NO_SUBJECT, UNKNOWN_SENDER, record_id,
};
