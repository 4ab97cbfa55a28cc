//! Integration tests for resumable crawling.
//!
//! These tests run the orchestrator against a scripted mailbox and a
//! temporary output directory, then inspect the files left on disk.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use mailharvest_core::clock::FixedClock;
use mailharvest_core::driver::mock::{MockMailbox, MockMessage};
use mailharvest_core::layout::MailboxLayout;
use mailharvest_core::{
    Account, AccountId, AccountOutcome, CrawlContext, CrawlOrchestrator, FolderStatus,
    ProgressState, Timeouts,
};

/// Runs happen on 2025-03-10 at noon with a 7 day window.
fn orchestrator(dir: &Path, mailbox: &MockMailbox) -> CrawlOrchestrator<MockMailbox> {
    let now = NaiveDate::from_ymd_opt(2025, 3, 10)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let context = CrawlContext::builder(dir)
        .days_back(7)
        .timeouts(Timeouts::immediate())
        .account_pause(Duration::ZERO)
        .clock(Arc::new(FixedClock::new(now)))
        .build();
    CrawlOrchestrator::new(context, mailbox.clone())
}

fn alice() -> Account {
    Account::new("alice@proton.me", "secret")
}

/// Every artifact under `dir` (checkpoint files excluded), by relative path.
fn artifacts(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else if path.extension().is_none_or(|ext| ext != "json") {
                let relative = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(relative, std::fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    if dir.exists() {
        walk(dir, dir, &mut out);
    }
    out
}

fn two_folder_mailbox() -> MockMailbox {
    MockMailbox::new(MailboxLayout::default())
        .folder(
            "Inbox",
            vec![
                MockMessage::new("Lunch?", "2025-03-09"),
                MockMessage::new("Invoice", "Mar 8, 2025")
                    .with_attachment("invoice.pdf", b"%PDF-1.7"),
                MockMessage::new("Old news", "2025-01-02"),
            ],
        )
        .folder(
            "Sent",
            vec![
                MockMessage::new("Re: Lunch?", "2025-03-09"),
                MockMessage::new("Ancient", "2024-11-30"),
            ],
        )
}

#[tokio::test]
async fn three_messages_seven_days() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
        "Inbox",
        vec![
            MockMessage::new("one day old", "2025-03-09"),
            MockMessage::new("three days old", "2025-03-07"),
            MockMessage::new("ten days old", "2025-02-28"),
        ],
    );
    let orchestrator = orchestrator(dir.path(), &mailbox);

    let report = orchestrator.run(&[alice()]).await.unwrap();

    let files: Vec<PathBuf> = artifacts(dir.path()).into_keys().collect();
    assert_eq!(
        files,
        vec![
            PathBuf::from("alice_at_proton.me/Inbox/Inbox_0_one day old.eml"),
            PathBuf::from("alice_at_proton.me/Inbox/Inbox_1_three days old.eml"),
        ]
    );
    // The old message is recognized from its list row and never opened.
    assert_eq!(
        mailbox.opened(),
        vec![("Inbox".to_string(), 0), ("Inbox".to_string(), 1)]
    );

    let account = &report.accounts[0];
    assert_eq!(account.outcome, AccountOutcome::Completed);
    let FolderStatus::Completed(counts) = account.folders[0].status else {
        panic!("Inbox should be crawled");
    };
    assert!(counts.stopped_at_cutoff);
    assert_eq!(counts.saved, 2);

    let completed = orchestrator.registry().load_all().await.unwrap();
    assert_eq!(completed, vec![AccountId::new("alice@proton.me")]);
    assert!(orchestrator.progress().load().await.unwrap().is_empty());
}

#[tokio::test]
async fn crash_after_inbox_resumes_at_sent() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = two_folder_mailbox();
    let orchestrator = orchestrator(dir.path(), &mailbox);

    mailbox.crash_on_folder("Sent");
    let first = orchestrator.run(&[alice()]).await.unwrap();
    assert!(matches!(first.accounts[0].outcome, AccountOutcome::Failed(_)));
    assert_eq!(mailbox.sessions_closed(), 1);

    let progress = orchestrator.progress().load().await.unwrap();
    assert_eq!(
        progress.get(&AccountId::new("alice@proton.me")),
        Some(&ProgressState {
            current_folder: 1,
            completed_folders: vec!["Inbox".to_string()],
        })
    );
    assert!(orchestrator.registry().load_all().await.unwrap().is_empty());

    mailbox.clear_crash();
    mailbox.reset_observations();
    let second = orchestrator.run(&[alice()]).await.unwrap();

    let account = &second.accounts[0];
    assert_eq!(account.outcome, AccountOutcome::Completed);
    assert_eq!(account.folders[0].status, FolderStatus::AlreadyCompleted);
    assert_eq!(mailbox.folder_visits(), vec!["Sent".to_string()]);
    assert!(orchestrator.progress().load().await.unwrap().is_empty());
    assert!(
        orchestrator
            .registry()
            .contains(&AccountId::new("alice@proton.me"))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn interrupted_run_matches_clean_run() {
    let clean_dir = tempfile::tempdir().unwrap();
    let clean_mailbox = two_folder_mailbox();
    orchestrator(clean_dir.path(), &clean_mailbox)
        .run(&[alice()])
        .await
        .unwrap();

    let resumed_dir = tempfile::tempdir().unwrap();
    let resumed_mailbox = two_folder_mailbox();
    let resumed = orchestrator(resumed_dir.path(), &resumed_mailbox);
    resumed_mailbox.crash_on_folder("Sent");
    resumed.run(&[alice()]).await.unwrap();
    resumed_mailbox.clear_crash();
    resumed.run(&[alice()]).await.unwrap();

    let clean = artifacts(clean_dir.path());
    assert_eq!(clean.len(), 4, "two Inbox messages, one attachment, one Sent message");
    assert_eq!(clean, artifacts(resumed_dir.path()));
}

#[tokio::test]
async fn redoing_a_folder_rewrites_identical_files() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = two_folder_mailbox();
    let orchestrator = orchestrator(dir.path(), &mailbox);

    orchestrator.run(&[alice()]).await.unwrap();
    let before = artifacts(dir.path());

    // Forget completion so every folder is crawled again.
    tokio::fs::remove_file(orchestrator.registry().path())
        .await
        .unwrap();
    orchestrator.run(&[alice()]).await.unwrap();

    assert_eq!(before, artifacts(dir.path()));
}

#[tokio::test]
async fn completed_account_is_never_revisited() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = two_folder_mailbox();
    let orchestrator = orchestrator(dir.path(), &mailbox);

    orchestrator.run(&[alice()]).await.unwrap();
    let launched = mailbox.sessions_launched();
    let registry = tokio::fs::read(orchestrator.registry().path()).await.unwrap();

    let again = orchestrator.run(&[alice()]).await.unwrap();
    assert_eq!(again.accounts[0].outcome, AccountOutcome::Skipped);
    assert_eq!(mailbox.sessions_launched(), launched);
    assert_eq!(
        tokio::fs::read(orchestrator.registry().path()).await.unwrap(),
        registry
    );
}

#[tokio::test]
async fn login_failure_writes_no_progress() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = two_folder_mailbox().reject_login("alice@proton.me");
    let orchestrator = orchestrator(dir.path(), &mailbox);
    let bob = Account::new("bob@proton.me", "hunter2");

    let report = orchestrator.run(&[alice(), bob]).await.unwrap();

    assert!(matches!(
        report.accounts[0].outcome,
        AccountOutcome::AuthenticationFailed(_)
    ));
    assert_eq!(report.accounts[1].outcome, AccountOutcome::Completed);
    assert_eq!(mailbox.sessions_closed(), 2);

    let progress = orchestrator.progress().load().await.unwrap();
    assert!(!progress.contains_key(&AccountId::new("alice@proton.me")));
    assert_eq!(
        orchestrator.registry().load_all().await.unwrap(),
        vec![AccountId::new("bob@proton.me")]
    );
    assert!(!dir.path().join("alice_at_proton.me").exists());
}

#[tokio::test]
async fn unreadable_message_does_not_stop_folder() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
        "Inbox",
        vec![
            MockMessage::new("first", "2025-03-09"),
            MockMessage::new("garbled", "2025-03-09").broken(),
            MockMessage::new("third", "2025-03-08"),
        ],
    );
    let orchestrator = orchestrator(dir.path(), &mailbox);

    let report = orchestrator.run(&[alice()]).await.unwrap();

    let FolderStatus::Completed(counts) = report.accounts[0].folders[0].status else {
        panic!("Inbox should be crawled");
    };
    assert_eq!(counts.saved, 2);
    assert_eq!(counts.extraction_failures, 1);
    assert_eq!(report.accounts[0].outcome, AccountOutcome::Completed);

    let files: Vec<PathBuf> = artifacts(dir.path()).into_keys().collect();
    assert_eq!(
        files,
        vec![
            PathBuf::from("alice_at_proton.me/Inbox/Inbox_0_first.eml"),
            PathBuf::from("alice_at_proton.me/Inbox/Inbox_2_third.eml"),
        ]
    );
}

#[tokio::test]
async fn failed_attachment_does_not_stop_folder() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
        "Inbox",
        vec![
            MockMessage::new("photos", "2025-03-09")
                .with_failing_attachment("broken.jpg")
                .with_attachment("ok.jpg", b"jpeg"),
            MockMessage::new("after", "2025-03-09"),
        ],
    );
    let orchestrator = orchestrator(dir.path(), &mailbox);

    let report = orchestrator.run(&[alice()]).await.unwrap();

    let FolderStatus::Completed(counts) = report.accounts[0].folders[0].status else {
        panic!("Inbox should be crawled");
    };
    assert_eq!(counts.saved, 2);
    assert_eq!(counts.attachments_saved, 1);
    assert_eq!(counts.attachment_failures, 1);
    let saved = dir
        .path()
        .join("alice_at_proton.me/Inbox/Inbox_0_attachments/ok.jpg");
    assert_eq!(std::fs::read(saved).unwrap(), b"jpeg");
    assert_eq!(
        mailbox.downloads(),
        vec![("Inbox".to_string(), 0, "ok.jpg".to_string())]
    );
}

#[tokio::test]
async fn detached_message_does_not_stop_folder() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = MockMailbox::new(MailboxLayout::default()).folder(
        "Inbox",
        vec![
            MockMessage::new("first", "2025-03-09"),
            MockMessage::new("re-rendered", "2025-03-09").detached(),
            MockMessage::new("third", "2025-03-08"),
        ],
    );
    let orchestrator = orchestrator(dir.path(), &mailbox);

    let report = orchestrator.run(&[alice()]).await.unwrap();

    assert_eq!(report.accounts[0].outcome, AccountOutcome::Completed);
    let FolderStatus::Completed(counts) = report.accounts[0].folders[0].status else {
        panic!("Inbox should be crawled");
    };
    assert_eq!(counts.saved, 2);
    assert_eq!(counts.extraction_failures, 1);
}

#[tokio::test]
async fn long_multibyte_subject_completes_account() {
    let dir = tempfile::tempdir().unwrap();
    let subject = "日本語".repeat(34);
    let mailbox = MockMailbox::new(MailboxLayout::default())
        .folder("Inbox", vec![MockMessage::new(&subject, "2025-03-09")])
        .label(&"長いラベル".repeat(30), vec![MockMessage::new(&subject, "2025-03-09")]);
    let orchestrator = orchestrator(dir.path(), &mailbox);

    let report = orchestrator.run(&[alice()]).await.unwrap();

    assert_eq!(report.accounts[0].outcome, AccountOutcome::Completed);
    assert_eq!(report.accounts[0].saved(), 2);
    let files = artifacts(dir.path());
    assert_eq!(files.len(), 2);
    for path in files.keys() {
        for component in path {
            assert!(component.len() <= 255, "{}", path.display());
        }
    }

    // The same names are derived again, so a rerun converges.
    std::fs::remove_file(orchestrator.registry().path()).unwrap();
    let again = orchestrator.run(&[alice()]).await.unwrap();
    assert_eq!(again.accounts[0].outcome, AccountOutcome::Completed);
    assert_eq!(artifacts(dir.path()), files);
}

#[tokio::test]
async fn write_failure_leaves_folder_for_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = two_folder_mailbox();
    let orchestrator = orchestrator(dir.path(), &mailbox);

    // A file where the Sent directory belongs makes every Sent write fail.
    let blocker = dir.path().join("alice_at_proton.me").join("Sent");
    std::fs::create_dir_all(blocker.parent().unwrap()).unwrap();
    std::fs::write(&blocker, b"").unwrap();

    let first = orchestrator.run(&[alice()]).await.unwrap();
    assert!(matches!(first.accounts[0].outcome, AccountOutcome::Failed(_)));
    let progress = orchestrator.progress().load().await.unwrap();
    assert_eq!(
        progress[&AccountId::new("alice@proton.me")].completed_folders,
        vec!["Inbox".to_string()]
    );

    std::fs::remove_file(&blocker).unwrap();
    let second = orchestrator.run(&[alice()]).await.unwrap();
    assert_eq!(second.accounts[0].outcome, AccountOutcome::Completed);
    assert!(
        dir.path()
            .join("alice_at_proton.me/Sent/Sent_0_Re_ Lunch_.eml")
            .exists()
    );
}

#[tokio::test]
async fn empty_folder_is_still_completed() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = MockMailbox::new(MailboxLayout::default())
        .folder("Inbox", vec![MockMessage::new("hi", "2025-03-09")])
        .folder("Drafts", vec![])
        .label("Receipts", vec![MockMessage::new("order", "2025-03-05")]);
    let orchestrator = orchestrator(dir.path(), &mailbox);

    let report = orchestrator.run(&[alice()]).await.unwrap();

    let account = &report.accounts[0];
    let names: Vec<&str> = account.folders.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["Inbox", "Drafts", "Label: Receipts"]);
    let FolderStatus::Completed(drafts) = account.folders[1].status else {
        panic!("Drafts should be crawled");
    };
    assert!(drafts.navigation_failed);
    assert_eq!(account.outcome, AccountOutcome::Completed);
    assert!(
        dir.path()
            .join("alice_at_proton.me/Label_ Receipts/Label_ Receipts_0_order.eml")
            .exists()
    );
}
