//! `MailHarvest` - resumable webmail archiver
//!
//! Signs in to each configured account in a Chromium window, walks every
//! folder back to a cutoff date, and saves messages as `.eml` files. Rerun
//! after an interruption to continue where the last run stopped.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod browser;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailharvest_core::{
    AccountId, AccountOutcome, CrawlContext, CrawlOrchestrator, RunConfig, RunReport, credentials,
};

use browser::ChromiumLauncher;

/// Archive webmail accounts to `.eml` files.
#[derive(Debug, Parser)]
#[command(name = "mailharvest", version, about)]
struct Cli {
    /// Run configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crawl every configured account (the default).
    Run {
        /// Output directory, overriding the configuration.
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Days to look back, overriding the configuration.
        #[arg(long)]
        days_back: Option<u32>,

        /// Run the browser without a window.
        #[arg(long)]
        headless: bool,
    },
    /// Store an account password in the system keyring (read from stdin).
    StorePassword {
        /// Mailbox address.
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailharvest=info,mailharvest_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run {
        base_dir: None,
        days_back: None,
        headless: false,
    }) {
        Command::StorePassword { email } => {
            store_password(&email).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            base_dir,
            days_back,
            headless,
        } => {
            let path = cli.config.unwrap_or_else(default_config_path);
            let mut config = RunConfig::load(&path)
                .await
                .with_context(|| format!("loading {}", path.display()))?;
            if let Some(base_dir) = base_dir {
                config.base_dir = base_dir;
            }
            if let Some(days_back) = days_back {
                config.days_back = days_back;
            }
            config.headless |= headless;

            let report = run(&config).await?;
            Ok(if report.all_done() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// Default configuration location.
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailharvest")
        .join("config.json")
}

async fn run(config: &RunConfig) -> anyhow::Result<RunReport> {
    let accounts = config.resolve_accounts()?;
    let context = CrawlContext::from_config(config);
    info!(
        "Starting MailHarvest: {} accounts, last {} days, output in {}",
        accounts.len(),
        config.days_back,
        config.base_dir.display()
    );
    if !config.headless {
        info!("The browser window stays visible so a second factor or CAPTCHA can be completed");
    }

    let launcher = ChromiumLauncher::new(config.headless, &config.layout.attachment_download);
    let report = CrawlOrchestrator::new(context, launcher)
        .run(&accounts)
        .await
        .context("checkpoint storage failed")?;

    summarize(&report);
    Ok(report)
}

fn summarize(report: &RunReport) {
    for account in &report.accounts {
        match &account.outcome {
            AccountOutcome::Completed => {
                info!("{}: completed, {} messages saved", account.account, account.saved());
            }
            AccountOutcome::Skipped => info!("{}: already completed", account.account),
            AccountOutcome::AuthenticationFailed(reason) => {
                error!("{}: login failed ({})", account.account, reason);
            }
            AccountOutcome::Failed(reason) => {
                error!(
                    "{}: stopped ({}); rerun to resume after {} folders",
                    account.account,
                    reason,
                    account.folders.len()
                );
            }
        }
    }
}

async fn store_password(email: &str) -> anyhow::Result<()> {
    let account = AccountId::new(email.trim());
    if !account.as_str().contains('@') {
        bail!("invalid account address: {account}");
    }

    eprintln!("Password for {account}:");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let Some(password) = lines.next_line().await? else {
        bail!("no password given");
    };
    let password = password.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("no password given");
    }

    credentials::store_password(&account, password)?;
    info!("Stored password for {} in the system keyring", account);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_run() {
        let cli = Cli::try_parse_from(["mailharvest"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "mailharvest",
            "--config",
            "accounts.json",
            "run",
            "--days-back",
            "7",
            "--headless",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("accounts.json")));
        let Some(Command::Run {
            days_back,
            headless,
            base_dir,
        }) = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(days_back, Some(7));
        assert!(headless);
        assert!(base_dir.is_none());
    }

    #[test]
    fn test_store_password() {
        let cli = Cli::try_parse_from(["mailharvest", "store-password", "a@x.com"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::StorePassword { email }) if email == "a@x.com"
        ));
    }

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with("mailharvest/config.json"));
    }
}
