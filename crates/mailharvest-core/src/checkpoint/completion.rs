//! Accounts that are fully crawled (`completed_accounts.json`).

use std::path::{Path, PathBuf};

use tracing::info;

use super::{read_if_exists, write_atomic};
use crate::Result;
use crate::account::AccountId;

/// Append-only set of completed accounts.
///
/// Membership is checked against the file on every call, so the registry
/// reflects what is durable rather than what this process believes.
#[derive(Debug, Clone)]
pub struct CompletionRegistry {
    path: PathBuf,
}

impl CompletionRegistry {
    /// Creates a registry for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every completed account, in completion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_all(&self) -> Result<Vec<AccountId>> {
        match read_if_exists(&self.path).await? {
            Some(contents) => Ok(serde_json::from_str(&contents)?),
            None => Ok(Vec::new()),
        }
    }

    /// True if `account` is completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn contains(&self, account: &AccountId) -> Result<bool> {
        Ok(self.load_all().await?.contains(account))
    }

    /// Adds `account` and persists immediately.
    ///
    /// Returns `false` if it was already present; the file is then left as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written.
    pub async fn mark_done(&self, account: &AccountId) -> Result<bool> {
        let mut accounts = self.load_all().await?;
        if accounts.contains(account) {
            return Ok(false);
        }
        accounts.push(account.clone());
        write_atomic(&self.path, &serde_json::to_vec_pretty(&accounts)?).await?;
        info!("Marked {} as completed", account);
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registry(dir: &tempfile::TempDir) -> CompletionRegistry {
        CompletionRegistry::new(dir.path().join("completed_accounts.json"))
    }

    #[tokio::test]
    async fn test_empty_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        assert!(registry.load_all().await.unwrap().is_empty());
        assert!(!registry.contains(&AccountId::new("a@x.com")).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_done_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        let a = AccountId::new("a@x.com");
        let b = AccountId::new("b@x.com");

        assert!(registry.mark_done(&a).await.unwrap());
        assert!(registry.mark_done(&b).await.unwrap());
        assert!(!registry.mark_done(&a).await.unwrap());

        assert_eq!(registry.load_all().await.unwrap(), vec![a.clone(), b]);
        assert!(registry.contains(&a).await.unwrap());
    }

    #[tokio::test]
    async fn test_file_is_a_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        registry.mark_done(&AccountId::new("a@x.com")).await.unwrap();

        let raw = tokio::fs::read_to_string(registry.path()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!(["a@x.com"]));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        registry(&dir)
            .mark_done(&AccountId::new("a@x.com"))
            .await
            .unwrap();
        assert!(
            registry(&dir)
                .contains(&AccountId::new("a@x.com"))
                .await
                .unwrap()
        );
    }
}
