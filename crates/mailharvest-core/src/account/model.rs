//! Account model types.

use serde::{Deserialize, Serialize};

/// Mailbox address identifying an account.
///
/// Used as the key in `progress.json` and `completed_accounts.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new account ID from a mailbox address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the mailbox address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory name for this account's artifacts (`@` becomes `_at_`).
    #[must_use]
    pub fn dir_name(&self) -> String {
        crate::writer::sanitize_segment(&self.0.replace('@', "_at_"))
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Secret used to sign in. Opaque to the crawler; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a password.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret for typing into the login form.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// An account to crawl. Supplied by the caller and never persisted.
#[derive(Debug, Clone)]
pub struct Account {
    /// Mailbox address.
    pub id: AccountId,
    /// Sign-in secret.
    pub credential: Credential,
}

impl Account {
    /// Creates an account from an address and password.
    #[must_use]
    pub fn new(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: AccountId::new(address),
            credential: Credential::new(password),
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

    mod account_id_tests {
        use super::*;

        #[test]
        fn display() {
            let id = AccountId::new("a@x.com");
            assert_eq!(format!("{id}"), "a@x.com");
        }

        #[test]
        fn dir_name_replaces_at() {
            let id = AccountId::new("alice@proton.me");
            assert_eq!(id.dir_name(), "alice_at_proton.me");
        }

        #[test]
        fn serializes_as_plain_string() {
            let id = AccountId::new("a@x.com");
            assert_eq!(serde_json::to_string(&id).unwrap(), "\"a@x.com\"");
        }
    }

    mod credential_tests {
        use super::*;

        #[test]
        fn debug_is_redacted() {
            let account = Account::new("a@x.com", "hunter2");
            let printed = format!("{account:?}");
            assert!(!printed.contains("hunter2"));
            assert!(printed.contains("***"));
        }

        #[test]
        fn expose_returns_secret() {
            assert_eq!(Credential::new("pw").expose(), "pw");
        }
    }
}
