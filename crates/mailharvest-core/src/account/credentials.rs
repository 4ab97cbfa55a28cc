//! Password storage using the system keyring.
//!
//! Lets the run configuration omit passwords: an account marked
//! `"keyring": true` is resolved here at startup.
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::debug;

use super::AccountId;

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mailharvest";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// No password stored for the account.
    #[error("No password stored in the keyring for {0}")]
    Missing(AccountId),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Stores a webmail password in the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn store_password(account: &AccountId, password: &str) -> CredentialResult<()> {
    let entry = Entry::new(SERVICE_NAME, account.as_str())?;
    entry.set_password(password)?;
    debug!("Stored password for {}", account);
    Ok(())
}

/// Retrieves a webmail password from the system keyring.
///
/// # Errors
///
/// Returns `CredentialError::Missing` if nothing is stored, or an error if
/// the keyring operation fails.
pub fn get_password(account: &AccountId) -> CredentialResult<String> {
    let entry = Entry::new(SERVICE_NAME, account.as_str())?;
    match entry.get_password() {
        Ok(password) => Ok(password),
        Err(keyring::Error::NoEntry) => {
            debug!("No password found for {}", account);
            Err(CredentialError::Missing(account.clone()))
        }
        Err(e) => Err(e.into()),
    }
}
