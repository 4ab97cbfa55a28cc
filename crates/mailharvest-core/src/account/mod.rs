//! Accounts to crawl and their credentials.

pub mod credentials;
mod model;

pub use credentials::{CredentialError, CredentialResult};
pub use model::{Account, AccountId, Credential};
