pub mod authenticator;
pub mod secret;
pub mod store;

pub use authenticator::{Authenticator, CommandAuthenticator};
pub use secret::Secret;
pub use store::{
    ActivationOutcome, CredentialRecord, CredentialStore, StoreOutcome, PRIMARY_SLOT,
    SLOT_FILE_PREFIX,
};

use crate::privilege::PrivilegeError;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("no credential stored for slot {slot}{}", render_location(.path))]
    CredentialNotFound { slot: u32, path: Option<String> },
    #[error("slot {slot} is not a secondary slot; secondary slots start at 2")]
    InvalidSlot { slot: u32 },
    #[error("credential file {path} is empty")]
    EmptyCredential { path: String },
    #[error("failed to read credential {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write credential {path}: {source}")]
    WriteFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("authentication failed for slot {slot}: {source}")]
    Auth {
        slot: u32,
        #[source]
        source: PrivilegeError,
    },
}

fn render_location(path: &Option<String>) -> String {
    match path {
        Some(path) => format!(" (expected {path})"),
        None => " (primary credential is not set in the environment)".to_string(),
    }
}
