//! Error taxonomy for a credential refresh.
//!
//! Every variant is terminal: nothing is retried, and only `main` decides to
//! end the process.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Boxed underlying cause, kept so the full chain is printed to the operator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why an INI file could not be turned into a document.
#[derive(Error, Debug)]
pub enum IniReadError {
    #[error("file does not exist")]
    Missing,

    #[error("file could not be read")]
    Io(#[from] io::Error),

    #[error("file is not valid INI: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum MfaError {
    #[error("Invalid duration `{input}`: {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("Could not determine home directory")]
    HomeDirectoryResolution,

    #[error("Unable to retrieve caller identity")]
    IdentityResolution(#[source] BoxError),

    #[error("No MFA code available")]
    MfaCodeUnavailable(#[source] io::Error),

    #[error("Could not acquire session credentials for profile `{profile}`: {reason}")]
    TokenAcquisition {
        profile: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to load credentials from {}: {source}", .path.display())]
    StoreLoad {
        path: PathBuf,
        #[source]
        source: IniReadError,
    },

    #[error("Failed to save credentials to {}", .path.display())]
    StoreSave {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MfaError {
    /// Token acquisition failure without an underlying SDK error.
    pub fn token(profile: &str, reason: impl Into<String>) -> Self {
        Self::TokenAcquisition {
            profile: profile.to_string(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Token acquisition failure with an underlying cause, such as an STS
    /// rejection or an unreadable profile file.
    pub fn rejected(profile: &str, reason: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::TokenAcquisition {
            profile: profile.to_string(),
            reason: reason.into(),
            source: Some(source.into()),
        }
    }
}
