use std::fmt;

use aws_smithy_types::{DateTime, date_time::Format};

pub const ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub const SESSION_TOKEN: &str = "aws_session_token";

/// Temporary credentials returned by STS.
///
/// Only the three key fields are ever persisted; `expiration` is reported to
/// the operator and then dropped.
#[derive(Clone, PartialEq)]
pub struct CredentialTriple {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime>,
}

impl CredentialTriple {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.into(),
            expiration: None,
        }
    }

    pub fn with_expiration(mut self, expiration: DateTime) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// The canonical credentials-file keys paired with their values.
    pub fn entries(&self) -> [(&'static str, &str); 3] {
        [
            (ACCESS_KEY_ID, &self.access_key_id),
            (SECRET_ACCESS_KEY, &self.secret_access_key),
            (SESSION_TOKEN, &self.session_token),
        ]
    }

    /// Expiration as an RFC 3339 timestamp, if STS reported one.
    pub fn expires_at(&self) -> Option<String> {
        self.expiration.and_then(|e| e.fmt(Format::DateTime).ok())
    }
}

impl From<&aws_sdk_sts::types::Credentials> for CredentialTriple {
    fn from(c: &aws_sdk_sts::types::Credentials) -> Self {
        Self::new(c.access_key_id(), c.secret_access_key(), c.session_token())
            .with_expiration(*c.expiration())
    }
}

// Secrets never end up in logs or panic messages.
impl fmt::Debug for CredentialTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialTriple")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expires_at())
            .finish()
    }
}
