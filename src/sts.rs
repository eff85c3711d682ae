//! Calls into AWS STS.
//!
//! [`SecurityTokenService`] is the seam between the refresh workflow and the
//! network; [`StsTokenService`] is the real implementation.

use std::time::{SystemTime, UNIX_EPOCH};

use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::{Client, config::Credentials};
use log::debug;

use crate::{credentials::CredentialTriple, error::MfaError, profile::RoleProfile};

/// Region used when neither the profile nor the environment names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// An MFA device together with the code it currently shows.
#[derive(Debug, Clone, Copy)]
pub struct MfaChallenge<'a> {
    pub serial: &'a str,
    pub code: &'a str,
}

pub trait SecurityTokenService {
    /// ARN of the identity whose credentials the client is using.
    async fn caller_arn(&self) -> Result<String, MfaError>;

    /// GetSessionToken for the calling IAM user.
    async fn session_token(
        &self,
        profile: &str,
        mfa: MfaChallenge<'_>,
        duration_seconds: i32,
    ) -> Result<CredentialTriple, MfaError>;

    /// AssumeRole for the role configured in `role`.
    async fn assume_role(
        &self,
        role: &RoleProfile,
        mfa: Option<MfaChallenge<'_>>,
        duration_seconds: i32,
    ) -> Result<CredentialTriple, MfaError>;
}

/// STS client signing with a profile's long-lived keys.
pub struct StsTokenService {
    client: Client,
}

impl StsTokenService {
    /// Builds a client that signs with the given long-lived credentials.
    ///
    /// # Arguments
    /// * `credentials` - Static keys of the source profile
    /// * `region` - Region from the profile; when `None` the SDK chain
    ///   decides, falling back to `us-east-1`
    pub async fn connect(credentials: Credentials, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).credentials_provider(credentials);
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let shared = loader.load().await;

        let mut config = aws_sdk_sts::config::Builder::from(&shared);
        if shared.region().is_none() {
            debug!("No region configured, using {DEFAULT_REGION} for STS");
            config = config.region(Region::new(DEFAULT_REGION));
        }

        Self {
            client: Client::from_conf(config.build()),
        }
    }
}

impl SecurityTokenService for StsTokenService {
    async fn caller_arn(&self) -> Result<String, MfaError> {
        self.client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| MfaError::IdentityResolution(e.into()))?
            .arn()
            .map(str::to_string)
            .ok_or_else(|| MfaError::IdentityResolution("GetCallerIdentity returned no ARN".into()))
    }

    async fn session_token(
        &self,
        profile: &str,
        mfa: MfaChallenge<'_>,
        duration_seconds: i32,
    ) -> Result<CredentialTriple, MfaError> {
        debug!("GetSessionToken serial={} duration={duration_seconds}s", mfa.serial);

        let output = self
            .client
            .get_session_token()
            .duration_seconds(duration_seconds)
            .serial_number(mfa.serial)
            .token_code(mfa.code)
            .send()
            .await
            .map_err(|e| MfaError::rejected(profile, "GetSessionToken was rejected", e))?;

        output
            .credentials()
            .map(CredentialTriple::from)
            .ok_or_else(|| MfaError::token(profile, "GetSessionToken returned no credentials"))
    }

    async fn assume_role(
        &self,
        role: &RoleProfile,
        mfa: Option<MfaChallenge<'_>>,
        duration_seconds: i32,
    ) -> Result<CredentialTriple, MfaError> {
        let session_name = role.role_session_name.clone().unwrap_or_else(default_session_name);
        debug!(
            "AssumeRole role={} session={session_name} duration={duration_seconds}s",
            role.role_arn
        );

        let output = self
            .client
            .assume_role()
            .role_arn(&role.role_arn)
            .role_session_name(session_name)
            .duration_seconds(duration_seconds)
            .set_external_id(role.external_id.clone())
            .set_serial_number(mfa.map(|m| m.serial.to_string()))
            .set_token_code(mfa.map(|m| m.code.to_string()))
            .send()
            .await
            .map_err(|e| MfaError::rejected(&role.name, "AssumeRole was rejected", e))?;

        output
            .credentials()
            .map(CredentialTriple::from)
            .ok_or_else(|| MfaError::token(&role.name, "AssumeRole returned no credentials"))
    }
}

fn default_session_name() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("aws-mfa-session-{now}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_name_is_valid_for_sts() {
        let name = default_session_name();

        assert!(name.starts_with("aws-mfa-session-"));
        // RoleSessionName: 2-64 chars of [\w+=,.@-]
        assert!((2..=64).contains(&name.len()));
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || "_+=,.@-".contains(c)));
    }
}
