//! The credential refresh workflow.
//!
//! ```text
//! SessionRequest -> (MFA serial lookup, user flow only) -> STS -> credentials file -> exports
//! ```
//!
//! Each step runs to completion before the next one starts and the first
//! failure ends the run. Both flows share the same persistence step: the
//! triple lands in `[<profile>_mfa]` of the credentials file.

use log::{debug, info, warn};

use crate::{
    credentials::CredentialTriple,
    error::MfaError,
    identity,
    mfa::ReadMfaToken,
    profile::{RoleProfile, SourceProfile},
    request::{Flow, SessionRequest},
    store::{CredentialStore, SectionUpdate},
    sts::{MfaChallenge, SecurityTokenService, StsTokenService},
};

/// Acquires temporary credentials through a [`SecurityTokenService`],
/// asking `tokens` for the MFA code when one is needed.
pub struct SessionUpdater<'a, S> {
    sts: S,
    tokens: &'a dyn ReadMfaToken,
}

impl<'a, S: SecurityTokenService> SessionUpdater<'a, S> {
    pub fn new(sts: S, tokens: &'a dyn ReadMfaToken) -> Self {
        Self { sts, tokens }
    }

    /// GetSessionToken for the IAM user behind the request's profile.
    pub async fn user_session(&self, request: &SessionRequest) -> Result<CredentialTriple, MfaError> {
        let serial = identity::resolve_mfa_serial(&self.sts).await?;
        let code = self.tokens.read_token(&serial)?;

        self.sts
            .session_token(
                request.profile(),
                MfaChallenge {
                    serial: &serial,
                    code: &code,
                },
                request.duration_seconds(),
            )
            .await
    }

    /// AssumeRole for `role`. The code is only asked for when the role has an
    /// MFA device configured.
    pub async fn role_session(
        &self,
        request: &SessionRequest,
        role: &RoleProfile,
    ) -> Result<CredentialTriple, MfaError> {
        let code = match &role.mfa_serial {
            Some(serial) => Some(self.tokens.read_token(serial)?),
            None => {
                warn!("Profile {} has no mfa_serial, assuming role without MFA", role.name);
                None
            }
        };
        let mfa = role
            .mfa_serial
            .as_deref()
            .zip(code.as_deref())
            .map(|(serial, code)| MfaChallenge { serial, code });

        self.sts.assume_role(role, mfa, request.duration_seconds()).await
    }
}

/// Writes the triple into the request's `_mfa` section and saves the file.
///
/// The file must already exist; it is never created here.
///
/// # Returns
/// Whether the `_mfa` section was created or overwritten.
pub async fn persist(request: &SessionRequest, triple: &CredentialTriple) -> Result<SectionUpdate, MfaError> {
    let section = request.target_section();
    let mut store = CredentialStore::load(request.credentials_file()?).await?;

    let update = store.write_credentials(&section, triple);
    store.save().await?;

    match update {
        SectionUpdate::Created => info!("Created [{section}] in {}", store.path().display()),
        SectionUpdate::Updated => info!("Updated [{section}] in {}", store.path().display()),
    }
    Ok(update)
}

/// Runs the flow selected by the request against AWS and persists the result.
///
/// # Arguments
/// * `request` - Validated invocation, including the flow to run
/// * `tokens` - Where the MFA code comes from when STS needs one
///
/// # Returns
/// The temporary credentials that were written, for optional export.
pub async fn refresh(request: &SessionRequest, tokens: &dyn ReadMfaToken) -> Result<CredentialTriple, MfaError> {
    let credentials_file = request.credentials_file()?;
    let config_file = request.config_file()?;

    info!(
        "Fetching credentials - Profile: {}, Duration: {:?}",
        request.profile(),
        request.duration()
    );

    let triple = match request.flow() {
        Flow::User => {
            let source = SourceProfile::load(&credentials_file, &config_file, request.profile()).await?;
            debug!("Signing with long-lived keys of profile {}", source.name);
            let sts = StsTokenService::connect(source.credentials, source.region.as_deref()).await;
            SessionUpdater::new(sts, tokens).user_session(request).await?
        }
        Flow::Role => {
            let role = RoleProfile::load(&config_file, request.profile()).await?;
            let source = SourceProfile::load(&credentials_file, &config_file, &role.source_profile).await?;
            debug!("Assuming {} with long-lived keys of profile {}", role.role_arn, source.name);
            let region = role.region.as_deref().or(source.region.as_deref());
            let sts = StsTokenService::connect(source.credentials, region).await;
            SessionUpdater::new(sts, tokens).role_session(request, &role).await?
        }
    };

    persist(request, &triple).await?;
    match triple.expires_at() {
        Some(expiration) => info!("Success! Credentials expire at: {expiration}"),
        None => info!("Success!"),
    }
    Ok(triple)
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        path::PathBuf,
    };

    use pretty_assertions::assert_eq;
    use tempfile::{TempDir, tempdir};
    use tokio::fs;

    use super::*;
    use crate::mfa::SuppliedToken;

    const USER_ARN: &str = "arn:aws:iam::123456789012:user/alice";

    /// Records what it was asked and hands back a fixed triple.
    #[derive(Default)]
    struct FakeSts {
        caller_arn: Option<String>,
        reject: bool,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSts {
        fn for_user(arn: &str) -> Self {
            Self {
                caller_arn: Some(arn.to_string()),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl SecurityTokenService for &FakeSts {
        async fn caller_arn(&self) -> Result<String, MfaError> {
            self.calls.borrow_mut().push("GetCallerIdentity".to_string());
            self.caller_arn
                .clone()
                .ok_or_else(|| MfaError::IdentityResolution("ExpiredToken".into()))
        }

        async fn session_token(
            &self,
            profile: &str,
            mfa: MfaChallenge<'_>,
            duration_seconds: i32,
        ) -> Result<CredentialTriple, MfaError> {
            self.calls
                .borrow_mut()
                .push(format!("GetSessionToken {} {} {duration_seconds}", mfa.serial, mfa.code));
            if self.reject {
                return Err(MfaError::rejected(profile, "GetSessionToken was rejected", "AccessDenied"));
            }
            Ok(CredentialTriple::new("ASIAUSER", "user-secret", "user-token"))
        }

        async fn assume_role(
            &self,
            role: &RoleProfile,
            mfa: Option<MfaChallenge<'_>>,
            duration_seconds: i32,
        ) -> Result<CredentialTriple, MfaError> {
            let mfa = mfa.map(|m| format!("{} {}", m.serial, m.code)).unwrap_or_else(|| "-".to_string());
            self.calls
                .borrow_mut()
                .push(format!("AssumeRole {} {mfa} {duration_seconds}", role.role_arn));
            if self.reject {
                return Err(MfaError::rejected(&role.name, "AssumeRole was rejected", "AccessDenied"));
            }
            Ok(CredentialTriple::new("ASIAROLE", "role-secret", "role-token"))
        }
    }

    /// Counts how often the code was asked for.
    struct CountingToken {
        code: &'static str,
        asked: Cell<usize>,
    }

    impl ReadMfaToken for CountingToken {
        fn read_token(&self, _mfa_serial: &str) -> Result<String, MfaError> {
            self.asked.set(self.asked.get() + 1);
            Ok(self.code.to_string())
        }
    }

    fn request(flow: Flow, home: PathBuf) -> SessionRequest {
        SessionRequest::new(flow, Some("work".to_string()), Some("2h"), Some("123456".to_string()), Some(home)).unwrap()
    }

    fn role(mfa_serial: Option<&str>) -> RoleProfile {
        RoleProfile {
            name: "work".to_string(),
            role_arn: "arn:aws:iam::123456789012:role/admin".to_string(),
            source_profile: "work-user".to_string(),
            mfa_serial: mfa_serial.map(str::to_string),
            role_session_name: None,
            external_id: None,
            region: None,
        }
    }

    async fn home_with_credentials(content: &str) -> TempDir {
        let home = tempdir().unwrap();
        fs::create_dir_all(home.path().join(".aws")).await.unwrap();
        fs::write(home.path().join(".aws").join("credentials"), content)
            .await
            .unwrap();
        home
    }

    #[tokio::test]
    async fn user_session_derives_serial_before_asking_for_code() {
        let sts = FakeSts::for_user(USER_ARN);
        let tokens = SuppliedToken("123456".to_string());
        let request = request(Flow::User, PathBuf::from("/home/alice"));

        let triple = SessionUpdater::new(&sts, &tokens).user_session(&request).await.unwrap();

        assert_eq!(triple, CredentialTriple::new("ASIAUSER", "user-secret", "user-token"));
        assert_eq!(
            sts.calls(),
            vec![
                "GetCallerIdentity".to_string(),
                "GetSessionToken arn:aws:iam::123456789012:mfa/alice 123456 7200".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn user_session_stops_when_identity_fails() {
        let sts = FakeSts::default();
        let tokens = CountingToken {
            code: "123456",
            asked: Cell::new(0),
        };
        let request = request(Flow::User, PathBuf::from("/home/alice"));

        let err = SessionUpdater::new(&sts, &tokens).user_session(&request).await.unwrap_err();

        assert!(matches!(err, MfaError::IdentityResolution(_)));
        assert_eq!(tokens.asked.get(), 0);
        assert_eq!(sts.calls(), vec!["GetCallerIdentity".to_string()]);
    }

    #[tokio::test]
    async fn role_session_passes_configured_serial() {
        let sts = FakeSts::default();
        let tokens = CountingToken {
            code: "654321",
            asked: Cell::new(0),
        };
        let request = request(Flow::Role, PathBuf::from("/home/alice"));
        let role = role(Some("arn:aws:iam::210987654321:mfa/alice"));

        let triple = SessionUpdater::new(&sts, &tokens).role_session(&request, &role).await.unwrap();

        assert_eq!(triple.access_key_id, "ASIAROLE");
        assert_eq!(tokens.asked.get(), 1);
        assert_eq!(
            sts.calls(),
            vec![
                "AssumeRole arn:aws:iam::123456789012:role/admin arn:aws:iam::210987654321:mfa/alice 654321 7200"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn role_session_without_serial_skips_the_code() {
        let sts = FakeSts::default();
        let tokens = CountingToken {
            code: "654321",
            asked: Cell::new(0),
        };
        let request = request(Flow::Role, PathBuf::from("/home/alice"));

        SessionUpdater::new(&sts, &tokens)
            .role_session(&request, &role(None))
            .await
            .unwrap();

        assert_eq!(tokens.asked.get(), 0);
        assert_eq!(
            sts.calls(),
            vec!["AssumeRole arn:aws:iam::123456789012:role/admin - 7200".to_string()]
        );
    }

    #[tokio::test]
    async fn rejected_call_is_a_token_error() {
        let sts = FakeSts {
            caller_arn: Some(USER_ARN.to_string()),
            reject: true,
            ..FakeSts::default()
        };
        let tokens = SuppliedToken("000000".to_string());
        let request = request(Flow::User, PathBuf::from("/home/alice"));

        let err = SessionUpdater::new(&sts, &tokens).user_session(&request).await.unwrap_err();
        assert!(matches!(err, MfaError::TokenAcquisition { profile, .. } if profile == "work"));
    }

    #[tokio::test]
    async fn persist_creates_then_updates_the_mfa_section() {
        let home = home_with_credentials("[work]\naws_access_key_id=AKIAWORK\naws_secret_access_key=work-secret\n").await;
        let request = request(Flow::User, home.path().to_path_buf());

        let first = CredentialTriple::new("AK1", "SK1", "ST1");
        assert_eq!(persist(&request, &first).await.unwrap(), SectionUpdate::Created);

        let second = CredentialTriple::new("AK2", "SK2", "ST2");
        assert_eq!(persist(&request, &second).await.unwrap(), SectionUpdate::Updated);

        let store = CredentialStore::load(request.credentials_file().unwrap()).await.unwrap();
        for (key, value) in second.entries() {
            assert_eq!(store.get("work_mfa", key).as_deref(), Some(value));
        }
        assert_eq!(store.get("work", "aws_access_key_id").as_deref(), Some("AKIAWORK"));
    }

    #[tokio::test]
    async fn persist_requires_an_existing_file() {
        let home = tempdir().unwrap();
        let request = request(Flow::Role, home.path().to_path_buf());

        let err = persist(&request, &CredentialTriple::new("AK1", "SK1", "ST1"))
            .await
            .unwrap_err();

        assert!(matches!(err, MfaError::StoreLoad { .. }));
        assert!(!request.credentials_file().unwrap().exists());
    }

    #[tokio::test]
    async fn refresh_fails_before_any_network_call_without_keys() {
        let home = home_with_credentials("[other]\naws_access_key_id=AKIAOTHER\n").await;
        let request = request(Flow::User, home.path().to_path_buf());
        let tokens = SuppliedToken("123456".to_string());

        let err = refresh(&request, &tokens).await.unwrap_err();
        assert!(matches!(err, MfaError::TokenAcquisition { profile, .. } if profile == "work"));
    }

    #[tokio::test]
    async fn refresh_role_flow_needs_role_configuration() {
        let home = home_with_credentials("[work]\naws_access_key_id=AKIAWORK\naws_secret_access_key=s\n").await;
        let request = request(Flow::Role, home.path().to_path_buf());
        let tokens = SuppliedToken("123456".to_string());

        let err = refresh(&request, &tokens).await.unwrap_err();
        assert!(matches!(err, MfaError::TokenAcquisition { reason, .. } if reason.contains("role configuration")));
    }
}
