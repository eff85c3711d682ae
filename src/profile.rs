//! Profile lookups in the shared credentials and config files.

use std::path::Path;

use aws_sdk_sts::config::Credentials;
use configparser::ini::Ini;
use log::debug;

use crate::{
    credentials::{ACCESS_KEY_ID, SECRET_ACCESS_KEY, SESSION_TOKEN},
    error::{IniReadError, MfaError},
    request::DEFAULT_PROFILE,
    store::{CredentialStore, read_ini},
};

/// Candidate section names for a profile in the config file.
fn config_sections(profile: &str) -> Vec<String> {
    if profile == DEFAULT_PROFILE {
        vec![DEFAULT_PROFILE.to_string(), format!("profile {DEFAULT_PROFILE}")]
    } else {
        vec![format!("profile {profile}")]
    }
}

fn config_value(ini: &Ini, profile: &str, key: &str) -> Option<String> {
    config_sections(profile)
        .iter()
        .find_map(|section| ini.get(section, key))
        .filter(|value| !value.is_empty())
}

fn has_config_section(ini: &Ini, profile: &str) -> bool {
    let sections = ini.sections();
    config_sections(profile).iter().any(|s| sections.contains(s))
}

/// Long-lived keys used to sign the STS request.
pub struct SourceProfile {
    pub name: String,
    pub credentials: Credentials,
    pub region: Option<String>,
}

impl SourceProfile {
    /// Reads keys from `[name]` in the credentials file, falling back to the
    /// profile's section in the config file. The region only ever comes from
    /// the config file.
    ///
    /// A file that does not exist is treated as empty; any other read
    /// failure is returned.
    pub async fn load(credentials_file: &Path, config_file: &Path, name: &str) -> Result<Self, MfaError> {
        // Either file may be absent; any other failure is the operator's to see.
        let store = match CredentialStore::load(credentials_file).await {
            Ok(store) => Some(store),
            Err(MfaError::StoreLoad {
                source: IniReadError::Missing,
                ..
            }) => None,
            Err(e) => return Err(e),
        };
        let config_ini = match read_ini(config_file).await {
            Ok(ini) => Some(ini),
            Err(IniReadError::Missing) => None,
            Err(e) => {
                return Err(MfaError::rejected(
                    name,
                    format!("cannot read {}", config_file.display()),
                    e,
                ));
            }
        };

        let from_credentials = |key: &str| {
            store
                .as_ref()
                .and_then(|store| store.get(name, key))
                .filter(|value| !value.is_empty())
        };
        let from_config = |key: &str| config_ini.as_ref().and_then(|ini| config_value(ini, name, key));
        let lookup = |key: &str| from_credentials(key).or_else(|| from_config(key));

        let (Some(access_key_id), Some(secret_access_key)) = (lookup(ACCESS_KEY_ID), lookup(SECRET_ACCESS_KEY)) else {
            return Err(MfaError::token(
                name,
                format!(
                    "no {ACCESS_KEY_ID}/{SECRET_ACCESS_KEY} found in {} or {}",
                    credentials_file.display(),
                    config_file.display()
                ),
            ));
        };
        debug!("Loaded long-lived credentials for profile {name}");

        Ok(Self {
            name: name.to_string(),
            credentials: Credentials::new(
                access_key_id,
                secret_access_key,
                lookup(SESSION_TOKEN),
                None,
                "aws-mfa-session",
            ),
            region: from_config("region"),
        })
    }
}

/// Role settings for a profile, as the AWS CLI reads them from the config
/// file:
///
/// ```ini
/// [profile work]
/// role_arn = arn:aws:iam::123456789012:role/admin
/// source_profile = work-user
/// mfa_serial = arn:aws:iam::210987654321:mfa/alice
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RoleProfile {
    pub name: String,
    pub role_arn: String,
    pub source_profile: String,
    pub mfa_serial: Option<String>,
    pub role_session_name: Option<String>,
    pub external_id: Option<String>,
    pub region: Option<String>,
}

impl RoleProfile {
    /// Reads the role settings for `name` from the config file.
    ///
    /// # Errors
    /// `MfaError::TokenAcquisition` when the file cannot be read (with the
    /// cause attached), has no section for the profile, or lacks `role_arn`
    /// or `source_profile`.
    pub async fn load(config_file: &Path, name: &str) -> Result<Self, MfaError> {
        let ini = read_ini(config_file).await.map_err(|e| {
            MfaError::rejected(
                name,
                format!("cannot read role configuration from {}", config_file.display()),
                e,
            )
        })?;

        if !has_config_section(&ini, name) {
            return Err(MfaError::token(
                name,
                format!("no role configuration for this profile in {}", config_file.display()),
            ));
        }
        let value = |key: &str| config_value(&ini, name, key);

        let role_arn = value("role_arn").ok_or_else(|| MfaError::token(name, "role_arn is not set"))?;
        let source_profile = match (value("source_profile"), value("credential_source")) {
            (Some(source), _) => source,
            (None, Some(_)) => {
                return Err(MfaError::token(
                    name,
                    "credential_source is not supported, configure source_profile instead",
                ));
            }
            (None, None) => return Err(MfaError::token(name, "source_profile is not set")),
        };

        Ok(Self {
            name: name.to_string(),
            role_arn,
            source_profile,
            mfa_serial: value("mfa_serial"),
            role_session_name: value("role_session_name"),
            external_id: value("external_id"),
            region: value("region"),
        })
    }
}
