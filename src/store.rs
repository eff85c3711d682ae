//! The shared credentials file.
//!
//! The file is loaded whole, changed in memory and written back whole. There
//! is no locking, so two concurrent runs against the same file race and the
//! last write wins.
//!
//! ```ini
//! [work]
//! aws_access_key_id=AKIA...           # long-lived keys, never touched
//! aws_secret_access_key=...
//!
//! [work_mfa]
//! aws_access_key_id=ASIA...           # rewritten on every refresh
//! aws_secret_access_key=...
//! aws_session_token=...
//! ```

use std::{
    io,
    path::{Path, PathBuf},
};

use configparser::ini::{Ini, IniDefault};
use tokio::fs;

use crate::{
    credentials::CredentialTriple,
    error::{IniReadError, MfaError},
};

// configparser folds keys above the first header into its "default" section
// and writes that section without a header, which would swallow `[default]`.
const PREAMBLE_SECTION: &str = "__preamble__";

/// Parser settings for AWS shared files: case-sensitive names and no inline
/// comments, since `#` and `;` are legal inside values such as secret keys
/// and `credential_process` command lines.
fn aws_ini() -> Ini {
    let mut defaults: IniDefault = Ini::new_cs().defaults();
    defaults.enable_inline_comments = false;
    defaults.case_sensitive = true;
    defaults.default_section = PREAMBLE_SECTION.into();
    Ini::new_from_defaults(defaults)
}

/// Reads an AWS-style INI file, keeping section order, key case and every
/// character of each value.
///
/// # Returns
/// * `Ok(Ini)` - The parsed document
/// * `Err(IniReadError::Missing)` - `path` does not exist
/// * `Err(IniReadError::Io | Parse)` - The file exists but could not be read or parsed
pub async fn read_ini(path: &Path) -> Result<Ini, IniReadError> {
    let content = fs::read_to_string(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => IniReadError::Missing,
        _ => IniReadError::Io(e),
    })?;

    let mut ini = aws_ini();
    ini.read(content).map_err(IniReadError::Parse)?;
    Ok(ini)
}

/// What [`CredentialStore::write_credentials`] did to the target section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionUpdate {
    /// The section did not exist and was appended.
    Created,
    /// The section existed and its contents were replaced.
    Updated,
}

/// In-memory copy of the credentials file, tied to the path it came from.
pub struct CredentialStore {
    path: PathBuf,
    ini: Ini,
}

impl CredentialStore {
    /// Loads the credentials file.
    ///
    /// A missing file is an error and is not created; the file is only ever
    /// written by [`CredentialStore::save`].
    ///
    /// # Arguments
    /// * `path` - Location of the credentials file, usually `~/.aws/credentials`
    ///
    /// # Errors
    /// `MfaError::StoreLoad` with the underlying [`IniReadError`] as source.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, MfaError> {
        let path = path.into();
        let ini = read_ini(&path).await.map_err(|source| MfaError::StoreLoad {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, ini })
    }

    /// The file this store was loaded from and saves to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value of `key` in `section`, if both exist and the key has a value.
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.ini.get(section, key)
    }

    /// Replaces the contents of `section` with the three credential keys.
    ///
    /// An existing section keeps its position in the file but loses any other
    /// keys it held; a missing one is appended.
    pub fn write_credentials(&mut self, section: &str, triple: &CredentialTriple) -> SectionUpdate {
        let sections = self.ini.get_mut_map();
        let update = if sections.contains_key(section) {
            SectionUpdate::Updated
        } else {
            SectionUpdate::Created
        };

        let entries = sections.entry(section.to_string()).or_default();
        entries.clear();
        for (key, value) in triple.entries() {
            entries.insert(key.to_string(), Some(value.to_string()));
        }
        update
    }

    /// Rewrites the whole file in a single write.
    pub async fn save(&self) -> Result<(), MfaError> {
        fs::write(&self.path, self.ini.writes())
            .await
            .map_err(|source| MfaError::StoreSave {
                path: self.path.clone(),
                source,
            })
    }
}
