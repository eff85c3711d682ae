//! The per-invocation request value.
//!
//! A [`SessionRequest`] is built once from command-line input and is never
//! mutated afterwards; every later step borrows it.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::MfaError;

pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60 * 60);

/// Which security-token operation a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// AssumeRole using the role configured for the profile.
    Role,
    /// GetSessionToken as the IAM user behind the profile.
    User,
}

/// Everything one invocation needs, validated up front.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    flow: Flow,
    profile: String,
    duration: Duration,
    mfa_code: Option<String>,
    home_directory: Option<PathBuf>,
    credentials_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl SessionRequest {
    /// Validates command-line input into a request.
    ///
    /// An unset or empty profile becomes `default`, an unset duration becomes
    /// one hour and an empty MFA code counts as no code at all.
    ///
    /// # Arguments
    /// * `flow` - Which STS operation to run
    /// * `profile` - Profile name from the command line
    /// * `duration` - Session length in Go duration notation, e.g. `1h30m`
    /// * `mfa_code` - Code supplied up front, if any
    /// * `home_directory` - The operator's home directory, if it could be
    ///   found; only needed for paths that are not overridden
    ///
    /// # Errors
    /// `MfaError::InvalidDuration` if `duration` is not a positive duration.
    pub fn new(
        flow: Flow,
        profile: Option<String>,
        duration: Option<&str>,
        mfa_code: Option<String>,
        home_directory: Option<PathBuf>,
    ) -> Result<Self, MfaError> {
        let duration = match duration {
            Some(text) => parse_duration(text)?,
            None => DEFAULT_DURATION,
        };

        Ok(Self {
            flow,
            profile: profile
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
            duration,
            mfa_code: mfa_code.filter(|c| !c.trim().is_empty()),
            home_directory,
            credentials_file: None,
            config_file: None,
        })
    }

    /// Overrides `<home>/.aws/credentials`.
    pub fn with_credentials_file(mut self, path: Option<PathBuf>) -> Self {
        self.credentials_file = path;
        self
    }

    /// Overrides `<home>/.aws/config`.
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Which STS operation this request runs.
    pub fn flow(&self) -> Flow {
        self.flow
    }

    /// Profile whose credentials are refreshed; never empty.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Requested session length, always positive.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whole seconds for the STS `DurationSeconds` parameter.
    pub fn duration_seconds(&self) -> i32 {
        i32::try_from(self.duration.as_secs()).unwrap_or(i32::MAX)
    }

    /// MFA code given on the command line; `None` means prompt for one.
    pub fn mfa_code(&self) -> Option<&str> {
        self.mfa_code.as_deref()
    }

    /// Section the refreshed credentials are written to.
    pub fn target_section(&self) -> String {
        format!("{}_mfa", self.profile)
    }

    /// The shared credentials file: the override, or `<home>/.aws/credentials`.
    pub fn credentials_file(&self) -> Result<PathBuf, MfaError> {
        self.aws_file(self.credentials_file.as_deref(), "credentials")
    }

    /// The shared config file: the override, or `<home>/.aws/config`.
    pub fn config_file(&self) -> Result<PathBuf, MfaError> {
        self.aws_file(self.config_file.as_deref(), "config")
    }

    // The home directory is only required when a path is not overridden.
    fn aws_file(&self, explicit: Option<&Path>, name: &str) -> Result<PathBuf, MfaError> {
        match (explicit, &self.home_directory) {
            (Some(path), _) => Ok(path.to_path_buf()),
            (None, Some(home)) => Ok(home.join(".aws").join(name)),
            (None, None) => Err(MfaError::HomeDirectoryResolution),
        }
    }
}

/// Parses a duration in Go's `time.ParseDuration` notation (`1h`, `90m`,
/// `1h30m`, `1.5h`, `250ms`). The result must be strictly positive.
pub fn parse_duration(input: &str) -> Result<Duration, MfaError> {
    let invalid = |reason: &str| MfaError::InvalidDuration {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let text = input.trim();
    if text.is_empty() {
        return Err(invalid("empty duration"));
    }
    if text.starts_with('-') {
        return Err(invalid("duration must be positive"));
    }
    let mut rest = text.strip_prefix('+').unwrap_or(text);
    if rest.is_empty() {
        return Err(invalid("missing number"));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("missing number"));
        }
        if fraction.contains('.') {
            return Err(invalid("malformed number"));
        }

        let scale = unit_nanos(unit).ok_or_else(|| {
            if unit.is_empty() {
                invalid("missing unit")
            } else {
                invalid(&format!("unknown unit `{unit}`"))
            }
        })?;

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("duration out of range"))?
        };
        let mut nanos = whole
            .checked_mul(scale)
            .ok_or_else(|| invalid("duration out of range"))?;

        // Anything past nanosecond precision is truncated.
        let mut divisor: u128 = 1;
        for digit in fraction.bytes().take(18) {
            divisor *= 10;
            nanos += u128::from(digit - b'0') * scale / divisor;
        }

        total = total
            .checked_add(nanos)
            .ok_or_else(|| invalid("duration out of range"))?;
        rest = tail;
    }

    if total == 0 {
        return Err(invalid("duration must be positive"));
    }
    let nanos = u64::try_from(total).map_err(|_| invalid("duration out of range"))?;
    Ok(Duration::from_nanos(nanos))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 60 * 60 * 1_000_000_000,
        _ => return None,
    })
}
