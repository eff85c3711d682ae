//! Where the one-time MFA code comes from.

use std::io::{self, BufRead, Write};

use crate::error::MfaError;

/// Source of the one-time code for an MFA device.
pub trait ReadMfaToken {
    fn read_token(&self, mfa_serial: &str) -> Result<String, MfaError>;
}

/// A code supplied up front on the command line.
pub struct SuppliedToken(pub String);

impl ReadMfaToken for SuppliedToken {
    fn read_token(&self, _mfa_serial: &str) -> Result<String, MfaError> {
        Ok(self.0.trim().to_string())
    }
}

/// Blocks until the operator types a code on standard input.
///
/// The prompt goes to stderr so stdout stays clean for export lines.
pub struct StdinToken;

impl ReadMfaToken for StdinToken {
    fn read_token(&self, mfa_serial: &str) -> Result<String, MfaError> {
        prompt_for_token(io::stdin().lock(), io::stderr(), mfa_serial)
    }
}

fn prompt_for_token(
    mut input: impl BufRead,
    mut prompt: impl Write,
    mfa_serial: &str,
) -> Result<String, MfaError> {
    write!(prompt, "Enter MFA code for {mfa_serial}: ").map_err(MfaError::MfaCodeUnavailable)?;
    prompt.flush().map_err(MfaError::MfaCodeUnavailable)?;

    let mut line = String::new();
    let read = input.read_line(&mut line).map_err(MfaError::MfaCodeUnavailable)?;
    if read == 0 {
        return Err(MfaError::MfaCodeUnavailable(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "standard input closed before an MFA code was entered",
        )));
    }

    let code = line.trim();
    if code.is_empty() {
        return Err(MfaError::MfaCodeUnavailable(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty MFA code",
        )));
    }
    Ok(code.to_string())
}
