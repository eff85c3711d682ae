//! MFA device lookup for the user-session flow.

use log::info;

use crate::{error::MfaError, sts::SecurityTokenService};

/// Derives the MFA device ARN from an IAM user ARN by swapping the first
/// `user` for `mfa`, e.g. `arn:aws:iam::123456789012:user/alice` becomes
/// `arn:aws:iam::123456789012:mfa/alice`. An ARN without `user` is returned
/// unchanged.
pub fn mfa_serial_from_arn(arn: &str) -> String {
    arn.replacen("user", "mfa", 1)
}

/// Asks STS who the caller is and derives the caller's MFA serial.
pub async fn resolve_mfa_serial(sts: &impl SecurityTokenService) -> Result<String, MfaError> {
    let arn = sts.caller_arn().await?;
    let serial = mfa_serial_from_arn(&arn);
    info!("MFA serial for {arn} is {serial}");
    Ok(serial)
}
