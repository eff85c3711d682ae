//! AWS MFA session refresher
//!
//! Exchanges an MFA code for temporary AWS credentials and stores them in the
//! `[<profile>_mfa]` section of the shared credentials file.
//!
//! Two flows are supported:
//! 1. `role-session`: AssumeRole for the role configured on the profile
//! 2. `user-session`: GetSessionToken as the IAM user behind the profile,
//!    with the MFA device derived from the caller's ARN
//!
//! With `--export` the new credentials are also printed as shell commands,
//! so `eval "$(aws-mfa-session user-session -e)"` loads them into the
//! current shell.

use anyhow::Result;
use clap::Parser;

mod cli;
mod credentials;
mod error;
mod export;
mod identity;
mod mfa;
mod profile;
mod request;
mod store;
mod sts;
mod updater;

use cli::{Cli, SessionArgs};
use export::ShellFamily;
use mfa::{ReadMfaToken, StdinToken, SuppliedToken};
use request::SessionRequest;

#[tokio::main]
async fn main() -> Result<()> {
    // INFO by default so progress is visible; RUST_LOG still overrides.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let (
        flow,
        SessionArgs {
            profile,
            duration,
            token,
            export: print_exports,
            credentials_path,
            config_path,
        },
    ) = Cli::parse().command.into_parts();

    let request = SessionRequest::new(flow, Some(profile), Some(duration.as_str()), token, dirs::home_dir())?
        .with_credentials_file(credentials_path)
        .with_config_file(config_path);

    let tokens: Box<dyn ReadMfaToken> = match request.mfa_code() {
        Some(code) => Box::new(SuppliedToken(code.to_string())),
        None => Box::new(StdinToken),
    };

    let triple = updater::refresh(&request, tokens.as_ref()).await?;

    if print_exports {
        print!("{}", export::render(ShellFamily::current(), &triple));
    }
    Ok(())
}
