//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::request::Flow;

/// AWS MFA session credential refresher.
///
/// Obtains temporary credentials with an MFA code and writes them to the
/// `[<profile>_mfa]` section of the AWS credentials file.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Assume the IAM role configured for a profile, with MFA
    #[command(visible_alias = "roleSession")]
    RoleSession(SessionArgs),

    /// Get a session token for the IAM user behind a profile, with MFA
    #[command(visible_alias = "userSession")]
    UserSession(SessionArgs),
}

impl Command {
    pub fn into_parts(self) -> (Flow, SessionArgs) {
        match self {
            Self::RoleSession(args) => (Flow::Role, args),
            Self::UserSession(args) => (Flow::User, args),
        }
    }
}

#[derive(Args)]
pub struct SessionArgs {
    /// Profile to refresh; credentials are written to `[<profile>_mfa]`
    #[arg(short, long, default_value = "default")]
    pub profile: String,

    /// Session duration, e.g. 1h, 90m, 1h30m
    #[arg(short, long, default_value = "1h")]
    pub duration: String,

    /// MFA code; prompted for on stdin when omitted
    #[arg(short, long)]
    pub token: Option<String>,

    /// Print shell commands that export the new credentials
    #[arg(short, long)]
    pub export: bool,

    /// Path to AWS credentials file [default: ~/.aws/credentials]
    #[arg(long, env = "AWS_SHARED_CREDENTIALS_FILE")]
    pub credentials_path: Option<PathBuf>,

    /// Path to AWS config file [default: ~/.aws/config]
    #[arg(long, env = "AWS_CONFIG_FILE")]
    pub config_path: Option<PathBuf>,
}
