//! Shell commands that load refreshed credentials into the environment.

use crate::credentials::CredentialTriple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFamily {
    /// sh, bash, zsh and friends.
    Posix,
    /// cmd.exe
    WindowsCmd,
}

impl ShellFamily {
    /// The family native to the host this binary runs on.
    pub fn current() -> Self {
        if cfg!(windows) { Self::WindowsCmd } else { Self::Posix }
    }

    fn line(self, name: &str, value: &str) -> String {
        match self {
            Self::Posix => format!("export {name}=\"{value}\""),
            Self::WindowsCmd => format!("set {name}={value}"),
        }
    }
}

/// One line per environment variable, each terminated by a newline.
pub fn render(shell: ShellFamily, triple: &CredentialTriple) -> String {
    [
        ("AWS_ACCESS_KEY_ID", &triple.access_key_id),
        ("AWS_SECRET_ACCESS_KEY", &triple.secret_access_key),
        ("AWS_SESSION_TOKEN", &triple.session_token),
    ]
    .iter()
    .map(|(name, value)| shell.line(name, value) + "\n")
    .collect()
}
