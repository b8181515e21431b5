//! Automation command definitions.
//!
//! Commands are dispatched verbatim to the host's command interpreter as
//! `(command "<NAME>" "<arg1>" ...) `, a parenthesized, space-joined, quoted
//! argument list followed by exactly one space.
//!
//! # Commands
//!
//! | Command | Arguments | Purpose |
//! |---------|-----------|---------|
//! | `TRUSTEDPATHS` | extension dir | Trust the extension's folder |
//! | `NETLOAD` | extension path | Load the extension into the host |
//! | `SACAD_CONNECT` | `host:port`, secret | Make the extension connect back |
//! | `SACAD_PING` | secret | Answer `ping` with `pong` over TCP |
//! | `SACAD_DBOP` | secret | Process one database-operation frame |
//! | `SACAD_DOCOP` | secret | Process one document-operation frame |
//! | `SACAD_SESSIONOP` | secret | Process one session-context frame |
//!
//! The extension never replies over the automation channel; every answer
//! arrives as a frame on the TCP connection.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::identifiers::SessionSecret;

// ============================================================================
// Operation
// ============================================================================

/// Which wake command the extension should run for a request frame.
///
/// Database and document operations run under an exclusive document lock on
/// the host side; session operations run in the application context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operation {
    /// Database mutation or query.
    #[default]
    Database,
    /// Document-level operation.
    Document,
    /// Application/session-level operation.
    Session,
}

impl Operation {
    /// Builds the wake command for this operation.
    #[inline]
    #[must_use]
    pub fn wake(self, secret: SessionSecret) -> HostCommand {
        match self {
            Self::Database => HostCommand::DbOp(secret),
            Self::Document => HostCommand::DocOp(secret),
            Self::Session => HostCommand::SessionOp(secret),
        }
    }
}

// ============================================================================
// HostCommand
// ============================================================================

/// A command understood by the host's interpreter or by the loaded extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// Add a folder to the host's trusted load locations.
    TrustedPaths(PathBuf),

    /// Load a managed extension binary.
    Netload(PathBuf),

    /// Ask the extension to connect back to the listener.
    Connect {
        /// Listener address.
        endpoint: SocketAddr,
        /// Session correlation token.
        secret: SessionSecret,
    },

    /// Handshake probe.
    Ping(SessionSecret),

    /// Database-operation wake.
    DbOp(SessionSecret),

    /// Document-operation wake.
    DocOp(SessionSecret),

    /// Session-operation wake.
    SessionOp(SessionSecret),
}

impl HostCommand {
    /// Returns the command name as typed into the host's interpreter.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TrustedPaths(_) => "TRUSTEDPATHS",
            Self::Netload(_) => "NETLOAD",
            Self::Connect { .. } => "SACAD_CONNECT",
            Self::Ping(_) => "SACAD_PING",
            Self::DbOp(_) => "SACAD_DBOP",
            Self::DocOp(_) => "SACAD_DOCOP",
            Self::SessionOp(_) => "SACAD_SESSIONOP",
        }
    }

    /// Returns the command arguments, already escaped.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::TrustedPaths(path) | Self::Netload(path) => vec![escape_path(path)],
            Self::Connect { endpoint, secret } => vec![endpoint.to_string(), secret.to_string()],
            Self::Ping(secret) | Self::DbOp(secret) | Self::DocOp(secret) | Self::SessionOp(secret) => {
                vec![secret.to_string()]
            }
        }
    }

    /// Renders the full command text.
    #[must_use]
    pub fn to_command_text(&self) -> String {
        build_command_text(self.name(), self.args())
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_text())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds `(command "<name>" "<arg>" ...) ` from a name and its arguments.
#[must_use]
pub fn build_command_text<I, S>(name: &str, args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::from("(command \"");
    text.push_str(name);
    for arg in args {
        text.push_str("\" \"");
        text.push_str(arg.as_ref());
    }
    text.push_str("\") ");
    text
}

/// Escapes path separators so the interpreter's string reader keeps them.
#[must_use]
pub fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use uuid::Uuid;

    fn nil_secret() -> SessionSecret {
        SessionSecret::from_uuid(Uuid::nil())
    }

    #[test]
    fn test_command_text_format() {
        let text = build_command_text("NAME", ["a", "b"]);
        assert_eq!(text, "(command \"NAME\" \"a\" \"b\") ");
    }

    #[test]
    fn test_command_text_without_args() {
        assert_eq!(build_command_text("REGEN", Vec::<String>::new()), "(command \"REGEN\") ");
    }

    #[test]
    fn test_ping_command() {
        let cmd = HostCommand::Ping(nil_secret());
        assert_eq!(
            cmd.to_command_text(),
            "(command \"SACAD_PING\" \"00000000-0000-0000-0000-000000000000\") "
        );
    }

    #[test]
    fn test_connect_command() {
        let cmd = HostCommand::Connect {
            endpoint: "127.0.0.1:48652".parse().expect("addr"),
            secret: nil_secret(),
        };
        assert_eq!(
            cmd.to_string(),
            "(command \"SACAD_CONNECT\" \"127.0.0.1:48652\" \"00000000-0000-0000-0000-000000000000\") "
        );
    }

    #[test]
    fn test_netload_escapes_backslashes() {
        let cmd = HostCommand::Netload(PathBuf::from(r"C:\ext\2023\SacadMgd.dll"));
        assert_eq!(
            cmd.to_command_text(),
            r#"(command "NETLOAD" "C:\\ext\\2023\\SacadMgd.dll") "#
        );
    }

    #[test]
    fn test_operation_wake_commands() {
        let secret = nil_secret();
        assert_eq!(Operation::Database.wake(secret).name(), "SACAD_DBOP");
        assert_eq!(Operation::Document.wake(secret).name(), "SACAD_DOCOP");
        assert_eq!(Operation::Session.wake(secret).name(), "SACAD_SESSIONOP");
        assert_eq!(Operation::default(), Operation::Database);
    }
}
