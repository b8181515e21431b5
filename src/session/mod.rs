//! Connection sessions.
//!
//! A [`Session`] ties one host instance to one transport connection and one
//! automation client, and owns the secret that keys them together.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] | Lifecycle and requests |
//! | [`SessionBuilder`] | Fluent configuration builder |
//! | [`SessionOptions`] | Plain options |
//! | [`HostVersion`] | Supported release catalog entry |
//! | [`Installations`] | Installed release discovery seam |
//!
//! # Example
//!
//! ```no_run
//! use cad_bridge::{Result, Session};
//!
//! # fn example(mut session: Session) -> Result<()> {
//! session.open()?;
//! let reply = session.request(r#"{"a":1}"#)?;
//! assert!(session.is_alive());
//! session.close();
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for session configuration.
pub mod builder;

/// Core session implementation.
pub mod core;

/// Release catalog and installation discovery.
pub mod environment;

/// Session options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use core::{Session, SessionState};
pub use environment::{
    EXTENSION_FILE_NAME, HostVersion, Installations, LATEST, StaticInstallations, find_extension,
    resolve_version,
};
pub use options::{DEFAULT_HOST, DEFAULT_PORT, SessionOptions};
