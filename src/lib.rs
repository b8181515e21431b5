//! CAD Bridge - command/data bridge to a CAD host application.
//!
//! Drives a desktop CAD host from a separate process. The host runs an
//! in-process extension that exchanges framed JSON over a local TCP
//! socket, while the host's automation interface is used only to load the
//! extension and to wake it for each request.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   automation (wake)    ┌────────────────────────┐
//! │    Session    │ ─────────────────────► │  Host application      │
//! │               │                        │                        │
//! │  Transport ◄──┼──── TCP frames ───────►│  Extension (TCP client)│
//! └───────────────┘                        └────────────────────────┘
//! ```
//!
//! Every request follows the same order: schedule the frame, fire the wake
//! command, block for the single response frame.
//!
//! # Quick Start
//!
//! ```no_run
//! use cad_bridge::{Result, Session, StaticInstallations};
//! # use cad_bridge::automation::{AutomationHandle, HostFault, HostLauncher};
//! # struct ComLauncher;
//! # impl HostLauncher for ComLauncher {
//! #     fn launch_or_attach(&self, _: &str) -> std::result::Result<Box<dyn AutomationHandle>, HostFault> {
//! #         Err(HostFault::other("no host"))
//! #     }
//! # }
//!
//! fn main() -> Result<()> {
//!     let mut session = Session::builder()
//!         .version("LATEST")
//!         .extension_dir("./dll")
//!         .launcher(ComLauncher)
//!         .installations(StaticInstallations::new(["2021", "2023"]))
//!         .build()?;
//!
//!     session.open()?;
//!     let reply = session.request(r#"{"a":1}"#)?;
//!     println!("{reply}");
//!     session.close();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`automation`] | Host automation seams and retry policy |
//! | [`envelope`] | Tagged JSON codec and type [`Registry`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | [`SessionSecret`] |
//! | [`protocol`] | Host commands and frame codec |
//! | [`session`] | [`Session`] lifecycle |
//! | [`transport`] | TCP transport worker |

// ============================================================================
// Modules
// ============================================================================

/// Host automation client.
///
/// The automation channel only signals the extension; it never carries
/// payloads.
pub mod automation;

/// Envelope codec.
///
/// Use a [`Registry`] to decode tagged values back into typed objects.
pub mod envelope;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Host command vocabulary and frame codec.
pub mod protocol;

/// Connection sessions.
///
/// Use [`Session::builder()`] to create a configured session.
pub mod session;

/// TCP transport layer.
///
/// Internal worker thread owning the listener and the single connection.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Automation types
pub use automation::{AutomationClient, AutomationHandle, HostFault, HostLauncher, RetryPolicy};

// Envelope types
pub use envelope::{Decoded, FieldReader, FieldWriter, Members, Registry, WireObject, WireType};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::SessionSecret;

// Protocol types
pub use protocol::{HostCommand, Operation};

// Session types
pub use session::{
    HostVersion, Installations, Session, SessionBuilder, SessionOptions, SessionState,
    StaticInstallations,
};

// Transport types
pub use transport::{Transport, TransportConfig};
