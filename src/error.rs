//! Error types for the CAD bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cad_bridge::{Result, Session};
//!
//! fn example(session: &mut Session) -> Result<()> {
//!     let response = session.request(r#"{"a":1}"#)?;
//!     println!("{response}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Setup | [`Error::Config`], [`Error::NotFound`], [`Error::NotSupported`] |
//! | Codec | [`Error::Decode`], [`Error::Encode`] |
//! | Automation | [`Error::Automation`] |
//! | Transport | [`Error::Transport`], [`Error::ConnectionTimeout`], [`Error::RequestTimeout`], [`Error::Handshake`], [`Error::ChannelClosed`] |
//! | Lifecycle | [`Error::SessionClosed`] |
//! | External | [`Error::Io`] |
//!
//! [`Error::Automation`] and the transport variants together form the
//! connection-error family; see [`Error::is_connection_error`].

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::automation::HostFault;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Setup Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session or transport configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Host installation or extension binary not found.
    ///
    /// Raised by `open` before any resource is allocated.
    #[error("Not found: {message}")]
    NotFound {
        /// What was missing.
        message: String,
    },

    /// Requested host version is not supported by this bridge.
    #[error("Not supported: {message}")]
    NotSupported {
        /// Description of the unsupported request.
        message: String,
    },

    // ========================================================================
    // Codec Errors
    // ========================================================================
    /// Malformed or unregistered envelope.
    ///
    /// Local to the codec; never retried.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    /// A value could not be turned into an envelope.
    #[error("Encode error: {message}")]
    Encode {
        /// Description of the encode failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Host automation failed.
    ///
    /// Either a non-transient fault or retry exhaustion; in the latter case
    /// `source` carries the last transient cause.
    #[error("Automation error: {message}")]
    Automation {
        /// Description of the automation failure.
        message: String,
        /// Underlying host fault, if any.
        #[source]
        source: Option<HostFault>,
    },

    /// TCP channel failure.
    ///
    /// Broken pipe, peer reset, bad frame, or a lifecycle misuse such as
    /// requesting on a disconnected transport.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// No peer connected before the connection timeout elapsed.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// No response arrived before the configured request timeout.
    #[error("Request timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The ping handshake returned something other than the expected reply.
    #[error("Handshake failed: expected {expected:?}, got {actual:?}")]
    Handshake {
        /// Expected reply.
        expected: String,
        /// Reply actually received.
        actual: String,
    },

    /// Reply channel dropped by the transport worker.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Operation on a permanently closed session.
    #[error("Session is closed")]
    SessionClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[inline]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a not supported error.
    #[inline]
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an encode error.
    #[inline]
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates an automation error without an underlying fault.
    #[inline]
    pub fn automation(message: impl Into<String>) -> Self {
        Self::Automation {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an automation error wrapping a host fault.
    #[inline]
    pub fn automation_fault(message: impl Into<String>, fault: HostFault) -> Self {
        Self::Automation {
            message: message.into(),
            source: Some(fault),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(timeout_ms: u64) -> Self {
        Self::RequestTimeout { timeout_ms }
    }

    /// Creates a handshake mismatch error.
    #[inline]
    pub fn handshake(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Handshake {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this error belongs to the transport subkind.
    ///
    /// A transport error in a session exchange forces the session into its
    /// resettable state.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::ConnectionTimeout { .. }
                | Self::RequestTimeout { .. }
                | Self::Handshake { .. }
                | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if this is an automation error.
    #[inline]
    #[must_use]
    pub fn is_automation_error(&self) -> bool {
        matches!(self, Self::Automation { .. })
    }

    /// Returns `true` if this is a connection error (automation or transport).
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        self.is_automation_error() || self.is_transport_error()
    }

    /// Returns `true` if this error was raised by the envelope codec.
    #[inline]
    #[must_use]
    pub fn is_codec_error(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Encode { .. })
    }

    /// Returns `true` if the host installation is missing or unsupported.
    #[inline]
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::NotFound { .. } | Self::NotSupported { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
