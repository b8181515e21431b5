//! Host automation seam.
//!
//! The bridge never talks to the host's automation runtime directly. It goes
//! through [`HostLauncher`] to obtain an [`AutomationHandle`], and every call
//! on the handle reports failures as a [`HostFault`].

// ============================================================================
// Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Generic dispatch fault; the detail lives in the fault's `scode`.
pub const DISP_E_EXCEPTION: i32 = -2_147_352_567;

/// The host rejected the call because it is busy.
pub const RPC_E_CALL_REJECTED: i32 = -2_147_418_111;

/// `scode` of a dispatch fault raised when the host has no active document.
pub const E_NO_DOCUMENT: i32 = -2_145_320_900;

// ============================================================================
// HostFault
// ============================================================================

/// A failure reported by the host's automation interface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostFault {
    /// The automation handle exists but the host is still starting up.
    #[error("host not ready: {message}")]
    NotReady {
        /// Detail from the automation runtime.
        message: String,
    },

    /// A dispatch-level fault with its numeric codes.
    #[error("dispatch fault {code:#010x} (scode {scode:#010x}): {message}")]
    Dispatch {
        /// Top-level fault code.
        code: i32,
        /// Detail code; meaningful when `code` is [`DISP_E_EXCEPTION`].
        scode: i32,
        /// Host-provided description.
        message: String,
    },

    /// Anything else the seam could not classify.
    #[error("{message}")]
    Other {
        /// Description of the failure.
        message: String,
    },
}

impl HostFault {
    /// Creates a not-ready fault.
    #[inline]
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::NotReady {
            message: message.into(),
        }
    }

    /// Creates a dispatch fault.
    #[inline]
    pub fn dispatch(code: i32, scode: i32, message: impl Into<String>) -> Self {
        Self::Dispatch {
            code,
            scode,
            message: message.into(),
        }
    }

    /// Creates the fault the host raises when no document is open.
    #[inline]
    pub fn no_document() -> Self {
        Self::dispatch(DISP_E_EXCEPTION, E_NO_DOCUMENT, "no active document")
    }

    /// Creates the fault the host raises while busy.
    #[inline]
    pub fn call_rejected() -> Self {
        Self::dispatch(RPC_E_CALL_REJECTED, 0, "call was rejected by callee")
    }

    /// Creates an unclassified fault.
    #[inline]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Returns `true` if the host has no active document.
    #[inline]
    #[must_use]
    pub fn is_no_document(&self) -> bool {
        matches!(
            self,
            Self::Dispatch { code, scode, .. } if *code == DISP_E_EXCEPTION && *scode == E_NO_DOCUMENT
        )
    }

    /// Returns `true` if the host rejected the call as busy.
    #[inline]
    #[must_use]
    pub fn is_call_rejected(&self) -> bool {
        matches!(self, Self::Dispatch { code, .. } if *code == RPC_E_CALL_REJECTED)
    }
}

// ============================================================================
// Seams
// ============================================================================

/// A live handle to one host application instance.
///
/// Calls are synchronous and run on the caller's thread.
pub trait AutomationHandle: Send {
    /// Shows or hides the main window.
    fn set_visible(&mut self, visible: bool) -> Result<(), HostFault>;

    /// Dispatches command text to the active document's interpreter.
    fn send_command(&mut self, text: &str) -> Result<(), HostFault>;

    /// Opens a new empty document.
    fn add_document(&mut self) -> Result<(), HostFault>;

    /// Brings the main window to the foreground.
    fn activate_window(&mut self) -> Result<(), HostFault>;
}

/// Starts a host instance or attaches to a running one.
pub trait HostLauncher: Send + Sync {
    /// Returns a handle for the given automation program id.
    fn launch_or_attach(&self, prog_id: &str) -> Result<Box<dyn AutomationHandle>, HostFault>;
}

// ============================================================================
// Tests
// ============================================================================
