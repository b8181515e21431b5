//! Retried command dispatch to the host.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::identifiers::SessionSecret;
use crate::protocol::{HostCommand, Operation};

use super::handle::{AutomationHandle, HostLauncher};
use super::retry::RetryPolicy;

// ============================================================================
// AutomationClient
// ============================================================================

/// Wraps one [`AutomationHandle`] with a retry policy.
///
/// There is no background worker: every call is a direct, retried dispatch
/// on the calling thread.
pub struct AutomationClient {
    handle: Box<dyn AutomationHandle>,
    retry: RetryPolicy,
}

impl fmt::Debug for AutomationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomationClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl AutomationClient {
    /// Wraps an existing handle.
    #[must_use]
    pub fn new(handle: Box<dyn AutomationHandle>, retry: RetryPolicy) -> Self {
        Self { handle, retry }
    }

    /// Launches or attaches to the host registered under `prog_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Automation`] if the launcher fails.
    pub fn launch_or_attach(
        launcher: &dyn HostLauncher,
        prog_id: &str,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let handle = launcher
            .launch_or_attach(prog_id)
            .map_err(|e| Error::automation_fault(format!("cannot attach to {prog_id}"), e))?;

        info!(prog_id, "Attached to host application");
        Ok(Self::new(handle, retry))
    }

    /// Returns the retry policy.
    #[inline]
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Makes the host window visible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Automation`] on a fatal fault or retry exhaustion.
    pub fn show(&mut self) -> Result<()> {
        let handle = &mut self.handle;
        self.retry.run(|| handle.set_visible(true))
    }

    /// Brings the host window to the foreground. Failures are ignored.
    pub fn activate(&mut self) {
        if let Err(e) = self.handle.activate_window() {
            debug!(error = %e, "Window activation failed");
        }
    }

    /// Dispatches raw command text.
    ///
    /// A "no active document" fault opens a new document before the retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Automation`] on a fatal fault or retry exhaustion.
    pub fn send_command(&mut self, text: &str) -> Result<()> {
        trace!(command = text, "Dispatching host command");

        let handle = &mut self.handle;
        self.retry.run(|| {
            let result = handle.send_command(text);
            if let Err(fault) = &result
                && fault.is_no_document()
            {
                debug!("No active document, creating one");
                open_document(&mut **handle);
            }
            result
        })
    }

    /// Dispatches a typed command.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub fn execute(&mut self, command: &HostCommand) -> Result<()> {
        self.send_command(&command.to_command_text())
    }

    /// Trusts the extension's folder and loads the extension binary.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub fn netload(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            self.execute(&HostCommand::TrustedPaths(dir.to_path_buf()))?;
        }
        self.execute(&HostCommand::Netload(path.to_path_buf()))?;

        info!(path = %path.display(), "Extension loaded");
        Ok(())
    }

    /// Tells the extension to connect back to `endpoint`.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub fn connect(&mut self, endpoint: SocketAddr, secret: SessionSecret) -> Result<()> {
        self.execute(&HostCommand::Connect { endpoint, secret })
    }

    /// Asks the extension to answer a pending `ping` frame.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub fn ping(&mut self, secret: SessionSecret) -> Result<()> {
        self.execute(&HostCommand::Ping(secret))
    }

    /// Wakes the extension for a database operation.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub fn db_op(&mut self, secret: SessionSecret) -> Result<()> {
        self.wake(Operation::Database, secret)
    }

    /// Wakes the extension for a document operation.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub fn doc_op(&mut self, secret: SessionSecret) -> Result<()> {
        self.wake(Operation::Document, secret)
    }

    /// Wakes the extension for a session-context operation.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub fn session_op(&mut self, secret: SessionSecret) -> Result<()> {
        self.wake(Operation::Session, secret)
    }

    /// Sends the wake command matching `op`.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub fn wake(&mut self, op: Operation, secret: SessionSecret) -> Result<()> {
        self.execute(&op.wake(secret))
    }
}

/// Opens a new document; a failure here surfaces on the next attempt.
fn open_document(handle: &mut dyn AutomationHandle) {
    if let Err(e) = handle.add_document() {
        debug!(error = %e, "Creating a document failed");
    }
}

// ============================================================================
// Tests
// ============================================================================
