//! Connection session: one logical link to one host instance.
//!
//! # State Machine
//!
//! ```text
//!            open()             handshake ok
//! Closed ──────────► Opening ─────────────────► Connected
//!                      │  ▲                        │
//!          open failed │  │ open()                 │ transport failure
//!                      ▼  │                        ▼
//!                     Reset ◄──────────────────  Broken
//!
//! close() from any state ──► Terminated
//! ```
//!
//! # Request Ordering
//!
//! A request first schedules the frame on the transport, then fires the
//! automation wake command, then blocks for the response. The wake command
//! does not wait for the frame to be flushed; the automation round trip is
//! what normally gives the worker time to write it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::automation::{AutomationClient, HostLauncher};
use crate::envelope::{self, Registry, WireObject, WireType};
use crate::error::{Error, Result};
use crate::identifiers::SessionSecret;
use crate::protocol::{HostCommand, Operation, PING, PONG};
use crate::transport::Transport;

use super::builder::SessionBuilder;
use super::environment::{HostVersion, Installations, find_extension, resolve_version};
use super::options::SessionOptions;

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Constructed, never opened.
    Closed,
    /// `open` is in progress.
    Opening,
    /// Handshake succeeded; requests are accepted.
    Connected,
    /// A transport failure was observed; teardown follows immediately.
    Broken,
    /// Torn down but reusable; `open` may run again.
    Reset,
    /// Permanently closed.
    Terminated,
}

impl SessionState {
    /// Returns `true` if `open` may be called.
    #[inline]
    #[must_use]
    pub const fn can_open(self) -> bool {
        matches!(self, Self::Closed | Self::Reset)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Connected => "connected",
            Self::Broken => "broken",
            Self::Reset => "reset",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Session
// ============================================================================

/// One logical connection to one host application instance.
///
/// The automation client exists exactly while the transport holds a live
/// connection; both are set up by [`open`](Self::open) and torn down
/// together.
///
/// Every request method takes `&mut self`, so one session never has two
/// requests in flight.
pub struct Session {
    options: SessionOptions,
    extension_dir: PathBuf,
    launcher: Arc<dyn HostLauncher>,
    installations: Arc<dyn Installations>,
    secret: SessionSecret,
    resolved: Option<&'static HostVersion>,
    transport: Transport,
    client: Option<AutomationClient>,
    state: SessionState,
}

// ============================================================================
// Session - Display
// ============================================================================

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("secret", &self.secret)
            .field("requested", &self.options.version)
            .field("resolved", &self.resolved.map(HostVersion::name))
            .field("state", &self.state)
            .field("local_addr", &self.transport.local_addr())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Construction
// ============================================================================

impl Session {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn new(
        options: SessionOptions,
        extension_dir: PathBuf,
        launcher: Arc<dyn HostLauncher>,
        installations: Arc<dyn Installations>,
    ) -> Result<Self> {
        let transport = Transport::new(options.transport_config())?;
        let secret = SessionSecret::generate();

        debug!(session = %secret, version = %options.version, "Session created");

        Ok(Self {
            options,
            extension_dir,
            launcher,
            installations,
            secret,
            resolved: None,
            transport,
            client: None,
            state: SessionState::Closed,
        })
    }
}

// ============================================================================
// Session - Lifecycle
// ============================================================================

impl Session {
    /// Attaches to the host, loads the extension, and completes the handshake.
    ///
    /// Version and extension lookup happen first; if either fails nothing
    /// has been allocated. Any later failure tears down what was set up and
    /// leaves the session in [`SessionState::Reset`]. Calling `open` on a
    /// connected session does nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] / [`Error::NotSupported`] from version or
    ///   extension lookup
    /// - [`Error::Automation`] if the host cannot be driven
    /// - [`Error::ConnectionTimeout`] if the extension never connects back
    /// - [`Error::Handshake`] if the ping reply is not `pong`
    /// - [`Error::SessionClosed`] after [`close`](Self::close)
    pub fn open(&mut self) -> Result<()> {
        self.ensure_not_terminated()?;
        if self.state == SessionState::Connected {
            debug!(session = %self.secret, "Session already open");
            return Ok(());
        }
        if !self.state.can_open() {
            return Err(Error::transport(format!("session is {}", self.state)));
        }

        let version = resolve_version(&self.options.version, self.installations.as_ref())?;
        let extension = find_extension(&self.extension_dir, version).ok_or_else(|| {
            Error::not_supported(format!(
                "no extension build for host release {version} in {}",
                self.extension_dir.display()
            ))
        })?;

        self.resolved = Some(version);
        self.state = SessionState::Opening;
        info!(session = %self.secret, %version, "Opening session");

        match self.establish(version, &extension) {
            Ok(()) => {
                self.state = SessionState::Connected;
                info!(session = %self.secret, "Session connected");
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.secret, error = %e, "Open failed, tearing down");
                self.teardown();
                Err(e)
            }
        }
    }

    /// Tears down the connection and automation client; `open` may follow.
    ///
    /// The secret is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after [`close`](Self::close).
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_not_terminated()?;
        self.teardown();
        info!(session = %self.secret, "Session reset");
        Ok(())
    }

    /// Permanently closes the session and stops the transport worker.
    ///
    /// Idempotent. Also runs on drop.
    pub fn close(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }

        self.client = None;
        self.transport.close();
        self.state = SessionState::Terminated;

        info!(session = %self.secret, "Session closed");
    }

    /// Returns `true` only if the session is connected and a ping succeeds.
    ///
    /// Never fails; a failing ping resets the session.
    pub fn is_alive(&mut self) -> bool {
        if self.client.is_none() || self.state != SessionState::Connected {
            return false;
        }

        match self.handshake() {
            Ok(()) => true,
            Err(e) => {
                debug!(session = %self.secret, error = %e, "Liveness check failed");
                false
            }
        }
    }
}

// ============================================================================
// Session - Requests
// ============================================================================

impl Session {
    /// Sends a payload as a database operation and returns the response.
    ///
    /// # Errors
    ///
    /// See [`request_with`](Self::request_with).
    pub fn request(&mut self, payload: &str) -> Result<String> {
        self.request_with(Operation::Database, payload)
    }

    /// Sends a payload and wakes the extension with the command for `op`.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if the session is not connected or the
    ///   exchange fails; the session is reset
    /// - [`Error::Automation`] if the wake command fails; the session is reset
    /// - [`Error::SessionClosed`] after [`close`](Self::close)
    pub fn request_with(&mut self, op: Operation, payload: &str) -> Result<String> {
        let wake = op.wake(self.secret);
        self.exchange(payload, &wake)
    }

    /// Database operation under the host's document lock.
    ///
    /// # Errors
    ///
    /// See [`request_with`](Self::request_with).
    pub fn db_operation(&mut self, payload: &str) -> Result<String> {
        self.request_with(Operation::Database, payload)
    }

    /// Document-level operation.
    ///
    /// # Errors
    ///
    /// See [`request_with`](Self::request_with).
    pub fn doc_operation(&mut self, payload: &str) -> Result<String> {
        self.request_with(Operation::Document, payload)
    }

    /// Application-context operation.
    ///
    /// # Errors
    ///
    /// See [`request_with`](Self::request_with).
    pub fn session_operation(&mut self, payload: &str) -> Result<String> {
        self.request_with(Operation::Session, payload)
    }

    /// Encodes `request`, sends it, and decodes the response as `T`.
    ///
    /// # Errors
    ///
    /// - [`Error::Encode`] / [`Error::Decode`] from the envelope codec
    /// - See [`request_with`](Self::request_with)
    pub fn call<T: WireType>(
        &mut self,
        registry: &Registry,
        op: Operation,
        request: &dyn WireObject,
    ) -> Result<T> {
        let payload = envelope::encode(request)?;
        let response = self.request_with(op, &payload)?;
        registry.decode_as(&response)
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Per-session correlation token.
    #[inline]
    #[must_use]
    pub const fn secret(&self) -> SessionSecret {
        self.secret
    }

    /// Release name as requested (may be `LATEST`).
    #[inline]
    #[must_use]
    pub fn requested_version(&self) -> &str {
        &self.options.version
    }

    /// Release the last `open` resolved to.
    #[inline]
    #[must_use]
    pub const fn resolved_version(&self) -> Option<&'static HostVersion> {
        self.resolved
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` while connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.transport.is_connected()
    }

    /// Listener address while connected.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    /// Session options.
    #[inline]
    #[must_use]
    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }
}

// ============================================================================
// Session - Internals
// ============================================================================

impl Session {
    fn establish(&mut self, version: &HostVersion, extension: &Path) -> Result<()> {
        let mut client = AutomationClient::launch_or_attach(
            self.launcher.as_ref(),
            version.prog_id(),
            self.options.retry,
        )?;
        client.show()?;

        if self.options.netload {
            client.netload(extension)?;
        }

        let secret = self.secret;
        self.transport
            .open(self.options.endpoint(), |bound| client.connect(bound, secret))?;

        self.client = Some(client);
        self.handshake()
    }

    /// Sends `ping` and expects `pong`.
    fn handshake(&mut self) -> Result<()> {
        let reply = self.exchange(PING, &HostCommand::Ping(self.secret))?;
        if reply == PONG {
            return Ok(());
        }

        let err = Error::handshake(PONG, reply);
        self.fail(&err);
        Err(err)
    }

    /// Submit, wake, wait. A connection failure resets the session.
    fn exchange(&mut self, payload: &str, wake: &HostCommand) -> Result<String> {
        self.ensure_not_terminated()?;
        let Some(client) = self.client.as_mut() else {
            return Err(Error::transport("session is not open"));
        };

        let result = round_trip(&self.transport, client, payload, wake);

        if let Err(e) = &result
            && e.is_connection_error()
        {
            self.fail(e);
        }
        result
    }

    /// Marks the link broken and tears it down.
    fn fail(&mut self, error: &Error) {
        warn!(session = %self.secret, error = %error, "Session link broken");
        self.state = SessionState::Broken;
        self.teardown();
    }

    /// Drops the automation client and disconnects the transport.
    fn teardown(&mut self) {
        self.client = None;
        if let Err(e) = self.transport.disconnect() {
            debug!(error = %e, "Transport disconnect failed");
        }
        self.state = SessionState::Reset;
    }

    fn ensure_not_terminated(&self) -> Result<()> {
        if self.state == SessionState::Terminated {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Schedules the frame, fires the wake command, then blocks for the reply.
fn round_trip(
    transport: &Transport,
    client: &mut AutomationClient,
    payload: &str,
    wake: &HostCommand,
) -> Result<String> {
    let pending = transport.submit(payload)?;
    client.execute(wake)?;
    pending.wait()
}

// ============================================================================
// Tests
// ============================================================================
