//! Blocking transport API.
//!
//! [`Transport`] owns a worker thread for its whole life. Every method sends
//! a command to that worker and, where there is something to wait for,
//! blocks on a [`Rendezvous`].
//!
//! # Example
//!
//! ```no_run
//! use cad_bridge::transport::{Transport, TransportConfig};
//!
//! # fn example() -> cad_bridge::Result<()> {
//! let transport = Transport::new(TransportConfig::default())?;
//! let addr = transport.open("127.0.0.1:48652".parse().unwrap(), |bound| {
//!     // tell the peer to connect to `bound`
//!     Ok(())
//! })?;
//!
//! let response = transport.request(r#"{"a":1}"#)?;
//! transport.close();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::DEFAULT_MAX_FRAME_BYTES;

use super::connection::{Shared, Worker, WorkerCommand};
use super::rendezvous::Rendezvous;

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for the peer to connect back.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Worker thread name.
const WORKER_THREAD_NAME: &str = "cad-bridge-transport";

// ============================================================================
// TransportConfig
// ============================================================================

/// Transport tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// How long `open` waits for the peer after the listener is bound.
    pub connect_timeout: Duration,
    /// Bound on one request round trip. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Largest response frame accepted.
    pub max_frame_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// One listener, at most one connection, one worker thread.
///
/// # Thread Safety
///
/// `Transport` is `Send + Sync`, but requests must be serialized by the
/// caller: the worker handles them strictly one after another.
///
/// The blocking methods must not be called from inside an async runtime.
pub struct Transport {
    config: TransportConfig,
    command_tx: mpsc::UnboundedSender<WorkerCommand>,
    shutdown_tx: watch::Sender<bool>,
    interrupt_tx: watch::Sender<u64>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .field("closed", &self.is_closed())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

// ============================================================================
// Transport - Lifecycle
// ============================================================================

impl Transport {
    /// Creates the transport and starts its worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the runtime or thread cannot be created.
    pub fn new(config: TransportConfig) -> Result<Self> {
        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (interrupt_tx, interrupt_rx) = watch::channel(0);
        let shared = Arc::new(Shared::default());

        let worker = Worker::new(
            config,
            command_rx,
            shutdown_rx,
            interrupt_rx,
            Arc::clone(&shared),
        );
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(worker.run()))?;

        debug!("Transport created");

        Ok(Self {
            config,
            command_tx,
            shutdown_tx,
            interrupt_tx,
            shared,
            worker: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }

    /// Binds `addr`, runs `on_listening`, then blocks until one peer connects.
    ///
    /// `on_listening` receives the bound address (useful with port `0`) and
    /// runs on the calling thread after the bind and before any peer can
    /// have been accepted. Returns the bound address.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if already listening or connected, or the bind fails
    /// - Whatever `on_listening` returns; the listener is abandoned
    /// - [`Error::ConnectionTimeout`] if no peer connects in time
    /// - [`Error::SessionClosed`] after [`close`](Self::close)
    pub fn open<F>(&self, addr: SocketAddr, on_listening: F) -> Result<SocketAddr>
    where
        F: FnOnce(SocketAddr) -> Result<()>,
    {
        let (bound_tx, bound) = Rendezvous::channel();
        let (accepted_tx, accepted) = Rendezvous::channel();
        self.send(WorkerCommand::Listen {
            addr,
            bound_tx,
            accepted_tx,
        })?;

        let local_addr = bound.wait()?;

        if let Err(e) = on_listening(local_addr) {
            warn!(error = %e, "Listener callback failed, abandoning listener");
            // The peer may already have been accepted.
            if let Err(e) = self.disconnect() {
                debug!(error = %e, "Abandoning listener failed");
            }
            return Err(e);
        }

        accepted.wait()?;

        info!(%local_addr, "Transport connected");
        Ok(local_addr)
    }

    /// Closes the current connection. The transport can be opened again.
    ///
    /// Requests submitted before this call and not yet answered fail with a
    /// transport error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after [`close`](Self::close).
    pub fn disconnect(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        self.interrupt_tx.send_modify(|generation| *generation += 1);

        let (done_tx, done) = Rendezvous::channel();
        self.send(WorkerCommand::Disconnect { done_tx })?;
        done.wait()
    }

    /// Stops the worker and releases every socket. Idempotent.
    ///
    /// A request still in flight fails with a transport error.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.worker.lock().take()
            && handle.join().is_err()
        {
            warn!("Transport worker panicked");
        }

        debug!("Transport closed");
    }
}

// ============================================================================
// Transport - Requests
// ============================================================================

impl Transport {
    /// Schedules one round trip and returns without waiting for it.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if no peer is connected
    /// - [`Error::SessionClosed`] after [`close`](Self::close)
    pub fn submit(&self, payload: impl Into<String>) -> Result<PendingRequest> {
        if !self.is_connected() {
            return Err(Error::transport("not connected"));
        }

        let (response_tx, response) = Rendezvous::channel();
        self.send(WorkerCommand::Request {
            payload: payload.into(),
            generation: *self.interrupt_tx.borrow(),
            response_tx,
        })?;

        Ok(PendingRequest { response })
    }

    /// Sends `payload` and blocks for the response.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit) and [`PendingRequest::wait`].
    pub fn request(&self, payload: impl Into<String>) -> Result<String> {
        self.submit(payload)?.wait()
    }

    fn send(&self, command: WorkerCommand) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        self.command_tx
            .send(command)
            .map_err(|_| Error::transport("transport worker is gone"))
    }
}

// ============================================================================
// Transport - Accessors
// ============================================================================

impl Transport {
    /// Returns `true` while a peer is connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Returns `true` after [`close`](Self::close).
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns the bound address while listening or connected.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.shared.local_addr.lock()
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// PendingRequest
// ============================================================================

/// A scheduled round trip.
#[derive(Debug)]
pub struct PendingRequest {
    response: Rendezvous<String>,
}

impl PendingRequest {
    /// Blocks until the response frame arrives.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] on any I/O or framing failure
    /// - [`Error::RequestTimeout`] if a request timeout is configured and expires
    /// - [`Error::ChannelClosed`] if the transport shut down meanwhile
    pub fn wait(self) -> Result<String> {
        self.response.wait()
    }
}

// ============================================================================
// Tests
// ============================================================================
