//! Transport worker and its event loop.
//!
//! The worker runs on a dedicated thread inside a current-thread tokio
//! runtime and owns every socket. Callers talk to it only through
//! [`WorkerCommand`]s.
//!
//! # Event Loop
//!
//! The loop waits on three sources:
//!
//! - The shutdown signal
//! - The pending listener, while an `open` is waiting for its peer
//! - Commands from the blocking [`Transport`](super::Transport) API
//!
//! Requests are handled one at a time to completion, so frames are never
//! pipelined. An exchange still reacts to shutdown and to a disconnect
//! requested after it was submitted; both fail the waiting caller with a
//! transport error.

// ============================================================================
// Imports
// ============================================================================

use std::future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::FrameCodec;

use super::TransportConfig;
use super::rendezvous::Slot;
use super::server::{PendingAccept, duration_ms};

// ============================================================================
// Types
// ============================================================================

/// Framed TCP connection to the extension.
type FramedConnection = Framed<TcpStream, FrameCodec>;

// ============================================================================
// WorkerCommand
// ============================================================================

/// Internal commands for the event loop.
pub(crate) enum WorkerCommand {
    /// Bind a listener and wait for one peer.
    Listen {
        addr: SocketAddr,
        bound_tx: Slot<SocketAddr>,
        accepted_tx: Slot<()>,
    },
    /// Write one frame and read one frame back.
    Request {
        payload: String,
        /// Interrupt generation observed at submit time.
        generation: u64,
        response_tx: Slot<String>,
    },
    /// Close the current connection, keeping the worker alive.
    Disconnect { done_tx: Slot<()> },
}

// ============================================================================
// Shared
// ============================================================================

/// State the worker publishes to the blocking API.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    /// A peer is connected.
    pub(crate) connected: AtomicBool,
    /// Address of the current listener or connection's local end.
    pub(crate) local_addr: Mutex<Option<SocketAddr>>,
}

impl Shared {
    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn set_local_addr(&self, addr: Option<SocketAddr>) {
        *self.local_addr.lock() = addr;
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Owner of the listener and the single connection.
pub(crate) struct Worker {
    config: TransportConfig,
    commands: mpsc::UnboundedReceiver<WorkerCommand>,
    shutdown: watch::Receiver<bool>,
    interrupts: watch::Receiver<u64>,
    shared: Arc<Shared>,
    pending: Option<PendingAccept>,
    connection: Option<FramedConnection>,
}

impl Worker {
    pub(crate) fn new(
        config: TransportConfig,
        commands: mpsc::UnboundedReceiver<WorkerCommand>,
        shutdown: watch::Receiver<bool>,
        interrupts: watch::Receiver<u64>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            config,
            commands,
            shutdown,
            interrupts,
            shared,
            pending: None,
            connection: None,
        }
    }

    /// Runs until shutdown or until every command sender is gone.
    pub(crate) async fn run(mut self) {
        debug!("Transport worker started");

        loop {
            tokio::select! {
                () = wait_for_shutdown(&mut self.shutdown) => {
                    debug!("Shutdown signal received");
                    break;
                }

                accepted = accept_pending(&self.pending), if self.pending.is_some() => {
                    self.finish_accept(accepted);
                }

                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        if let Some(pending) = self.pending.take() {
            pending.finish(Err(Error::transport("transport closed")));
        }
        self.drop_connection();

        debug!("Transport worker terminated");
    }

    async fn handle_command(&mut self, command: WorkerCommand) {
        match command {
            WorkerCommand::Listen {
                addr,
                bound_tx,
                accepted_tx,
            } => {
                if self.pending.is_some() || self.connection.is_some() {
                    let _ = bound_tx.send(Err(Error::transport(
                        "transport is already listening or connected; disconnect first",
                    )));
                    return;
                }

                match PendingAccept::bind(addr, self.config.connect_timeout, accepted_tx).await {
                    Ok(pending) => {
                        let local_addr = pending.local_addr();
                        self.shared.set_local_addr(Some(local_addr));
                        self.pending = Some(pending);
                        let _ = bound_tx.send(Ok(local_addr));
                    }
                    Err(e) => {
                        let _ = bound_tx.send(Err(e));
                    }
                }
            }

            WorkerCommand::Request {
                payload,
                generation,
                response_tx,
            } => {
                let result = self.exchange(payload, generation).await;
                let _ = response_tx.send(result);
            }

            WorkerCommand::Disconnect { done_tx } => {
                if let Some(pending) = self.pending.take() {
                    pending.finish(Err(Error::transport("transport disconnected")));
                }
                self.drop_connection();
                let _ = done_tx.send(Ok(()));
            }
        }
    }

    fn finish_accept(&mut self, accepted: Result<(TcpStream, SocketAddr)>) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        match accepted {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(error = %e, "Failed to set TCP_NODELAY");
                }
                let codec = FrameCodec::with_max_frame_bytes(self.config.max_frame_bytes);
                self.connection = Some(Framed::new(stream, codec));
                self.shared.set_connected(true);

                info!(%peer, "Peer connected");
                pending.finish(Ok(()));
            }
            Err(e) => {
                warn!(error = %e, "No peer connected");
                self.shared.set_local_addr(None);
                pending.finish(Err(e));
            }
        }
    }

    /// Performs one write-then-read round trip.
    ///
    /// Any failure drops the connection.
    async fn exchange(&mut self, payload: String, generation: u64) -> Result<String> {
        let request_timeout = self.config.request_timeout;
        let shutdown = &mut self.shutdown;
        let interrupts = &mut self.interrupts;
        let Some(connection) = self.connection.as_mut() else {
            return Err(Error::transport("not connected"));
        };

        trace!(len = payload.len(), "Sending frame");

        let round_trip = round_trip(connection, payload);
        let bounded = async move {
            match request_timeout {
                Some(limit) => timeout(limit, round_trip)
                    .await
                    .map_err(|_| Error::request_timeout(duration_ms(limit)))?,
                None => round_trip.await,
            }
        };

        let result = tokio::select! {
            result = bounded => result,
            () = wait_for_shutdown(shutdown) => {
                Err(Error::transport("transport closed during request"))
            }
            () = wait_for_interrupt(interrupts, generation) => {
                Err(Error::transport("request interrupted by disconnect"))
            }
        };

        match result {
            Ok(response) => {
                trace!(len = response.len(), "Received frame");
                Ok(response)
            }
            Err(e) => {
                warn!(error = %e, "Exchange failed, dropping connection");
                self.drop_connection();
                Err(e)
            }
        }
    }

    /// Drops the socket without flushing; a stalled peer must not block the worker.
    fn drop_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            let unsent = connection.write_buffer().len();
            drop(connection);
            info!(unsent, "Connection closed");
        }
        self.shared.set_connected(false);
        self.shared.set_local_addr(None);
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Accepts on the pending listener, or never resolves if there is none.
async fn accept_pending(pending: &Option<PendingAccept>) -> Result<(TcpStream, SocketAddr)> {
    match pending {
        Some(pending) => pending.accept().await,
        None => future::pending().await,
    }
}

/// Resolves once the shutdown flag is set or the transport is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

/// Resolves once a disconnect newer than `generation` was requested.
async fn wait_for_interrupt(interrupts: &mut watch::Receiver<u64>, generation: u64) {
    let _ = interrupts.wait_for(|current| *current != generation).await;
}

/// Writes one frame and reads exactly one frame back.
async fn round_trip(connection: &mut FramedConnection, payload: String) -> Result<String> {
    connection.send(payload).await.map_err(into_transport)?;

    match connection.next().await {
        Some(Ok(response)) => Ok(response),
        Some(Err(e)) => Err(into_transport(e)),
        None => Err(Error::transport("peer closed the connection")),
    }
}

/// Folds raw I/O errors into the transport kind.
fn into_transport(error: Error) -> Error {
    match error {
        Error::Io(e) => Error::transport(e.to_string()),
        other => other,
    }
}
