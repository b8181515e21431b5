//! Listener waiting for the extension to connect back.
//!
//! # Connection Flow
//!
//! 1. The worker binds a TCP listener to the configured address
//! 2. The bound address is handed back to the caller
//! 3. The caller asks the extension (over automation) to connect back
//! 4. The worker accepts exactly one peer and drops the listener
//!
//! A peer that does not show up before the deadline fails the accept with
//! [`Error::ConnectionTimeout`].

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::rendezvous::Slot;

// ============================================================================
// PendingAccept
// ============================================================================

/// A listener that is bound but not yet connected.
///
/// Owned by the transport worker between `open` and the first accepted
/// connection.
pub(crate) struct PendingAccept {
    /// TCP listener for the single incoming connection.
    listener: TcpListener,
    /// Address the listener is bound to.
    local_addr: SocketAddr,
    /// When to give up waiting.
    deadline: Instant,
    /// How long the wait was allowed, for the error message.
    timeout: Duration,
    /// Caller waiting for the connection.
    reply: Slot<()>,
}

impl PendingAccept {
    /// Binds a listener to `addr`. Port `0` picks a free port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if binding fails.
    pub(crate) async fn bind(addr: SocketAddr, timeout: Duration, reply: Slot<()>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::transport(format!("cannot listen on {addr}: {e}")))?;
        let local_addr = listener.local_addr()?;

        info!(%local_addr, "Listener bound");

        Ok(Self {
            listener,
            local_addr,
            deadline: Instant::now() + timeout,
            timeout,
            reply,
        })
    }

    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub(crate) const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for one peer until the deadline.
    ///
    /// Cancel-safe: dropping the future leaves the listener usable.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the deadline passes first
    /// - [`Error::Transport`] if `accept` fails
    pub(crate) async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = timeout_at(self.deadline, self.listener.accept())
            .await
            .map_err(|_| Error::connection_timeout(duration_ms(self.timeout)))?
            .map_err(|e| Error::transport(format!("accept failed: {e}")))?;

        debug!(%peer, "TCP connection accepted");
        Ok((stream, peer))
    }

    /// Resolves the waiting caller and releases the listener.
    pub(crate) fn finish(self, result: Result<()>) {
        let _ = self.reply.send(result);
    }
}

/// Saturating conversion for error messages.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};

    use crate::transport::rendezvous::Rendezvous;

    fn loopback() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[tokio::test]
    async fn test_bind_random_port() {
        let (slot, _rendezvous) = Rendezvous::channel();
        let pending = PendingAccept::bind(loopback(), Duration::from_secs(1), slot)
            .await
            .expect("bind should succeed");

        assert!(pending.local_addr().port() > 0);
        assert!(pending.local_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_accept_one_peer() {
        let (slot, rendezvous) = Rendezvous::channel();
        let pending = PendingAccept::bind(loopback(), Duration::from_secs(5), slot)
            .await
            .expect("bind");
        let addr = pending.local_addr();

        let peer = tokio::spawn(async move { TcpStream::connect(addr).await });
        let (_stream, _peer_addr) = pending.accept().await.expect("accept");
        pending.finish(Ok(()));

        assert!(peer.await.expect("join").is_ok());
        tokio::task::spawn_blocking(move || rendezvous.wait())
            .await
            .expect("join")
            .expect("resolved");
    }

    #[tokio::test]
    async fn test_accept_times_out() {
        let (slot, _rendezvous) = Rendezvous::channel();
        let pending = PendingAccept::bind(loopback(), Duration::from_millis(20), slot)
            .await
            .expect("bind");

        let err = pending.accept().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionTimeout { timeout_ms: 20 }));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_transport_error() {
        let (slot, _r1) = Rendezvous::channel();
        let first = PendingAccept::bind(loopback(), Duration::from_secs(1), slot)
            .await
            .expect("bind");

        let (slot, _r2) = Rendezvous::channel();
        let err = PendingAccept::bind(first.local_addr(), Duration::from_secs(1), slot)
            .await
            .err()
            .expect("second bind must fail");
        assert!(err.is_transport_error());
    }
}
