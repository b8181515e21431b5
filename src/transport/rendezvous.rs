//! Single-slot hand-off from the transport worker to a blocked caller.
//!
//! The worker holds the [`Slot`] and fills it exactly once; the caller
//! blocks on the [`Rendezvous`]. Deadlines are enforced by the worker, which
//! owns the timer, so an expired wait resolves the slot with a timeout error
//! instead of leaving the caller hanging.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::oneshot;

use crate::error::Result;

// ============================================================================
// Types
// ============================================================================

/// Worker-side half of a rendezvous.
pub(crate) type Slot<T> = oneshot::Sender<Result<T>>;

// ============================================================================
// Rendezvous
// ============================================================================

/// Caller-side half of a single-slot hand-off.
#[derive(Debug)]
pub struct Rendezvous<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Rendezvous<T> {
    /// Creates a connected slot/rendezvous pair.
    pub(crate) fn channel() -> (Slot<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Blocks the calling thread until the worker fills the slot.
    ///
    /// Must not be called from inside an async runtime.
    ///
    /// # Errors
    ///
    /// - Whatever error the worker delivered
    /// - [`Error::ChannelClosed`](crate::Error::ChannelClosed) if the worker
    ///   dropped the slot (shutdown or disconnect)
    pub fn wait(self) -> Result<T> {
        self.rx.blocking_recv()?
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    use crate::error::Error;

    #[test]
    fn test_value_crosses_threads() {
        let (slot, rendezvous) = Rendezvous::channel();
        let worker = thread::spawn(move || {
            let _ = slot.send(Ok(42u32));
        });

        assert_eq!(rendezvous.wait().expect("value"), 42);
        worker.join().expect("join");
    }

    #[test]
    fn test_worker_error_is_delivered() {
        let (slot, rendezvous) = Rendezvous::<()>::channel();
        let _ = slot.send(Err(Error::connection_timeout(5)));

        let err = rendezvous.wait().unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_dropped_slot_is_transport_error() {
        let (slot, rendezvous) = Rendezvous::<()>::channel();
        drop(slot);

        let err = rendezvous.wait().unwrap_err();
        assert!(matches!(err, Error::ChannelClosed(_)));
        assert!(err.is_transport_error());
    }
}
