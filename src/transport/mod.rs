//! TCP transport between the bridge and the loaded extension.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  Caller thread   │                              │  Host process   │
//! │   Transport ─────┼─ commands ─┐                 │                 │
//! │   (blocking)     │            ▼                 │   Extension     │
//! │                  │   ┌─────────────────┐  TCP   │   (TCP client)  │
//! │   Rendezvous ◄───┼───│  Worker thread  │◄──────►│                 │
//! │                  │   │  (tokio loop)   │ frames │                 │
//! └──────────────────┘   └─────────────────┘        └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Transport::new` - Start the worker thread
//! 2. `Transport::open` - Bind, run the listening callback, accept one peer
//! 3. `Transport::submit` / `request` - One frame out, one frame back
//! 4. `Transport::disconnect` - Drop the peer; `open` may run again
//! 5. `Transport::close` - Stop the worker; terminal
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Blocking [`Transport`] API |
//! | `connection` | Worker event loop |
//! | `server` | Listener waiting for the peer |
//! | `rendezvous` | Single-slot hand-off to blocked callers |

// ============================================================================
// Submodules
// ============================================================================

/// Worker event loop.
mod connection;

/// Blocking transport API.
pub mod core;

/// Single-slot hand-off.
pub mod rendezvous;

/// Listener waiting for the peer.
mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{DEFAULT_CONNECT_TIMEOUT, PendingRequest, Transport, TransportConfig};
pub use rendezvous::Rendezvous;
