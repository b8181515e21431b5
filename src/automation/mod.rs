//! Host automation client.
//!
//! The automation channel only *signals* the loaded extension; payloads
//! travel over the [`transport`](crate::transport).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `handle` | [`AutomationHandle`] / [`HostLauncher`] seams and [`HostFault`] |
//! | `retry` | Fault classification and [`RetryPolicy`] |
//! | `client` | [`AutomationClient`] command wrappers |

// ============================================================================
// Submodules
// ============================================================================

/// Retried command dispatch.
pub mod client;

/// Automation seams and host faults.
pub mod handle;

/// Retry policy.
pub mod retry;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::AutomationClient;
pub use handle::{AutomationHandle, HostFault, HostLauncher};
pub use retry::{FaultClass, RetryPolicy, classify};
