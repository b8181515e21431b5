//! Session configuration.
//!
//! # Defaults
//!
//! | Option | Default |
//! |--------|---------|
//! | `version` | `LATEST` |
//! | `host` | `127.0.0.1` |
//! | `port` | `48652` |
//! | `netload` | `true` |
//! | `connect_timeout` | 30 s |
//! | `request_timeout` | none |
//! | `retry` | 100 ms delay, 20 retries |

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::automation::RetryPolicy;
use crate::protocol::DEFAULT_MAX_FRAME_BYTES;
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, TransportConfig};

use super::environment::LATEST;

// ============================================================================
// Constants
// ============================================================================

/// Default listener address.
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Default listener port.
pub const DEFAULT_PORT: u16 = 48652;

// ============================================================================
// SessionOptions
// ============================================================================

/// Everything a session needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Requested host release name, or [`LATEST`].
    pub version: String,

    /// Address the listener binds to and the extension connects to.
    pub host: IpAddr,

    /// Listener port. `0` picks a free port on every open.
    pub port: u16,

    /// Load the extension during `open`.
    ///
    /// Reloading resets host-side selection state, so callers that know the
    /// extension is already loaded can skip it.
    pub netload: bool,

    /// How long `open` waits for the extension to connect back.
    pub connect_timeout: Duration,

    /// Bound on one request round trip. `None` waits forever.
    pub request_timeout: Option<Duration>,

    /// Largest response frame accepted.
    pub max_frame_bytes: usize,

    /// Retry policy for automation calls.
    pub retry: RetryPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            version: LATEST.to_string(),
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            netload: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            retry: RetryPolicy::default(),
        }
    }
}

impl SessionOptions {
    /// Listener endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Transport settings derived from these options.
    #[inline]
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            max_frame_bytes: self.max_frame_bytes,
        }
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error message describing the first invalid option.
    pub fn validate(&self) -> Result<(), String> {
        if self.version.trim().is_empty() {
            return Err("Host version must not be empty".to_string());
        }
        if self.connect_timeout.is_zero() {
            return Err("Connection timeout must be greater than zero".to_string());
        }
        if let Some(timeout) = self.request_timeout
            && timeout.is_zero()
        {
            return Err("Request timeout must be greater than zero".to_string());
        }
        if self.max_frame_bytes == 0 {
            return Err("Frame size limit must be greater than zero".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
