//! Retry policy for host automation calls.
//!
//! Transient faults are absorbed by retrying with a fixed delay; everything
//! else becomes an [`Error::Automation`] immediately.
//!
//! | Fault | Class |
//! |-------|-------|
//! | [`HostFault::NotReady`] | Transient |
//! | Dispatch with [`RPC_E_CALL_REJECTED`] | Transient |
//! | Dispatch with [`DISP_E_EXCEPTION`] / [`E_NO_DOCUMENT`] | Transient |
//! | Anything else | Fatal |
//!
//! [`RPC_E_CALL_REJECTED`]: super::handle::RPC_E_CALL_REJECTED
//! [`DISP_E_EXCEPTION`]: super::handle::DISP_E_EXCEPTION
//! [`E_NO_DOCUMENT`]: super::handle::E_NO_DOCUMENT

// ============================================================================
// Imports
// ============================================================================

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::handle::HostFault;

// ============================================================================
// Constants
// ============================================================================

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 20;

// ============================================================================
// Classification
// ============================================================================

/// Whether a fault is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// The host is temporarily unable to serve the call.
    Transient,
    /// Retrying will not help.
    Fatal,
}

/// Classifies a host fault.
#[must_use]
pub fn classify(fault: &HostFault) -> FaultClass {
    match fault {
        HostFault::NotReady { .. } => FaultClass::Transient,
        f if f.is_call_rejected() || f.is_no_document() => FaultClass::Transient,
        _ => FaultClass::Fatal,
    }
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Fixed-delay retry policy.
///
/// An operation gets at most `max_retries + 1` attempts. The delay is slept
/// between attempts, never before the first or after the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between attempts.
    pub delay: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[inline]
    #[must_use]
    pub const fn new(delay: Duration, max_retries: u32) -> Self {
        Self { delay, max_retries }
    }

    /// Total number of attempts this policy allows.
    #[inline]
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Runs `op` with [`classify`] and a real thread sleep.
    ///
    /// # Errors
    ///
    /// See [`run_with`](Self::run_with).
    pub fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, HostFault>,
    {
        self.run_with(op, classify, thread::sleep)
    }

    /// Runs `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// # Errors
    ///
    /// - [`Error::Automation`] wrapping the fault on a fatal classification
    /// - [`Error::Automation`] wrapping the last fault on exhaustion
    pub fn run_with<T, F, C, S>(&self, mut op: F, classify: C, mut sleep: S) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, HostFault>,
        C: Fn(&HostFault) -> FaultClass,
        S: FnMut(Duration),
    {
        let attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            let fault = match op() {
                Ok(value) => return Ok(value),
                Err(fault) => fault,
            };

            if classify(&fault) == FaultClass::Fatal {
                return Err(Error::automation_fault("automation call failed", fault));
            }

            if attempt >= attempts {
                warn!(attempts, error = %fault, "Host stayed busy, giving up");
                return Err(Error::automation_fault(
                    format!("host still busy after {attempts} attempts"),
                    fault,
                ));
            }

            debug!(attempt, error = %fault, "Transient host fault, retrying");
            sleep(self.delay);
            attempt += 1;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
