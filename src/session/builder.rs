//! Builder pattern for session configuration.
//!
//! # Example
//!
//! ```no_run
//! use cad_bridge::{Session, StaticInstallations};
//! # use cad_bridge::automation::{AutomationHandle, HostFault, HostLauncher};
//! # struct Launcher;
//! # impl HostLauncher for Launcher {
//! #     fn launch_or_attach(&self, _: &str) -> Result<Box<dyn AutomationHandle>, HostFault> {
//! #         Err(HostFault::other("no host"))
//! #     }
//! # }
//!
//! # fn example() -> cad_bridge::Result<()> {
//! let mut session = Session::builder()
//!     .version("2021")
//!     .extension_dir("./dll")
//!     .launcher(Launcher)
//!     .installations(StaticInstallations::new(["2021"]))
//!     .build()?;
//!
//! session.open()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::automation::{HostLauncher, RetryPolicy};
use crate::error::{Error, Result};

use super::core::Session;
use super::environment::Installations;
use super::options::SessionOptions;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct SessionBuilder {
    /// Plain options.
    options: SessionOptions,
    /// Folder holding one extension build per release.
    extension_dir: Option<PathBuf>,
    /// Host launcher.
    launcher: Option<Arc<dyn HostLauncher>>,
    /// Installed release discovery.
    installations: Option<Arc<dyn Installations>>,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("options", &self.options)
            .field("extension_dir", &self.extension_dir)
            .field("has_launcher", &self.launcher.is_some())
            .field("has_installations", &self.installations.is_some())
            .finish()
    }
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the requested host release (`"2021"`, or `LATEST`).
    #[inline]
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.options.version = version.into();
        self
    }

    /// Sets the listener address.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: IpAddr) -> Self {
        self.options.host = host;
        self
    }

    /// Sets the listener port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Enables or disables loading the extension during `open`.
    #[inline]
    #[must_use]
    pub fn netload(mut self, netload: bool) -> Self {
        self.options.netload = netload;
        self
    }

    /// Sets how long `open` waits for the extension to connect back.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Bounds every request round trip.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = Some(timeout);
        self
    }

    /// Sets the largest response frame accepted.
    #[inline]
    #[must_use]
    pub fn max_frame_bytes(mut self, limit: usize) -> Self {
        self.options.max_frame_bytes = limit;
        self
    }

    /// Sets the automation retry policy.
    #[inline]
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.options.retry = retry;
        self
    }

    /// Replaces all plain options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the folder holding `<release>/SacadMgd.dll` builds.
    #[inline]
    #[must_use]
    pub fn extension_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extension_dir = Some(dir.into());
        self
    }

    /// Sets the host launcher.
    #[inline]
    #[must_use]
    pub fn launcher(mut self, launcher: impl HostLauncher + 'static) -> Self {
        self.launcher = Some(Arc::new(launcher));
        self
    }

    /// Sets installed release discovery.
    #[inline]
    #[must_use]
    pub fn installations(mut self, installations: impl Installations + 'static) -> Self {
        self.installations = Some(Arc::new(installations));
        self
    }

    /// Builds the session with validation.
    ///
    /// Starts the transport worker; no socket is opened yet.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a collaborator is missing or an option is invalid
    /// - [`Error::Io`] if the transport worker cannot start
    pub fn build(self) -> Result<Session> {
        self.options.validate().map_err(Error::config)?;
        let extension_dir = self.validate_extension_dir()?;

        let launcher = self.launcher.ok_or_else(|| {
            Error::config(
                "A host launcher is required. Use .launcher() to set it.\n\
                 Example: Session::builder().launcher(MyLauncher)",
            )
        })?;

        let installations = self.installations.ok_or_else(|| {
            Error::config(
                "Installation discovery is required. Use .installations() to set it.\n\
                 Example: Session::builder().installations(StaticInstallations::new([\"2021\"]))",
            )
        })?;

        Session::new(self.options, extension_dir, launcher, installations)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionBuilder {
    /// Validates the extension folder configuration.
    fn validate_extension_dir(&self) -> Result<PathBuf> {
        let dir = self.extension_dir.clone().ok_or_else(|| {
            Error::config(
                "Extension directory is required. Use .extension_dir() to set it.\n\
                 Example: Session::builder().extension_dir(\"./dll\")",
            )
        })?;

        if !dir.is_dir() {
            return Err(Error::config(format!(
                "Extension directory not found at: {}",
                dir.display()
            )));
        }

        Ok(dir)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::automation::{AutomationHandle, HostFault};
    use crate::session::environment::StaticInstallations;

    struct NoHost;

    impl HostLauncher for NoHost {
        fn launch_or_attach(
            &self,
            _prog_id: &str,
        ) -> std::result::Result<Box<dyn AutomationHandle>, HostFault> {
            Err(HostFault::other("no host"))
        }
    }

    fn complete(dir: &TempDir) -> SessionBuilder {
        SessionBuilder::new()
            .extension_dir(dir.path())
            .launcher(NoHost)
            .installations(StaticInstallations::new(["2021"]))
    }

    #[test]
    fn test_new_creates_default_builder() {
        let builder = SessionBuilder::new();
        assert_eq!(builder.options, SessionOptions::default());
        assert!(builder.extension_dir.is_none());
        assert!(builder.launcher.is_none());
    }

    #[test]
    fn test_setters() {
        let builder = SessionBuilder::new()
            .version("2019")
            .port(0)
            .netload(false)
            .request_timeout(Duration::from_secs(3))
            .retry(RetryPolicy::new(Duration::from_millis(5), 2));

        assert_eq!(builder.options.version, "2019");
        assert_eq!(builder.options.port, 0);
        assert!(!builder.options.netload);
        assert_eq!(builder.options.request_timeout, Some(Duration::from_secs(3)));
        assert_eq!(builder.options.retry.max_retries, 2);
    }

    #[test]
    fn test_build_succeeds_when_complete() {
        let dir = TempDir::new().expect("tempdir");
        let session = complete(&dir).build().expect("build");
        assert_eq!(session.requested_version(), "LATEST");
        assert!(!session.is_connected());
    }

    #[test]
    fn test_build_fails_without_extension_dir() {
        let err = SessionBuilder::new()
            .launcher(NoHost)
            .installations(StaticInstallations::default())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Extension directory"));
    }

    #[test]
    fn test_build_fails_with_missing_extension_dir() {
        let err = SessionBuilder::new()
            .extension_dir("/nonexistent/sacad/dll")
            .launcher(NoHost)
            .installations(StaticInstallations::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_fails_without_launcher() {
        let dir = TempDir::new().expect("tempdir");
        let err = SessionBuilder::new()
            .extension_dir(dir.path())
            .installations(StaticInstallations::default())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("launcher"));
    }

    #[test]
    fn test_build_fails_without_installations() {
        let dir = TempDir::new().expect("tempdir");
        let err = SessionBuilder::new()
            .extension_dir(dir.path())
            .launcher(NoHost)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Installation"));
    }

    #[test]
    fn test_build_rejects_invalid_options() {
        let dir = TempDir::new().expect("tempdir");
        let err = complete(&dir).max_frame_bytes(0).build().unwrap_err();
        assert!(err.is_setup_error());
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = SessionBuilder::new().version("2018");
        let cloned = builder.clone();
        assert_eq!(builder.options, cloned.options);
    }
}
