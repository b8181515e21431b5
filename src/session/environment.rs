//! Host version catalog and installation discovery.
//!
//! # Catalog
//!
//! | Release | Program id | Release key |
//! |---------|------------|-------------|
//! | 2010 | `AutoCAD.Application.18` | `R18.0` |
//! | ... | ... | ... |
//! | 2023 | `AutoCAD.Application.24.2` | `R24.2` |
//!
//! The extension binary ships per release under
//! `<extension dir>/<release>/SacadMgd.dll`. A release without its own build
//! falls back to the newest older build.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Alias resolving to the newest installed release.
pub const LATEST: &str = "LATEST";

/// File name of the extension binary.
pub const EXTENSION_FILE_NAME: &str = "SacadMgd.dll";

/// Supported releases, oldest first.
static CATALOG: [HostVersion; 14] = [
    HostVersion::new("2010", "AutoCAD.Application.18", "R18.0"),
    HostVersion::new("2011", "AutoCAD.Application.18.1", "R18.1"),
    HostVersion::new("2012", "AutoCAD.Application.18.2", "R18.2"),
    HostVersion::new("2013", "AutoCAD.Application.19", "R19.0"),
    HostVersion::new("2014", "AutoCAD.Application.19.1", "R19.1"),
    HostVersion::new("2015", "AutoCAD.Application.20", "R20.0"),
    HostVersion::new("2016", "AutoCAD.Application.20.1", "R20.1"),
    HostVersion::new("2017", "AutoCAD.Application.21", "R21.0"),
    HostVersion::new("2018", "AutoCAD.Application.22", "R22.0"),
    HostVersion::new("2019", "AutoCAD.Application.23", "R23.0"),
    HostVersion::new("2020", "AutoCAD.Application.23.1", "R23.1"),
    HostVersion::new("2021", "AutoCAD.Application.24", "R24.0"),
    HostVersion::new("2022", "AutoCAD.Application.24.1", "R24.1"),
    HostVersion::new("2023", "AutoCAD.Application.24.2", "R24.2"),
];

// ============================================================================
// HostVersion
// ============================================================================

/// One supported host release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostVersion {
    name: &'static str,
    prog_id: &'static str,
    release_key: &'static str,
}

impl HostVersion {
    const fn new(name: &'static str, prog_id: &'static str, release_key: &'static str) -> Self {
        Self {
            name,
            prog_id,
            release_key,
        }
    }

    /// Every supported release, oldest first.
    #[inline]
    #[must_use]
    pub fn catalog() -> &'static [HostVersion] {
        &CATALOG
    }

    /// Looks up a release by name (e.g. `"2021"`).
    #[must_use]
    pub fn lookup(name: &str) -> Option<&'static HostVersion> {
        CATALOG.iter().find(|v| v.name == name)
    }

    /// Looks up a release by its registry key (e.g. `"R24.0"`).
    #[must_use]
    pub fn from_release_key(key: &str) -> Option<&'static HostVersion> {
        CATALOG.iter().find(|v| v.release_key == key)
    }

    /// Returns `true` if `name` is a supported release.
    #[inline]
    #[must_use]
    pub fn is_supported(name: &str) -> bool {
        Self::lookup(name).is_some()
    }

    /// Release name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Automation program id.
    #[inline]
    #[must_use]
    pub const fn prog_id(&self) -> &'static str {
        self.prog_id
    }

    /// Registry release key.
    #[inline]
    #[must_use]
    pub const fn release_key(&self) -> &'static str {
        self.release_key
    }

    /// Position in the catalog; newer releases sort higher.
    fn rank(&self) -> usize {
        CATALOG
            .iter()
            .position(|v| v.name == self.name)
            .unwrap_or_default()
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// Installations
// ============================================================================

/// Source of installed host releases.
pub trait Installations: Send + Sync {
    /// Returns installed, supported releases, oldest first.
    ///
    /// # Errors
    ///
    /// Implementation-defined discovery failures.
    fn installed_versions(&self) -> Result<Vec<&'static HostVersion>>;
}

/// A fixed set of installed releases.
#[derive(Debug, Clone, Default)]
pub struct StaticInstallations {
    versions: Vec<&'static HostVersion>,
}

impl StaticInstallations {
    /// Builds from release names. Unknown names are ignored.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_versions(names.into_iter().filter_map(|n| HostVersion::lookup(n.as_ref())))
    }

    /// Builds from registry release keys (`R24.0`, ...). Unknown keys are ignored.
    #[must_use]
    pub fn from_release_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_versions(
            keys.into_iter()
                .filter_map(|k| HostVersion::from_release_key(k.as_ref())),
        )
    }

    fn from_versions(versions: impl Iterator<Item = &'static HostVersion>) -> Self {
        let mut versions: Vec<_> = versions.collect();
        versions.sort_by_key(|v| v.rank());
        versions.dedup();
        Self { versions }
    }
}

impl Installations for StaticInstallations {
    fn installed_versions(&self) -> Result<Vec<&'static HostVersion>> {
        Ok(self.versions.clone())
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolves a requested release name against what is installed.
///
/// # Errors
///
/// - [`Error::NotFound`] if nothing is installed
/// - [`Error::NotSupported`] if the name is not in the catalog
/// - [`Error::NotFound`] if the release is supported but not installed
pub fn resolve_version(
    requested: &str,
    installations: &dyn Installations,
) -> Result<&'static HostVersion> {
    let installed = installations.installed_versions()?;

    let Some(&newest) = installed.last() else {
        return Err(Error::not_found("no host installation found"));
    };

    if requested == LATEST {
        debug!(version = %newest, "Resolved latest host release");
        return Ok(newest);
    }

    let version = HostVersion::lookup(requested)
        .ok_or_else(|| Error::not_supported(format!("host release {requested} is not supported")))?;

    if !installed.contains(&version) {
        return Err(Error::not_found(format!("host release {requested} is not installed")));
    }

    Ok(version)
}

/// Finds the extension binary for `version`, falling back to older builds.
#[must_use]
pub fn find_extension(dir: &Path, version: &HostVersion) -> Option<PathBuf> {
    CATALOG[..=version.rank()]
        .iter()
        .rev()
        .map(|v| dir.join(v.name).join(EXTENSION_FILE_NAME))
        .find(|path| path.is_file())
}

// ============================================================================
// Tests
// ============================================================================
