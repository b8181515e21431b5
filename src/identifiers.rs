//! Type-safe identifiers.
//!
//! Newtype wrappers keep the session secret from being confused with the
//! arbitrary strings that travel through the automation channel.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use uuid::Uuid;

// ============================================================================
// SessionSecret
// ============================================================================

/// Per-session correlation token.
///
/// Generated once when a session is constructed and reused across reopens.
/// The extension keys its connections by this value, so several automated
/// host instances never cross-talk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionSecret(Uuid);

impl SessionSecret {
    /// Generates a fresh random secret.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[inline]
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_unique() {
        assert_ne!(SessionSecret::generate(), SessionSecret::generate());
    }

    #[test]
    fn test_secret_display_is_hyphenated() {
        let uuid = Uuid::nil();
        let secret = SessionSecret::from_uuid(uuid);
        assert_eq!(secret.to_string(), "00000000-0000-0000-0000-000000000000");
        assert_eq!(secret.as_uuid(), &uuid);
    }
}
