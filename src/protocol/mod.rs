//! Wire protocol between the bridge and the loaded extension.
//!
//! Two channels carry one logical call:
//!
//! | Channel | Direction | Carries |
//! |---------|-----------|---------|
//! | Automation | Local → Host | Wake commands ([`HostCommand`]) |
//! | TCP | Local ↔ Extension | Length-prefixed frames ([`FrameCodec`]) |
//!
//! The automation command only tells the extension that a frame is waiting;
//! request and response payloads travel exclusively as frames.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Automation command text |
//! | `frame` | `<len>\n<payload>` framing |

// ============================================================================
// Submodules
// ============================================================================

/// Automation command definitions.
pub mod command;

/// Length-prefixed framing.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{HostCommand, Operation, build_command_text, escape_path};
pub use frame::{DEFAULT_MAX_FRAME_BYTES, FrameCodec, encode_frame};

// ============================================================================
// Constants
// ============================================================================

/// Handshake probe payload.
pub const PING: &str = "ping";

/// Expected handshake reply.
pub const PONG: &str = "pong";
