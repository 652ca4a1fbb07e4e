//! Point-to-point request channel.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RequestRouter`] | Forwards outbound requests over HTTP |
//! | `download` | Atomic local persistence of downloaded files |

// ============================================================================
// Submodules
// ============================================================================

/// HTTP request router.
pub mod client;

/// Local persistence of downloads.
pub mod download;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{DEFAULT_REQUEST_TIMEOUT, RequestRouter};
pub use download::sanitize_filename;
