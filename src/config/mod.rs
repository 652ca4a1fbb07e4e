//! Configuration resolution.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Settings`] | Persisted extension settings with per-field defaults |
//! | [`SettingsStore`] | Async read access to the persisted settings |
//! | [`MemorySettings`] | Runtime-changeable in-memory store |
//! | [`FileSettings`] | JSON file store |
//! | [`ConfigResolver`] | Produces an [`Endpoint`] per attempt |

// ============================================================================
// Submodules
// ============================================================================

/// Endpoint resolution.
pub mod resolver;

/// Persisted settings and stores.
pub mod settings;

// ============================================================================
// Re-exports
// ============================================================================

pub use resolver::{ConfigResolver, Endpoint};
pub use settings::{FileSettings, MemorySettings, SETTINGS_KEY, Settings, SettingsStore};
