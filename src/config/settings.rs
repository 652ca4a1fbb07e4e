//! Persisted extension settings.
//!
//! Settings live under the `orionSettings` key of the extension's local
//! storage. The relay only reads them; the settings form owns writes.
//!
//! # Format
//!
//! ```json
//! {
//!   "serverHost": "192.168.2.101",
//!   "serverPort": 8000,
//!   "resizableSidebar": true
//! }
//! ```
//!
//! Every field falls back to its default independently when absent or
//! malformed, so reading settings never fails.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

// ============================================================================
// Constants
// ============================================================================

/// Storage key holding the settings object.
pub const SETTINGS_KEY: &str = "orionSettings";

/// Companion server host used when none is configured.
pub const DEFAULT_SERVER_HOST: &str = "192.168.2.101";

/// Companion server port used when none is configured.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Sidebar resize flag used when none is configured.
pub const DEFAULT_RESIZABLE_SIDEBAR: bool = true;

// ============================================================================
// Settings
// ============================================================================

/// Resolved extension settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Companion server host name or address.
    pub server_host: String,

    /// Companion server port (1-65535).
    pub server_port: u16,

    /// Whether the sidebar may be resized by dragging.
    pub resizable_sidebar: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            resizable_sidebar: DEFAULT_RESIZABLE_SIDEBAR,
        }
    }
}

impl Settings {
    /// Builds settings from a raw persisted value, falling back per field.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(value) = value.filter(|v| v.is_object()) else {
            return Self::default();
        };

        let server_host = value
            .get("serverHost")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|host| is_usable_host(host))
            .map_or_else(|| DEFAULT_SERVER_HOST.to_string(), str::to_string);

        let server_port = value
            .get("serverPort")
            .and_then(parse_port)
            .unwrap_or(DEFAULT_SERVER_PORT);

        let resizable_sidebar = value
            .get("resizableSidebar")
            .and_then(Value::as_bool)
            .unwrap_or(DEFAULT_RESIZABLE_SIDEBAR);

        Self {
            server_host,
            server_port,
            resizable_sidebar,
        }
    }

    /// Serializes settings into the persisted JSON shape.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "serverHost": self.server_host,
            "serverPort": self.server_port,
            "resizableSidebar": self.resizable_sidebar,
        })
    }
}

/// Accepts a port given as a number or a numeric string.
fn parse_port(value: &Value) -> Option<u16> {
    let port = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };

    u16::try_from(port).ok().filter(|p| *p != 0)
}

/// A host is usable when it can form an `http://host:port` URL.
fn is_usable_host(host: &str) -> bool {
    !host.is_empty()
        && !host.contains(['/', '?', '#', '@'])
        && Url::parse(&format!("http://{host}:{DEFAULT_SERVER_PORT}"))
            .is_ok_and(|url| url.host_str().is_some())
}

// ============================================================================
// SettingsStore
// ============================================================================

/// Read access to the persisted settings object.
///
/// Implementations return the raw value stored under [`SETTINGS_KEY`],
/// or `None` when nothing is stored or the storage cannot be read.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Loads the raw settings value.
    async fn load(&self) -> Option<Value>;
}

// ============================================================================
// MemorySettings
// ============================================================================

/// In-memory settings store, changeable at runtime.
#[derive(Debug, Default)]
pub struct MemorySettings {
    value: RwLock<Option<Value>>,
}

impl MemorySettings {
    /// Creates an empty store (defaults apply).
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given raw value.
    #[must_use]
    pub fn with_value(value: Value) -> Self {
        Self {
            value: RwLock::new(Some(value)),
        }
    }

    /// Replaces the stored value.
    pub fn set(&self, value: Value) {
        *self.value.write() = Some(value);
    }

    /// Stores a typed settings object.
    pub fn set_settings(&self, settings: &Settings) {
        self.set(settings.to_value());
    }

    /// Removes the stored value.
    pub fn clear(&self) {
        *self.value.write() = None;
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn load(&self) -> Option<Value> {
        self.value.read().clone()
    }
}

// ============================================================================
// FileSettings
// ============================================================================

/// Settings stored in a JSON file containing the [`SETTINGS_KEY`] entry.
///
/// The file is re-read on every load, so edits take effect on the next
/// connection attempt or request.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    /// Creates a store backed by the given file.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for FileSettings {
    async fn load(&self) -> Option<Value> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Settings file unreadable");
                return None;
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(mut root) => root.get_mut(SETTINGS_KEY).map(Value::take),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Settings file is not valid JSON");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
