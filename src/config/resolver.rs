//! Endpoint resolution from persisted settings.
//!
//! The relay resolves a fresh [`Endpoint`] for every connection attempt
//! and every request, so settings changes apply to the next attempt
//! without touching an already-open connection.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::error::Result;

use super::settings::{Settings, SettingsStore};

// ============================================================================
// Constants
// ============================================================================

/// Path of the streaming endpoint on the companion server.
pub const STREAM_PATH: &str = "/pc/ws";

// ============================================================================
// Endpoint
// ============================================================================

/// Resolved host/port of the companion server.
///
/// Immutable for the lifetime of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the host.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the HTTP base address.
    ///
    /// Format: `http://{host}:{port}`
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Builds an HTTP URL for a server path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Url`] if the host cannot form a URL.
    pub fn http_url(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&self.base_url())?.join(path)?)
    }

    /// Builds the streaming WebSocket URL.
    ///
    /// Format: `ws://{host}:{port}/pc/ws`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Url`] if the host cannot form a URL.
    pub fn ws_url(&self) -> Result<Url> {
        let base = Url::parse(&format!("ws://{}:{}", self.host, self.port))?;
        Ok(base.join(STREAM_PATH)?)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<&Settings> for Endpoint {
    fn from(settings: &Settings) -> Self {
        Self::new(settings.server_host.clone(), settings.server_port)
    }
}

// ============================================================================
// ConfigResolver
// ============================================================================

/// Reads settings and produces endpoints.
///
/// Never fails: absent or malformed settings degrade to defaults.
#[derive(Clone)]
pub struct ConfigResolver {
    store: Arc<dyn SettingsStore>,
}

impl fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigResolver").finish_non_exhaustive()
    }
}

impl ConfigResolver {
    /// Creates a resolver over a settings store.
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Reads the current settings.
    pub async fn settings(&self) -> Settings {
        Settings::from_value(self.store.load().await.as_ref())
    }

    /// Resolves the current endpoint.
    pub async fn resolve(&self) -> Endpoint {
        Endpoint::from(&self.settings().await)
    }
}

// ============================================================================
// Tests
// ============================================================================
