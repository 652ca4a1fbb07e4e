//! Builder pattern for relay configuration.
//!
//! Provides a fluent API for configuring and starting a [`Relay`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use orion_relay::{ChannelHub, FileSettings, ReconnectPolicy, Relay};
//!
//! # async fn example() -> orion_relay::Result<()> {
//! let relay = Relay::builder()
//!     .settings(Arc::new(FileSettings::new("settings.json")))
//!     .channel(Arc::new(ChannelHub::new()))
//!     .reconnect_policy(ReconnectPolicy::fixed(Duration::from_secs(3)))
//!     .download_dir("./downloads")
//!     .spawn()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigResolver, MemorySettings, SettingsStore};
use crate::error::{Error, Result};
use crate::router::{DEFAULT_REQUEST_TIMEOUT, RequestRouter};

use super::core::Relay;
use super::dispatcher::{ConsumerChannel, Dispatcher};
use super::reconnect::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Directory name under the system temp dir used when none is set.
const DEFAULT_DOWNLOAD_DIR: &str = "orion-downloads";

// ============================================================================
// RelayBuilder
// ============================================================================

/// Builder for configuring a [`Relay`].
///
/// Use [`Relay::builder()`] to create a new builder.
#[derive(Clone)]
pub struct RelayBuilder {
    /// Persisted settings; defaults apply when unset.
    settings: Option<Arc<dyn SettingsStore>>,
    /// Delivery path to consumers.
    channel: Option<Arc<dyn ConsumerChannel>>,
    /// Reconnection timing.
    policy: ReconnectPolicy,
    /// Per-request timeout.
    request_timeout: Duration,
    /// Where downloads are saved.
    download_dir: Option<PathBuf>,
}

impl fmt::Debug for RelayBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayBuilder")
            .field("has_settings", &self.settings.is_some())
            .field("has_channel", &self.channel.is_some())
            .field("policy", &self.policy)
            .field("request_timeout", &self.request_timeout)
            .field("download_dir", &self.download_dir)
            .finish()
    }
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self {
            settings: None,
            channel: None,
            policy: ReconnectPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            download_dir: None,
        }
    }
}

// ============================================================================
// RelayBuilder Implementation
// ============================================================================

impl RelayBuilder {
    /// Creates a builder with default policy and timeout.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the settings store read before every attempt and request.
    #[inline]
    #[must_use]
    pub fn settings(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(store);
        self
    }

    /// Sets the channel consumers are reached through.
    #[inline]
    #[must_use]
    pub fn channel(mut self, channel: Arc<dyn ConsumerChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the per-request timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the download directory.
    #[inline]
    #[must_use]
    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// Validates the configuration and starts the relay.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no channel was set
    /// - [`Error::Config`] if the timeout or policy is zero
    /// - [`Error::Config`] if the HTTP client cannot be built
    pub fn spawn(self) -> Result<Relay> {
        let channel = self.validate_channel()?;
        self.validate_timing()?;

        let store = self
            .settings
            .unwrap_or_else(|| Arc::new(MemorySettings::new()));
        let resolver = ConfigResolver::new(store);
        let download_dir = self
            .download_dir
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DOWNLOAD_DIR));

        let router = RequestRouter::new(resolver.clone(), self.request_timeout, download_dir)?;

        Ok(Relay::spawn(
            resolver,
            Dispatcher::new(channel),
            self.policy,
            router,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl RelayBuilder {
    fn validate_channel(&self) -> Result<Arc<dyn ConsumerChannel>> {
        self.channel.clone().ok_or_else(|| {
            Error::config(
                "Consumer channel is required. Use .channel() to set it.\n\
                 Example: Relay::builder().channel(Arc::new(ChannelHub::new()))",
            )
        })
    }

    fn validate_timing(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(Error::config("Request timeout must be greater than zero"));
        }

        let first_delay = self.policy.delay_for(1);
        if first_delay.is_zero() {
            return Err(Error::config("Reconnect delay must be greater than zero"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
