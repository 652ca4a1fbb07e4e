//! Error types for the relay.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use orion_relay::{OutboundRequest, Result};
//!
//! async fn example(relay: &Relay) -> Result<()> {
//!     let outcome = relay.submit(OutboundRequest::send_text("hello")).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::RelayStopped`] |
//! | Protocol | [`Error::Protocol`], [`Error::InvalidArgument`] |
//! | Request | [`Error::Network`], [`Error::HttpStatus`], [`Error::Decode`] |
//! | Delivery | [`Error::ConsumerGone`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |
//!
//! Transport failures never cross the relay boundary: they become a
//! `disconnected` status for consumers plus a scheduled retry. Request
//! failures are returned to the single caller of `submit`.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::ConsumerId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Only produced by builders; endpoint resolution never fails.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Streaming connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Streaming connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The relay state machine has been shut down.
    #[error("Relay stopped")]
    RelayStopped,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed frame or message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Invalid argument in a UI message or request.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// The companion server could not be reached.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network failure.
        message: String,
    },

    /// The companion server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Status code returned.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    // ========================================================================
    // Delivery Errors
    // ========================================================================
    /// A consumer surface is gone (tab closed, sidebar unloaded).
    #[error("Consumer gone: {consumer_id}")]
    ConsumerGone {
        /// The unreachable consumer.
        consumer_id: ConsumerId,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URL construction error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an HTTP status error.
    #[inline]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a consumer gone error.
    #[inline]
    pub fn consumer_gone(consumer_id: ConsumerId) -> Self {
        Self::ConsumerGone { consumer_id }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a transport-level error.
    ///
    /// Transport errors are recovered by the reconnection policy.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::Protocol { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a request-level error.
    #[inline]
    #[must_use]
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::HttpStatus { .. } | Self::Decode { .. }
        )
    }

    /// Returns `true` if the companion server could not be reached.
    #[inline]
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Returns `true` if the server answered with a non-success status.
    #[inline]
    #[must_use]
    pub fn is_status_error(&self) -> bool {
        matches!(self, Self::HttpStatus { .. })
    }

    /// Returns `true` if a response could not be decoded.
    #[inline]
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Short machine-readable kind, used in UI responses.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::HttpStatus { .. } => "status",
            Self::Decode { .. } | Self::Json(_) => "decode",
            Self::InvalidArgument { .. } | Self::Config { .. } => "invalid",
            Self::RelayStopped => "stopped",
            Self::Io(_) => "io",
            _ => "transport",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
