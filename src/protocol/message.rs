//! Messages exchanged with UI surfaces.
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`ExtensionMessage`] | UI → Relay | Interest registration and action requests |
//! | [`ExtensionResponse`] | Relay → UI | Single reply to one [`ExtensionMessage`] |
//! | [`ConsumerMessage`] | Relay → UI | Pushed status changes and stream events |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Settings;
use crate::error::Error;

use super::event::InboundEvent;
use super::request::VideoInfo;

// ============================================================================
// ConsumerMessage
// ============================================================================

/// A message pushed to every registered consumer.
///
/// # Format
///
/// ```json
/// { "type": "websocket-status", "connected": false, "errorMessage": "..." }
/// { "type": "websocket-data", "data": { "type": "update", "data": { "items": [] } } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConsumerMessage {
    /// Connection status transition.
    #[serde(rename = "websocket-status")]
    StatusChanged {
        /// Whether the stream is connected.
        connected: bool,
        /// Why the stream disconnected.
        #[serde(
            rename = "errorMessage",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        reason: Option<String>,
    },

    /// Event received from the stream.
    #[serde(rename = "websocket-data")]
    EventReceived {
        /// The event, in its wire shape.
        data: InboundEvent,
    },
}

impl ConsumerMessage {
    /// Creates a `connected` status.
    #[inline]
    #[must_use]
    pub fn connected() -> Self {
        Self::StatusChanged {
            connected: true,
            reason: None,
        }
    }

    /// Creates a `disconnected` status.
    #[inline]
    #[must_use]
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self::StatusChanged {
            connected: false,
            reason: Some(reason.into()),
        }
    }

    /// Wraps a stream event.
    #[inline]
    #[must_use]
    pub fn event(event: InboundEvent) -> Self {
        Self::EventReceived { data: event }
    }

    /// Returns `true` if this is a `connected` status.
    #[inline]
    #[must_use]
    pub fn is_connected_status(&self) -> bool {
        matches!(self, Self::StatusChanged { connected: true, .. })
    }
}

// ============================================================================
// ExtensionMessage
// ============================================================================

/// File attached to a `send-file` message; contents are base64.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFile {
    /// File name.
    pub name: String,
    /// MIME type, if known.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Base64-encoded contents.
    pub data: String,
}

/// A message sent by a UI surface to the background relay.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ExtensionMessage {
    /// Register interest in live updates.
    ConnectWebsocket,
    /// Deregister interest.
    DisconnectWebsocket,
    /// Fetch the conversation over the request channel.
    FetchConversation,
    /// Post a text message.
    SendMessage {
        /// Message text.
        text: String,
    },
    /// Upload a file.
    SendFile {
        /// The file.
        file: WireFile,
    },
    /// Download an uploaded file.
    #[serde(rename_all = "camelCase")]
    DownloadFile {
        /// Server-side unique name.
        unique_filename: String,
        /// Name to save under.
        display_name: String,
    },
    /// Report video playback progress.
    #[serde(rename_all = "camelCase")]
    YoutubeVideoInfo {
        /// Playback details.
        video_info: VideoInfo,
    },
    /// Read the current settings.
    GetSettings,
    /// Read the resolved server base URL.
    GetServerUrl,
}

// ============================================================================
// ExtensionResponse
// ============================================================================

/// Reply to a single [`ExtensionMessage`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionResponse {
    /// Whether the message was handled successfully.
    pub success: bool,

    /// Request payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Settings, for `get-settings`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,

    /// Base URL, for `get-server-url`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,

    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Failure kind (`network`, `status`, `decode`, `invalid`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl ExtensionResponse {
    /// Plain success.
    #[inline]
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Success carrying a payload.
    #[must_use]
    pub fn with_data(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Self::default()
        }
    }

    /// Success carrying settings.
    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            success: true,
            settings: Some(settings),
            ..Self::default()
        }
    }

    /// Success carrying the server base URL.
    #[must_use]
    pub fn with_server_url(server_url: impl Into<String>) -> Self {
        Self {
            success: true,
            server_url: Some(server_url.into()),
            ..Self::default()
        }
    }

    /// Failure built from an error.
    #[must_use]
    pub fn failure(error: &Error) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            ..Self::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
