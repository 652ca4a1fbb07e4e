//! Outbound request and result types.
//!
//! Requests travel over the point-to-point channel, never over the
//! streaming connection. Each produces exactly one [`OutboundResult`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};

use super::event::{ConversationItem, ItemKind};

// ============================================================================
// FilePayload
// ============================================================================

/// A file selected in the UI for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// Original file name.
    pub name: String,
    /// MIME type reported by the browser, if any.
    pub mime_type: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for FilePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePayload")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl FilePayload {
    /// Creates a payload from raw bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            bytes: bytes.into(),
        }
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Decodes a payload whose contents arrive base64-encoded from the UI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name is empty or the data
    /// is not valid base64.
    pub fn from_base64(name: impl Into<String>, mime_type: Option<String>, data: &str) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_argument("file name is empty"));
        }

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| Error::invalid_argument(format!("file data is not base64: {e}")))?;

        Ok(Self {
            name,
            mime_type: mime_type.filter(|m| !m.is_empty()),
            bytes,
        })
    }
}

// ============================================================================
// VideoInfo
// ============================================================================

/// Playback progress of a video on a visited page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    /// Video id.
    pub video_id: String,
    /// Video title.
    #[serde(default)]
    pub title: String,
    /// Current position in seconds.
    #[serde(default)]
    pub current_time: i64,
    /// Total duration in seconds.
    #[serde(default)]
    pub duration: i64,
    /// Link that resumes at the current position.
    #[serde(default)]
    pub timestamp_link: String,
    /// Whether the video is playing.
    #[serde(default)]
    pub is_playing: bool,
    /// Page URL.
    #[serde(default)]
    pub url: String,
}

// ============================================================================
// OutboundRequest
// ============================================================================

/// An action request forwarded to the companion server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundRequest {
    /// Post a text message.
    SendText(String),
    /// Upload a file.
    SendFile(FilePayload),
    /// Read the full conversation.
    FetchSnapshot,
    /// Fetch an uploaded file and save it locally.
    RequestDownload {
        /// Server-side unique file name.
        file_id: String,
        /// Name to save the file under.
        display_name: String,
    },
    /// Report video playback progress.
    ReportPlayback(VideoInfo),
}

impl OutboundRequest {
    /// Creates a text request.
    #[inline]
    #[must_use]
    pub fn send_text(text: impl Into<String>) -> Self {
        Self::SendText(text.into())
    }

    /// Creates a download request.
    #[inline]
    #[must_use]
    pub fn download(file_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::RequestDownload {
            file_id: file_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Creates a download request for a file item.
    ///
    /// Returns `None` for text items.
    #[must_use]
    pub fn download_item(item: &ConversationItem) -> Option<Self> {
        if item.kind != ItemKind::File {
            return None;
        }
        let file = item.file_ref()?;
        Some(Self::download(file.unique_filename, file.display_name))
    }

    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendText(_) => "send-text",
            Self::SendFile(_) => "send-file",
            Self::FetchSnapshot => "fetch-snapshot",
            Self::RequestDownload { .. } => "request-download",
            Self::ReportPlayback(_) => "report-playback",
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Acknowledgement returned by the server for posted items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Server status string, normally `success`.
    #[serde(default)]
    pub status: String,

    /// Id of the created item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Download URL of an uploaded file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A completed local download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReceipt {
    /// Where the file was saved.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes: u64,
}

/// Successful outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Current conversation items.
    Snapshot(Vec<ConversationItem>),
    /// Text or file accepted by the server.
    Sent(SendReceipt),
    /// File saved locally.
    Downloaded(DownloadReceipt),
    /// Playback report accepted.
    Acknowledged(SendReceipt),
}

impl RequestOutcome {
    /// Converts the outcome into the `data` field of a UI response.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Snapshot(items) => json!({ "items": items }),
            Self::Sent(receipt) | Self::Acknowledged(receipt) => {
                serde_json::to_value(receipt).unwrap_or(Value::Null)
            }
            Self::Downloaded(receipt) => json!({
                "path": receipt.path.display().to_string(),
                "bytes": receipt.bytes,
            }),
        }
    }
}

/// Result delivered to the single caller of a request.
pub type OutboundResult = Result<RequestOutcome>;

// ============================================================================
// Tests
// ============================================================================
