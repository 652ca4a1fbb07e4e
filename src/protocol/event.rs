//! Inbound stream events.
//!
//! Events are pushed by the companion server over the streaming
//! connection: a full snapshot right after connecting, then updates.
//!
//! # Format
//!
//! ```json
//! {
//!   "type": "initial",
//!   "data": {
//!     "items": [
//!       { "from": "PC", "type": "text", "content": "hi", "timestamp": 1000 }
//!     ]
//!   }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// ItemKind
// ============================================================================

/// Kind of conversation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Plain text message.
    Text,
    /// Uploaded file; content holds a [`FileRef`].
    File,
}

// ============================================================================
// Timestamp
// ============================================================================

/// Item timestamp as sent by the server.
///
/// Either epoch milliseconds or an RFC 3339 string; kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Milliseconds since the Unix epoch.
    Millis(i64),
    /// Textual timestamp.
    Text(String),
}

// ============================================================================
// ConversationItem
// ============================================================================

/// One entry of the mirrored conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Server-assigned id, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Origin of the item (`PC`, `mobile`, ...).
    pub from: String,

    /// Item kind.
    #[serde(rename = "type")]
    pub kind: ItemKind,

    /// Text body or file reference.
    pub content: String,

    /// When the item was created.
    pub timestamp: Timestamp,
}

impl ConversationItem {
    /// Creates a text item.
    #[must_use]
    pub fn text(from: impl Into<String>, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: None,
            from: from.into(),
            kind: ItemKind::Text,
            content: content.into(),
            timestamp: Timestamp::Millis(timestamp),
        }
    }

    /// Returns the file reference for file items.
    #[must_use]
    pub fn file_ref(&self) -> Option<FileRef> {
        match self.kind {
            ItemKind::File => Some(FileRef::parse(&self.content)),
            ItemKind::Text => None,
        }
    }
}

// ============================================================================
// FileRef
// ============================================================================

/// Reference to an uploaded file, encoded as `display|unique` in item content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Name shown to the user and used for downloads.
    pub display_name: String,
    /// Name the server stores the file under.
    pub unique_filename: String,
}

impl FileRef {
    /// Parses item content; content without a separator names both.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        match content.split_once('|') {
            Some((display, unique)) => Self {
                display_name: display.to_string(),
                unique_filename: unique.to_string(),
            },
            None => Self {
                display_name: content.to_string(),
                unique_filename: content.to_string(),
            },
        }
    }
}

// ============================================================================
// ConversationData
// ============================================================================

/// Items payload shared by stream events and the snapshot endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationData {
    /// Ordered conversation items.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<ConversationItem>,
}

/// The server encodes an empty conversation as `"items": null`.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<ConversationItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ConversationItem>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// InboundEvent
// ============================================================================

/// Event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Full snapshot, sent on connect.
    Initial,
    /// Incremental change.
    Update,
}

/// A decoded message from the streaming connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Snapshot or update.
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Conversation items carried by the event.
    pub data: ConversationData,
}

impl InboundEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(kind: EventKind, items: Vec<ConversationItem>) -> Self {
        Self {
            kind,
            data: ConversationData { items },
        }
    }

    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the frame is not a valid event.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::protocol(format!("malformed event: {e}")))
    }

    /// Returns the carried items.
    #[inline]
    #[must_use]
    pub fn items(&self) -> &[ConversationItem] {
        &self.data.items
    }

    /// Returns `true` for a full snapshot.
    #[inline]
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.kind == EventKind::Initial
    }
}

// ============================================================================
// Tests
// ============================================================================
