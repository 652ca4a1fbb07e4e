//! Message types.
//!
//! This module defines every message the relay decodes or produces.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Channel |
//! |--------------|-----------|---------|
//! | [`InboundEvent`] | Server → Relay | Streaming connection |
//! | [`OutboundRequest`] | Relay → Server | Request channel |
//! | [`ExtensionMessage`] | UI → Relay | Extension messaging |
//! | [`ConsumerMessage`] | Relay → UI | Extension messaging |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Stream events and conversation items |
//! | `message` | UI-facing messages |
//! | `request` | Outbound requests and results |

// ============================================================================
// Submodules
// ============================================================================

/// Stream events and conversation items.
pub mod event;

/// UI-facing message contract.
pub mod message;

/// Outbound requests and their results.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{
    ConversationData, ConversationItem, EventKind, FileRef, InboundEvent, ItemKind, Timestamp,
};
pub use message::{ConsumerMessage, ExtensionMessage, ExtensionResponse, WireFile};
pub use request::{
    DownloadReceipt, FilePayload, OutboundRequest, OutboundResult, RequestOutcome, SendReceipt,
    VideoInfo,
};
