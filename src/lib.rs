//! Orion Relay - one companion-server stream, many sidebar consumers.
//!
//! This library implements the background relay of the Orion sidebar
//! extension: it owns a single streaming connection to the desktop
//! companion server, keeps it alive across failures, and fans inbound
//! conversation events out to every interested sidebar instance.
//! Outbound actions travel over a separate request channel.
//!
//! # Architecture
//!
//! ```text
//!  sidebar tabs                 relay                    companion server
//! ┌────────────┐  register   ┌───────────┐   ws /pc/ws   ┌──────────────┐
//! │ ConsumerId ├────────────►│  Relay    │◄──────────────┤  stream      │
//! │            │◄────────────┤  (actor)  │               │              │
//! └────────────┘  fan-out    └─────┬─────┘               │              │
//!        │                         │ submit              │              │
//!        └────────────────────────►│ RequestRouter ─────►│  /pc/*  HTTP │
//!                                  └─────────────────────┴──────────────┘
//! ```
//!
//! Key design principles:
//!
//! - The connection exists exactly while at least one consumer is registered
//! - Every event goes to every registered consumer in the same order
//! - A consumer whose delivery fails is pruned without affecting the others
//! - One retry is pending at most; it is cancelled when the last consumer leaves
//! - Requests never touch the stream and resolve the endpoint per call
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use orion_relay::{ChannelHub, ConsumerId, OutboundRequest, Relay, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let hub = Arc::new(ChannelHub::new());
//!     let relay = Relay::builder().channel(hub.clone()).spawn()?;
//!
//!     let tab = ConsumerId::new(1).expect("non-zero");
//!     let mut updates = hub.attach(tab);
//!     relay.register(tab).await;
//!
//!     relay.submit(OutboundRequest::send_text("hello")).await?;
//!
//!     while let Some(message) = updates.recv().await {
//!         println!("{message:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`background`] | UI message contract handler |
//! | [`config`] | Settings and endpoint resolution |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Stream events, UI messages, requests |
//! | [`relay`] | Registry, fan-out, reconnection and the relay actor |
//! | [`router`] | HTTP request channel and downloads |
//! | [`transport`] | Streaming WebSocket connection |

// ============================================================================
// Modules
// ============================================================================

/// UI message contract handler.
///
/// Maps [`ExtensionMessage`]s onto relay operations.
pub mod background;

/// Settings and endpoint resolution.
///
/// Resolution never fails; malformed settings fall back to defaults.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for relay entities.
pub mod identifiers;

/// Message types for the stream, the UI and the request channel.
pub mod protocol;

/// The relay: registry, dispatcher, reconnection and state machine.
pub mod relay;

/// Point-to-point request channel.
pub mod router;

/// Streaming WebSocket transport.
///
/// Internal module driven by the relay.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Background handler
pub use background::Background;

// Configuration types
pub use config::{
    ConfigResolver, Endpoint, FileSettings, MemorySettings, SETTINGS_KEY, Settings, SettingsStore,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{AttemptId, ConsumerId, RequestId};

// Protocol types
pub use protocol::{
    ConsumerMessage, ConversationItem, DownloadReceipt, EventKind, ExtensionMessage,
    ExtensionResponse, FilePayload, FileRef, InboundEvent, ItemKind, OutboundRequest,
    OutboundResult, RequestOutcome, SendReceipt, Timestamp, VideoInfo,
};

// Relay types
pub use relay::{
    ChannelHub, ConnectionState, ConsumerChannel, ConsumerRegistry, DispatchReport, Dispatcher,
    ReconnectPolicy, Relay, RelayBuilder, RelayStatus,
};

// Router types
pub use router::RequestRouter;
