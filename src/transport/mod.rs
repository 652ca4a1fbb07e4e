//! WebSocket transport layer.
//!
//! This module owns the streaming side of the link to the companion
//! server. The relay drives it; nothing else opens connections.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Relay (actor)  │                              │  Companion      │
//! │                 │         WebSocket            │  server         │
//! │ StreamConnection│◄─────────────────────────────│                 │
//! │  (one attempt)  │     ws://host:port/pc/ws     │  /pc/ws         │
//! │                 │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `StreamConnection::open` - Spawn a task for one attempt
//! 2. `TransportEvent::Opened` - Handshake completed
//! 3. `TransportEvent::Message` - One per decoded frame
//! 4. `TransportEvent::Closed` - Exactly once, whatever ended the attempt
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Streaming connection and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// Streaming connection and event loop.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{CLOSED_BY_RELAY, StreamConnection, TransportEvent};
