//! Streaming connection to the companion server.
//!
//! Each [`StreamConnection`] is one connection attempt. Opening spawns a
//! tokio task that connects, decodes frames and reports back to the
//! relay through a channel of [`TransportEvent`]s.
//!
//! # Event Loop
//!
//! ```text
//! open() ──► connecting ──Opened──► connected ──Message──► ...
//!                │                      │
//!                └──────Closed◄─────────┘   (exactly once per attempt)
//! ```
//!
//! The stream is receive-only: outbound data uses the request channel.
//! Malformed frames are logged and dropped, not treated as failures.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::Endpoint;
use crate::error::Result;
use crate::identifiers::AttemptId;
use crate::protocol::InboundEvent;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for the TCP connect plus WebSocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the close handshake on explicit shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Close code reported when the stream ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Reason reported when the relay closed the connection itself.
pub const CLOSED_BY_RELAY: &str = "Connection closed by relay";

// ============================================================================
// TransportEvent
// ============================================================================

/// Notification from a connection task to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The handshake completed.
    Opened {
        /// Attempt that opened.
        attempt: AttemptId,
    },
    /// A decoded event arrived.
    Message {
        /// Attempt that received it.
        attempt: AttemptId,
        /// The decoded event.
        event: InboundEvent,
    },
    /// The attempt ended, whether it failed, was closed remotely or was
    /// shut down.
    Closed {
        /// Attempt that ended.
        attempt: AttemptId,
        /// Human-readable reason.
        reason: String,
    },
}

impl TransportEvent {
    /// Returns the attempt that produced this event.
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> AttemptId {
        match self {
            Self::Opened { attempt }
            | Self::Message { attempt, .. }
            | Self::Closed { attempt, .. } => *attempt,
        }
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the connection task.
enum ConnectionCommand {
    /// Close the connection.
    Shutdown,
}

// ============================================================================
// StreamConnection
// ============================================================================

/// Handle to one streaming connection attempt.
///
/// Dropping the handle shuts the connection down.
#[derive(Debug)]
pub struct StreamConnection {
    /// Attempt this handle belongs to.
    attempt: AttemptId,
    /// Stream URL.
    url: Url,
    /// Channel for sending commands to the connection task.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl StreamConnection {
    /// Begins an asynchronous connection attempt.
    ///
    /// Returns immediately; completion is reported through `events`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Url`] if the endpoint cannot form a URL.
    pub fn open(
        endpoint: &Endpoint,
        attempt: AttemptId,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self> {
        let url = endpoint.ws_url()?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        debug!(%attempt, %url, "Opening stream connection");

        tokio::spawn(Self::run(url.clone(), attempt, command_rx, events));

        Ok(Self {
            attempt,
            url,
            command_tx,
        })
    }

    /// Returns the attempt id.
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Returns the stream URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Closes the connection.
    ///
    /// Idempotent; safe to call after the connection already ended.
    pub fn close(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Returns `true` once the connection task has exited.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Connection task: drives one attempt and reports its end.
    async fn run(
        url: Url,
        attempt: AttemptId,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) {
        let reason = Self::drive(&url, attempt, &mut command_rx, &events).await;

        debug!(%attempt, %reason, "Stream connection ended");

        let _ = events.send(TransportEvent::Closed { attempt, reason });
    }

    /// Connects and pumps frames; returns the reason the attempt ended.
    async fn drive(
        url: &Url,
        attempt: AttemptId,
        command_rx: &mut mpsc::UnboundedReceiver<ConnectionCommand>,
        events: &mpsc::UnboundedSender<TransportEvent>,
    ) -> String {
        let ws_stream = tokio::select! {
            result = timeout(CONNECT_TIMEOUT, connect_async(url.as_str())) => {
                match result {
                    Ok(Ok((stream, _))) => stream,
                    Ok(Err(e)) => return format!("WebSocket connection error: {e}"),
                    Err(_) => {
                        return format!(
                            "WebSocket connection error: timed out after {}ms",
                            CONNECT_TIMEOUT.as_millis()
                        );
                    }
                }
            }

            _ = command_rx.recv() => return CLOSED_BY_RELAY.to_string(),
        };

        info!(%attempt, %url, "Stream connected");

        if events.send(TransportEvent::Opened { attempt }).is_err() {
            return CLOSED_BY_RELAY.to_string();
        }

        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => match InboundEvent::parse(&text) {
                            Ok(event) => {
                                trace!(%attempt, items = event.items().len(), "Event received");
                                if events.send(TransportEvent::Message { attempt, event }).is_err() {
                                    return CLOSED_BY_RELAY.to_string();
                                }
                            }
                            Err(e) => {
                                warn!(%attempt, error = %e, "Dropping malformed frame");
                            }
                        },

                        Some(Ok(Message::Close(frame))) => {
                            debug!(%attempt, "Stream closed by remote");
                            return close_reason(frame.as_ref());
                        }

                        Some(Err(e)) => {
                            warn!(%attempt, error = %e, "Stream error");
                            return format!("WebSocket connection error: {e}");
                        }

                        None => {
                            return format!(
                                "Connection closed ({ABNORMAL_CLOSURE}): stream ended"
                            );
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // A dropped handle counts as shutdown.
                _ = command_rx.recv() => {
                    debug!(%attempt, "Shutdown command received");
                    let _ = timeout(CLOSE_TIMEOUT, ws_write.close()).await;
                    return CLOSED_BY_RELAY.to_string();
                }
            }
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Formats the disconnect reason for a remote close.
fn close_reason(frame: Option<&CloseFrame>) -> String {
    match frame {
        Some(frame) if !frame.reason.is_empty() => {
            format!("Connection closed ({}): {}", u16::from(frame.code), frame.reason.as_str())
        }
        Some(frame) => format!("Connection closed ({}): Unknown reason", u16::from(frame.code)),
        None => "Connection closed (1005): Unknown reason".to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
