//! Background message handler.
//!
//! Maps each [`ExtensionMessage`] sent by a UI surface onto a relay
//! operation and answers with exactly one [`ExtensionResponse`]. Failures
//! are reported to the sender only; nothing here is broadcast.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use orion_relay::{Background, ChannelHub, ConsumerId, Relay};
//!
//! # async fn example() -> orion_relay::Result<()> {
//! let relay = Relay::builder().channel(Arc::new(ChannelHub::new())).spawn()?;
//! let background = Background::new(relay);
//!
//! let tab = ConsumerId::new(7);
//! let response = background
//!     .handle_json(tab, r#"{"type":"connect-websocket"}"#)
//!     .await;
//! assert!(response.success);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConsumerId;
use crate::protocol::{
    ExtensionMessage, ExtensionResponse, FilePayload, OutboundRequest, OutboundResult,
};
use crate::relay::Relay;

// ============================================================================
// Background
// ============================================================================

/// Entry point for UI messages.
#[derive(Debug, Clone)]
pub struct Background {
    relay: Relay,
}

impl Background {
    /// Creates a handler over a running relay.
    #[inline]
    #[must_use]
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }

    /// Returns the relay.
    #[inline]
    #[must_use]
    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// Decodes a raw JSON message and handles it.
    ///
    /// Undecodable messages get an `invalid` failure response.
    pub async fn handle_json(&self, sender: Option<ConsumerId>, raw: &str) -> ExtensionResponse {
        match serde_json::from_str::<ExtensionMessage>(raw) {
            Ok(message) => self.handle(sender, message).await,
            Err(e) => {
                warn!(error = %e, "Undecodable UI message");
                ExtensionResponse::failure(&Error::invalid_argument(format!(
                    "unrecognized message: {e}"
                )))
            }
        }
    }

    /// Handles one message from `sender`.
    ///
    /// `sender` is the tab the message came from; messages from surfaces
    /// without a tab cannot register for live updates.
    pub async fn handle(
        &self,
        sender: Option<ConsumerId>,
        message: ExtensionMessage,
    ) -> ExtensionResponse {
        match message {
            ExtensionMessage::ConnectWebsocket => match require_sender(sender) {
                Ok(consumer) => {
                    self.relay.register(consumer).await;
                    ExtensionResponse::ok()
                }
                Err(e) => ExtensionResponse::failure(&e),
            },

            ExtensionMessage::DisconnectWebsocket => match require_sender(sender) {
                Ok(consumer) => {
                    self.relay.deregister(consumer).await;
                    ExtensionResponse::ok()
                }
                Err(e) => ExtensionResponse::failure(&e),
            },

            ExtensionMessage::FetchConversation => {
                respond(self.relay.submit(OutboundRequest::FetchSnapshot).await)
            }

            ExtensionMessage::SendMessage { text } => {
                respond(self.relay.submit(OutboundRequest::SendText(text)).await)
            }

            ExtensionMessage::SendFile { file } => {
                match FilePayload::from_base64(file.name, file.mime_type, &file.data) {
                    Ok(payload) => respond(self.relay.submit(OutboundRequest::SendFile(payload)).await),
                    Err(e) => ExtensionResponse::failure(&e),
                }
            }

            ExtensionMessage::DownloadFile {
                unique_filename,
                display_name,
            } => respond(
                self.relay
                    .submit(OutboundRequest::download(unique_filename, display_name))
                    .await,
            ),

            ExtensionMessage::YoutubeVideoInfo { video_info } => respond(
                self.relay
                    .submit(OutboundRequest::ReportPlayback(video_info))
                    .await,
            ),

            ExtensionMessage::GetSettings => {
                ExtensionResponse::with_settings(self.relay.resolver().settings().await)
            }

            ExtensionMessage::GetServerUrl => {
                ExtensionResponse::with_server_url(self.relay.resolver().resolve().await.base_url())
            }
        }
    }
}

fn require_sender(sender: Option<ConsumerId>) -> Result<ConsumerId> {
    sender.ok_or_else(|| Error::invalid_argument("message sender has no tab"))
}

fn respond(result: OutboundResult) -> ExtensionResponse {
    match result {
        Ok(outcome) => {
            debug!("Request answered");
            ExtensionResponse::with_data(outcome.to_value())
        }
        Err(e) => ExtensionResponse::failure(&e),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{Value, json};

    use crate::config::{Endpoint, MemorySettings, Settings};
    use crate::protocol::{ConsumerMessage, ConversationItem};
    use crate::relay::{ChannelHub, ConnectionState};
    use crate::testing::{CompanionServer, Mode, StreamServer, eventually};

    fn id(n: u32) -> ConsumerId {
        ConsumerId::new(n).expect("non-zero")
    }

    fn background_for(endpoint: &Endpoint, hub: Arc<ChannelHub>, dir: &std::path::Path) -> Background {
        let store = Arc::new(MemorySettings::new());
        store.set_settings(&Settings {
            server_host: endpoint.host().to_string(),
            server_port: endpoint.port(),
            ..Settings::default()
        });
        let relay = Relay::builder()
            .settings(store)
            .channel(hub)
            .download_dir(dir)
            .spawn()
            .expect("relay");
        Background::new(relay)
    }

    fn to_json(response: &ExtensionResponse) -> Value {
        serde_json::to_value(response).expect("serialize")
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_websocket() {
        let server = StreamServer::start().await;
        let hub = Arc::new(ChannelHub::new());
        let dir = tempfile::tempdir().expect("tempdir");
        let background = background_for(&server.endpoint(), hub.clone(), dir.path());
        let mut rx = hub.attach(id(4));

        let response = background
            .handle_json(Some(id(4)), r#"{"type":"connect-websocket"}"#)
            .await;
        assert_eq!(to_json(&response), json!({ "success": true }));

        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("status within timeout")
            .expect("channel open");
        assert_eq!(message, ConsumerMessage::connected());

        let response = background
            .handle_json(Some(id(4)), r#"{"type":"disconnect-websocket"}"#)
            .await;
        assert!(response.success);
        assert!(eventually(|| server.open_count() == 0).await);

        let state = background.relay().state().await.expect("state");
        assert_ne!(state, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_connect_without_tab_is_invalid() {
        let server = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let background = background_for(&server.endpoint(), Arc::new(ChannelHub::new()), dir.path());

        let response = background.handle(None, ExtensionMessage::ConnectWebsocket).await;
        assert!(!response.success);
        assert_eq!(response.error_kind.as_deref(), Some("invalid"));
    }

    #[tokio::test]
    async fn test_unknown_message_is_invalid() {
        let server = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let background = background_for(&server.endpoint(), Arc::new(ChannelHub::new()), dir.path());

        let response = background.handle_json(Some(id(1)), r#"{"type":"toggle-sidebar"}"#).await;
        assert!(!response.success);
        assert_eq!(response.error_kind.as_deref(), Some("invalid"));
    }

    #[tokio::test]
    async fn test_fetch_and_send() {
        let server = CompanionServer::start().await;
        server.push_item(ConversationItem::text("PC", "hi", 1000));
        let dir = tempfile::tempdir().expect("tempdir");
        let background = background_for(&server.endpoint(), Arc::new(ChannelHub::new()), dir.path());

        let response = background
            .handle_json(Some(id(1)), r#"{"type":"fetch-conversation"}"#)
            .await;
        assert_eq!(
            to_json(&response),
            json!({
                "success": true,
                "data": { "items": [{ "from": "PC", "type": "text", "content": "hi", "timestamp": 1000 }] }
            })
        );

        let response = background
            .handle_json(Some(id(1)), r#"{"type":"send-message","text":"hello"}"#)
            .await;
        assert!(response.success);
        assert_eq!(response.data.as_ref().expect("data")["status"], "success");

        let response = background
            .handle_json(
                Some(id(1)),
                r#"{"type":"send-file","file":{"name":"a.txt","mimeType":"text/plain","data":"aGVsbG8="}}"#,
            )
            .await;
        assert!(response.success, "{response:?}");
        assert_eq!(server.uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_send_file_with_bad_data_is_invalid() {
        let server = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let background = background_for(&server.endpoint(), Arc::new(ChannelHub::new()), dir.path());

        let response = background
            .handle_json(
                Some(id(1)),
                r#"{"type":"send-file","file":{"name":"a.txt","data":"***"}}"#,
            )
            .await;
        assert!(!response.success);
        assert_eq!(response.error_kind.as_deref(), Some("invalid"));
        assert!(server.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_download_file() {
        let server = CompanionServer::start().await;
        server.add_file("item_2_notes.txt", b"notes");
        let dir = tempfile::tempdir().expect("tempdir");
        let background = background_for(&server.endpoint(), Arc::new(ChannelHub::new()), dir.path());

        let response = background
            .handle_json(
                Some(id(1)),
                r#"{"type":"download-file","uniqueFilename":"item_2_notes.txt","displayName":"notes.txt"}"#,
            )
            .await;
        assert!(response.success, "{response:?}");
        let data = response.data.expect("data");
        assert_eq!(data["bytes"], 5);
        assert_eq!(
            std::fs::read(dir.path().join("notes.txt")).expect("saved"),
            b"notes"
        );
    }

    #[tokio::test]
    async fn test_youtube_video_info() {
        let server = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let background = background_for(&server.endpoint(), Arc::new(ChannelHub::new()), dir.path());

        let response = background
            .handle_json(
                Some(id(1)),
                r#"{"type":"youtube-video-info","videoInfo":{"videoId":"abc","currentTime":12,"isPlaying":true}}"#,
            )
            .await;
        assert!(response.success, "{response:?}");
        assert_eq!(server.playback()[0]["videoId"], "abc");
    }

    #[tokio::test]
    async fn test_request_failures_carry_kind() {
        let server = CompanionServer::start().await;
        server.set_mode(Mode::ServerError);
        let dir = tempfile::tempdir().expect("tempdir");
        let background = background_for(&server.endpoint(), Arc::new(ChannelHub::new()), dir.path());

        let response = background
            .handle_json(Some(id(1)), r#"{"type":"fetch-conversation"}"#)
            .await;
        assert_eq!(
            to_json(&response),
            json!({ "success": false, "error": "HTTP 500: boom", "errorKind": "status" })
        );
    }

    #[tokio::test]
    async fn test_settings_and_server_url() {
        let server = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let endpoint = server.endpoint();
        let background = background_for(&endpoint, Arc::new(ChannelHub::new()), dir.path());

        let response = background.handle(Some(id(1)), ExtensionMessage::GetSettings).await;
        let settings = response.settings.expect("settings");
        assert_eq!(settings.server_port, endpoint.port());
        assert!(settings.resizable_sidebar);

        let response = background.handle(Some(id(1)), ExtensionMessage::GetServerUrl).await;
        assert_eq!(
            response.server_url.as_deref(),
            Some(format!("http://127.0.0.1:{}", endpoint.port()).as_str())
        );
    }
}
