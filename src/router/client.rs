//! HTTP request router.
//!
//! Every request resolves the endpoint afresh, so settings changes apply
//! to the next request without restarting anything. Requests do not
//! consult the streaming connection and may run concurrently.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::ConfigResolver;
use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{
    ConversationData, FilePayload, OutboundRequest, OutboundResult, RequestOutcome, SendReceipt,
    VideoInfo,
};

use super::download;

// ============================================================================
// Constants
// ============================================================================

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Conversation snapshot path.
const ITEMS_PATH: &str = "/pc/items";

/// Text message path.
const MESSAGE_PATH: &str = "/pc/message";

/// File upload path.
const FILE_PATH: &str = "/pc/file";

/// Playback report path.
const PLAYBACK_PATH: &str = "/pc/youtube-info";

/// Prefix of uploaded file URLs.
const UPLOADS_PREFIX: &str = "/uploads/";

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 256;

// ============================================================================
// RequestRouter
// ============================================================================

/// Forwards [`OutboundRequest`]s to the companion server.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct RequestRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    client: Client,
    resolver: ConfigResolver,
    download_dir: PathBuf,
}

impl fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestRouter")
            .field("download_dir", &self.inner.download_dir)
            .finish_non_exhaustive()
    }
}

impl RequestRouter {
    /// Creates a router.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(
        resolver: ConfigResolver,
        request_timeout: Duration,
        download_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("orion-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to initialize HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(RouterInner {
                client,
                resolver,
                download_dir: download_dir.into(),
            }),
        })
    }

    /// Directory downloads are saved into.
    #[inline]
    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.inner.download_dir
    }

    /// Executes one request and returns its single result.
    pub async fn submit(&self, request: OutboundRequest) -> OutboundResult {
        let request_id = RequestId::generate();
        let name = request.name();

        debug!(%request_id, request = name, "Submitting request");

        let result = match request {
            OutboundRequest::FetchSnapshot => self.fetch_snapshot().await,
            OutboundRequest::SendText(text) => self.send_text(text).await,
            OutboundRequest::SendFile(payload) => self.send_file(payload).await,
            OutboundRequest::RequestDownload {
                file_id,
                display_name,
            } => self.download(&file_id, &display_name).await,
            OutboundRequest::ReportPlayback(info) => self.report_playback(&info).await,
        };

        match &result {
            Ok(_) => debug!(%request_id, request = name, "Request succeeded"),
            Err(e) => warn!(%request_id, request = name, error = %e, "Request failed"),
        }

        result
    }

    // ========================================================================
    // Requests
    // ========================================================================

    async fn fetch_snapshot(&self) -> OutboundResult {
        let url = self.inner.resolver.resolve().await.http_url(ITEMS_PATH)?;
        let response = self.send(self.inner.client.get(url)).await?;
        let data: ConversationData = decode(response).await?;
        Ok(RequestOutcome::Snapshot(data.items))
    }

    async fn send_text(&self, text: String) -> OutboundResult {
        if text.trim().is_empty() {
            return Err(Error::invalid_argument("message text is empty"));
        }

        let url = self.inner.resolver.resolve().await.http_url(MESSAGE_PATH)?;
        let request = self.inner.client.post(url).json(&json!({ "text": text }));
        let receipt: SendReceipt = decode(self.send(request).await?).await?;
        Ok(RequestOutcome::Sent(receipt))
    }

    async fn send_file(&self, payload: FilePayload) -> OutboundResult {
        let FilePayload {
            name,
            mime_type,
            bytes,
        } = payload;

        let mut part = Part::bytes(bytes).file_name(name);
        if let Some(mime_type) = mime_type {
            part = part
                .mime_str(&mime_type)
                .map_err(|e| Error::invalid_argument(format!("bad MIME type {mime_type}: {e}")))?;
        }

        let url = self.inner.resolver.resolve().await.http_url(FILE_PATH)?;
        let request = self
            .inner
            .client
            .post(url)
            .multipart(Form::new().part("file", part));
        let receipt: SendReceipt = decode(self.send(request).await?).await?;
        Ok(RequestOutcome::Sent(receipt))
    }

    async fn download(&self, file_id: &str, display_name: &str) -> OutboundResult {
        if file_id.is_empty() {
            return Err(Error::invalid_argument("file id is empty"));
        }

        let path = format!("{UPLOADS_PREFIX}{}", urlencoding::encode(file_id));
        let url = self.inner.resolver.resolve().await.http_url(&path)?;
        let response = self.send(self.inner.client.get(url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::network(format!("failed to read download: {e}")))?;

        let dir = self.inner.download_dir.clone();
        let display_name = if display_name.is_empty() {
            file_id.to_string()
        } else {
            display_name.to_string()
        };

        let receipt = tokio::task::spawn_blocking(move || download::save(&dir, &display_name, &bytes))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        Ok(RequestOutcome::Downloaded(receipt))
    }

    async fn report_playback(&self, info: &VideoInfo) -> OutboundResult {
        let url = self.inner.resolver.resolve().await.http_url(PLAYBACK_PATH)?;
        let request = self.inner.client.post(url).json(info);
        let receipt: SendReceipt = decode(self.send(request).await?).await?;
        Ok(RequestOutcome::Acknowledged(receipt))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Sends a request and checks the status.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(network_error)?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::http_status(status.as_u16(), truncate(&body)))
    }
}

/// Reads the body and decodes it as JSON.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| Error::network(format!("failed to read response: {e}")))?;

    serde_json::from_str(&body)
        .map_err(|e| Error::decode(format!("{e} in {:?}", truncate(&body))))
}

fn network_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::network(format!("request timed out: {e}"))
    } else {
        Error::network(e.to_string())
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::Value;
    use tokio_test::{assert_err, assert_ok};

    use crate::config::{MemorySettings, Settings};
    use crate::protocol::{ConversationItem, ItemKind};
    use crate::testing::{CompanionServer, Mode, unreachable_endpoint};

    fn router_for(endpoint: &crate::config::Endpoint, dir: &Path) -> (RequestRouter, Arc<MemorySettings>) {
        let store = Arc::new(MemorySettings::new());
        store.set_settings(&Settings {
            server_host: endpoint.host().to_string(),
            server_port: endpoint.port(),
            ..Settings::default()
        });
        let router = RequestRouter::new(
            ConfigResolver::new(store.clone()),
            Duration::from_secs(5),
            dir,
        )
        .expect("router");
        (router, store)
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let server = CompanionServer::start().await;
        server.push_item(ConversationItem::text("PC", "hi", 1000));
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, _) = router_for(&server.endpoint(), dir.path());

        let outcome = assert_ok!(router.submit(OutboundRequest::FetchSnapshot).await);
        match outcome {
            RequestOutcome::Snapshot(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].content, "hi");
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_text() {
        let server = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, _) = router_for(&server.endpoint(), dir.path());

        let outcome = assert_ok!(router.submit(OutboundRequest::send_text("hello")).await);
        assert_eq!(
            outcome,
            RequestOutcome::Sent(SendReceipt {
                status: "success".into(),
                id: Some("item_1".into()),
                url: None,
            })
        );
        assert_eq!(server.items()[0].content, "hello");
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected_locally() {
        let server = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, _) = router_for(&server.endpoint(), dir.path());

        let err = assert_err!(router.submit(OutboundRequest::send_text("  ")).await);
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(server.items().is_empty());
    }

    #[tokio::test]
    async fn test_send_file_is_multipart() {
        let server = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, _) = router_for(&server.endpoint(), dir.path());

        let payload = FilePayload::new("a.txt", b"hello file".to_vec()).with_mime_type("text/plain");
        let outcome = assert_ok!(router.submit(OutboundRequest::SendFile(payload)).await);
        match outcome {
            RequestOutcome::Sent(receipt) => assert!(receipt.url.is_some()),
            other => panic!("expected sent, got {other:?}"),
        }

        let uploads = server.uploads();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].0.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&uploads[0].1);
        assert!(body.contains("name=\"file\""));
        assert!(body.contains("filename=\"a.txt\""));
        assert!(body.contains("hello file"));
    }

    #[tokio::test]
    async fn test_download_saves_file() {
        let server = CompanionServer::start().await;
        server.add_file("item_9_photo.jpg", b"jpeg bytes");
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, _) = router_for(&server.endpoint(), dir.path());

        let mut item = ConversationItem::text("mobile", "photo.jpg|item_9_photo.jpg", 1);
        item.kind = ItemKind::File;
        let request = OutboundRequest::download_item(&item).expect("file item");

        let outcome = assert_ok!(router.submit(request).await);
        match outcome {
            RequestOutcome::Downloaded(receipt) => {
                assert_eq!(receipt.path, dir.path().join("photo.jpg"));
                assert_eq!(receipt.bytes, 10);
                assert_eq!(std::fs::read(&receipt.path).expect("read"), b"jpeg bytes");
            }
            other => panic!("expected download, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_download_missing_file_is_status_error() {
        let server = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, _) = router_for(&server.endpoint(), dir.path());

        let err = assert_err!(router.submit(OutboundRequest::download("nope", "x")).await);
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }), "{err}");
    }

    #[tokio::test]
    async fn test_report_playback() {
        let server = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, _) = router_for(&server.endpoint(), dir.path());

        let info = VideoInfo {
            video_id: "abc".into(),
            title: "t".into(),
            current_time: 61,
            duration: 300,
            timestamp_link: "https://youtu.be/abc?t=61".into(),
            is_playing: true,
            url: "https://www.youtube.com/watch?v=abc".into(),
        };
        let outcome = assert_ok!(router.submit(OutboundRequest::ReportPlayback(info)).await);
        assert!(matches!(outcome, RequestOutcome::Acknowledged(_)));

        let playback = server.playback();
        assert_eq!(playback.len(), 1);
        assert_eq!(playback[0]["videoId"], Value::from("abc"));
        assert_eq!(playback[0]["currentTime"], Value::from(61));
    }

    #[tokio::test]
    async fn test_failures_are_distinguishable() {
        let server = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, store) = router_for(&server.endpoint(), dir.path());

        server.set_mode(Mode::ServerError);
        let err = assert_err!(router.submit(OutboundRequest::FetchSnapshot).await);
        assert!(err.is_status_error(), "{err}");
        assert_eq!(err.to_string(), "HTTP 500: boom");

        server.set_mode(Mode::Garbage);
        let err = assert_err!(router.submit(OutboundRequest::FetchSnapshot).await);
        assert!(err.is_decode_error(), "{err}");

        let unreachable = unreachable_endpoint().await;
        store.set_settings(&Settings {
            server_host: unreachable.host().to_string(),
            server_port: unreachable.port(),
            ..Settings::default()
        });
        let err = assert_err!(router.submit(OutboundRequest::FetchSnapshot).await);
        assert!(err.is_network_error(), "{err}");
    }

    #[tokio::test]
    async fn test_endpoint_resolved_per_request() {
        let first = CompanionServer::start().await;
        let second = CompanionServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, store) = router_for(&first.endpoint(), dir.path());

        assert_ok!(router.submit(OutboundRequest::send_text("one")).await);

        store.set_settings(&Settings {
            server_host: "127.0.0.1".into(),
            server_port: second.endpoint().port(),
            ..Settings::default()
        });
        assert_ok!(router.submit(OutboundRequest::send_text("two")).await);

        assert_eq!(first.items().len(), 1);
        assert_eq!(second.items()[0].content, "two");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        let long = "x".repeat(MAX_ERROR_BODY + 10);
        assert_eq!(truncate(&long).len(), MAX_ERROR_BODY + 3);
    }
}
