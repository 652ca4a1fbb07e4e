//! Loopback companion servers for tests.
//!
//! [`StreamServer`] speaks the streaming side with `tokio-tungstenite`;
//! [`CompanionServer`] serves the request endpoints with `axum`.

// ============================================================================
// Imports
// ============================================================================

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::config::Endpoint;
use crate::protocol::{ConversationItem, EventKind, InboundEvent};

// ============================================================================
// Helpers
// ============================================================================

/// The snapshot used by the relay scenarios.
pub(crate) fn initial_event() -> InboundEvent {
    InboundEvent::new(EventKind::Initial, vec![ConversationItem::text("PC", "hi", 1000)])
}

/// An endpoint on a loopback port nothing listens on.
pub(crate) async fn unreachable_endpoint() -> Endpoint {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    Endpoint::new("127.0.0.1", port)
}

/// Polls `condition` until it holds or five seconds pass.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..250 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

// ============================================================================
// StreamServer
// ============================================================================

enum ServerCommand {
    Text(String),
    Close(String),
}

struct StreamState {
    next_id: AtomicUsize,
    accepted: AtomicUsize,
    peers: Mutex<FxHashMap<usize, mpsc::UnboundedSender<ServerCommand>>>,
    greeting: Option<InboundEvent>,
}

/// WebSocket server standing in for the companion's `/pc/ws` endpoint.
pub(crate) struct StreamServer {
    addr: SocketAddr,
    state: Arc<StreamState>,
    accept_task: JoinHandle<()>,
}

impl StreamServer {
    /// Starts a server that sends nothing on connect.
    pub(crate) async fn start() -> Self {
        Self::start_with_greeting(None).await
    }

    /// Starts a server that sends `greeting` to every new connection.
    pub(crate) async fn start_with_greeting(greeting: Option<InboundEvent>) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let state = Arc::new(StreamState {
            next_id: AtomicUsize::new(0),
            accepted: AtomicUsize::new(0),
            peers: Mutex::new(FxHashMap::default()),
            greeting,
        });

        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(Self::serve(stream, Arc::clone(&accept_state)));
            }
        });

        Self {
            addr,
            state,
            accept_task,
        }
    }

    async fn serve(stream: TcpStream, state: Arc<StreamState>) {
        let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        let (mut write, mut read) = ws.split();

        if let Some(greeting) = &state.greeting {
            let text = serde_json::to_string(greeting).expect("serialize");
            if write.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }

        let id = state.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.peers.lock().insert(id, tx);
        state.accepted.fetch_add(1, Ordering::SeqCst);

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(ServerCommand::Text(text)) => {
                        if write.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(ServerCommand::Close(reason)) => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: reason.into(),
                        };
                        let _ = write.send(Message::Close(Some(frame))).await;
                        break;
                    }
                    None => break,
                },
                message = read.next() => match message {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                },
            }
        }

        state.peers.lock().remove(&id);
    }

    /// Endpoint clients should connect to.
    pub(crate) fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.addr.port())
    }

    /// Total handshakes completed.
    pub(crate) fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// Connections currently open.
    pub(crate) fn open_count(&self) -> usize {
        self.state.peers.lock().len()
    }

    /// Sends a raw text frame to every open connection.
    pub(crate) fn broadcast_text(&self, text: &str) {
        for peer in self.state.peers.lock().values() {
            let _ = peer.send(ServerCommand::Text(text.to_string()));
        }
    }

    /// Sends an event to every open connection.
    pub(crate) fn broadcast_event(&self, event: &InboundEvent) {
        self.broadcast_text(&serde_json::to_string(event).expect("serialize"));
    }

    /// Closes every open connection with a normal close frame.
    pub(crate) fn close_all(&self, reason: &str) {
        for peer in self.state.peers.lock().values() {
            let _ = peer.send(ServerCommand::Close(reason.to_string()));
        }
    }

}

impl Drop for StreamServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

// ============================================================================
// CompanionServer
// ============================================================================

/// How the companion server answers requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Normal,
    ServerError,
    Garbage,
}

#[derive(Default)]
struct CompanionState {
    mode: Mutex<Option<Mode>>,
    items: Mutex<Vec<ConversationItem>>,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    files: Mutex<FxHashMap<String, Vec<u8>>>,
    playback: Mutex<Vec<Value>>,
}

impl CompanionState {
    fn mode(&self) -> Mode {
        self.mode.lock().unwrap_or(Mode::Normal)
    }

    fn failure(&self) -> Option<Response> {
        match self.mode() {
            Mode::Normal => None,
            Mode::ServerError => Some((StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()),
            Mode::Garbage => Some((StatusCode::OK, "<html>not json</html>").into_response()),
        }
    }
}

/// HTTP server standing in for the companion's request endpoints.
pub(crate) struct CompanionServer {
    addr: SocketAddr,
    state: Arc<CompanionState>,
    task: JoinHandle<()>,
}

impl CompanionServer {
    /// Starts the server on a random loopback port.
    pub(crate) async fn start() -> Self {
        let state = Arc::new(CompanionState::default());

        let app = Router::new()
            .route("/pc/items", get(Self::handle_items))
            .route("/pc/message", post(Self::handle_message))
            .route("/pc/file", post(Self::handle_file))
            .route("/pc/youtube-info", post(Self::handle_youtube_info))
            .route("/uploads/:name", get(Self::handle_upload))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state, task }
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.addr.port())
    }

    pub(crate) fn set_mode(&self, mode: Mode) {
        *self.state.mode.lock() = Some(mode);
    }

    pub(crate) fn push_item(&self, item: ConversationItem) {
        self.state.items.lock().push(item);
    }

    pub(crate) fn add_file(&self, name: &str, bytes: &[u8]) {
        self.state.files.lock().insert(name.to_string(), bytes.to_vec());
    }

    pub(crate) fn items(&self) -> Vec<ConversationItem> {
        self.state.items.lock().clone()
    }

    pub(crate) fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.state.uploads.lock().clone()
    }

    pub(crate) fn playback(&self) -> Vec<Value> {
        self.state.playback.lock().clone()
    }

    async fn handle_items(State(state): State<Arc<CompanionState>>) -> Response {
        if let Some(failure) = state.failure() {
            return failure;
        }
        let items = state.items.lock().clone();
        axum::Json(json!({ "items": items })).into_response()
    }

    async fn handle_message(
        State(state): State<Arc<CompanionState>>,
        axum::Json(body): axum::Json<Value>,
    ) -> Response {
        if let Some(failure) = state.failure() {
            return failure;
        }
        let text = body["text"].as_str().unwrap_or_default().to_string();
        let mut items = state.items.lock();
        let id = format!("item_{}", items.len() + 1);
        let mut item = ConversationItem::text("PC", text, 1);
        item.id = Some(id.clone());
        items.push(item);
        axum::Json(json!({ "status": "success", "id": id })).into_response()
    }

    async fn handle_file(
        State(state): State<Arc<CompanionState>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        if let Some(failure) = state.failure() {
            return failure;
        }
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        state.uploads.lock().push((content_type, body.to_vec()));
        axum::Json(json!({
            "status": "success",
            "id": "item_file",
            "url": "http://127.0.0.1/uploads/item_file_a.txt"
        }))
        .into_response()
    }

    async fn handle_youtube_info(
        State(state): State<Arc<CompanionState>>,
        axum::Json(body): axum::Json<Value>,
    ) -> Response {
        if let Some(failure) = state.failure() {
            return failure;
        }
        state.playback.lock().push(body);
        axum::Json(json!({ "status": "success" })).into_response()
    }

    async fn handle_upload(
        State(state): State<Arc<CompanionState>>,
        Path(name): Path<String>,
    ) -> Response {
        if let Some(failure) = state.failure() {
            return failure;
        }
        match state.files.lock().get(&name) {
            Some(bytes) => bytes.clone().into_response(),
            None => (StatusCode::NOT_FOUND, "File not found").into_response(),
        }
    }
}

impl Drop for CompanionServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
