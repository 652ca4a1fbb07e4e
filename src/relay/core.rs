//! Relay handle and state machine.
//!
//! The [`Relay`] owns the single streaming connection and multiplexes it
//! across every registered consumer. All mutable state lives in one
//! actor task and is changed only in response to a command, a transport
//! event or the retry timer, so transitions run to completion without
//! locks.
//!
//! # Connection States
//!
//! ```text
//!                  register (0→1) / retry fires
//! Disconnected ───────────────────────────────► Connecting
//!      ▲                                            │ Opened
//!      │ Closed (policy arms a retry)               ▼
//!      ├─────────────────────────────────────── Connected
//!      │                                            │ registry empties
//!      │ Closed (quiet; reopens if re-registered)   ▼
//!      └─────────────────────────────────────── Disconnecting
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use orion_relay::{ChannelHub, ConsumerId, Relay};
//!
//! # async fn example() -> orion_relay::Result<()> {
//! let hub = Arc::new(ChannelHub::new());
//! let relay = Relay::builder().channel(hub.clone()).spawn()?;
//!
//! let tab = ConsumerId::new(1).expect("non-zero");
//! let mut updates = hub.attach(tab);
//! relay.register(tab).await;
//!
//! while let Some(message) = updates.recv().await {
//!     println!("{message:?}");
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::config::ConfigResolver;
use crate::error::{Error, Result};
use crate::identifiers::{AttemptId, ConsumerId};
use crate::protocol::{ConsumerMessage, OutboundRequest, OutboundResult};
use crate::router::RequestRouter;
use crate::transport::{StreamConnection, TransportEvent};

use super::builder::RelayBuilder;
use super::dispatcher::Dispatcher;
use super::reconnect::{ReconnectPolicy, RetryState};
use super::registry::ConsumerRegistry;

// ============================================================================
// Types
// ============================================================================

/// Lifecycle state of the streaming connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection exists.
    #[default]
    Disconnected,
    /// An attempt is in progress.
    Connecting,
    /// The stream is open and delivering events.
    Connected,
    /// The relay closed the stream and is waiting for it to end.
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayStatus {
    /// Connection state.
    pub state: ConnectionState,
    /// Registered consumers in registration order.
    pub consumers: Vec<ConsumerId>,
    /// Whether a reconnection is scheduled.
    pub retry_pending: bool,
    /// Consecutive failed attempts since the last connect.
    pub attempt: u32,
}

/// Commands sent from [`Relay`] handles to the actor.
enum RelayCommand {
    Register {
        consumer: ConsumerId,
        reply: oneshot::Sender<bool>,
    },
    Deregister {
        consumer: ConsumerId,
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<RelayStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ============================================================================
// Relay
// ============================================================================

/// Shared state behind every [`Relay`] clone.
struct RelayInner {
    command_tx: mpsc::UnboundedSender<RelayCommand>,
    router: RequestRouter,
    resolver: ConfigResolver,
}

/// Handle to the background relay.
///
/// Cheap to clone. The actor stops when [`Relay::shutdown`] is called or
/// the last handle is dropped.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("running", &!self.inner.command_tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl Relay {
    /// Creates a builder for configuring the relay.
    #[inline]
    #[must_use]
    pub fn builder() -> RelayBuilder {
        RelayBuilder::new()
    }

    /// Starts the actor task. Must be called inside a tokio runtime.
    pub(crate) fn spawn(
        resolver: ConfigResolver,
        dispatcher: Dispatcher,
        policy: ReconnectPolicy,
        router: RequestRouter,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let actor = RelayActor::new(resolver.clone(), dispatcher, policy, command_rx);

        tokio::spawn(actor.run());

        Self {
            inner: Arc::new(RelayInner {
                command_tx,
                router,
                resolver,
            }),
        }
    }

    /// Registers interest in live updates.
    ///
    /// Idempotent. The first registration opens the connection; a
    /// registration while connected immediately receives a `connected`
    /// status. Returns `true` if the consumer was newly added, and
    /// `false` if it was already registered or the relay has stopped.
    pub async fn register(&self, consumer: ConsumerId) -> bool {
        let (reply, rx) = oneshot::channel();
        self.request(RelayCommand::Register { consumer, reply }, rx)
            .await
            .unwrap_or(false)
    }

    /// Deregisters interest.
    ///
    /// Idempotent. Removing the last consumer closes the connection and
    /// cancels any pending retry. Returns `true` if the consumer was
    /// registered.
    pub async fn deregister(&self, consumer: ConsumerId) -> bool {
        let (reply, rx) = oneshot::channel();
        self.request(RelayCommand::Deregister { consumer, reply }, rx)
            .await
            .unwrap_or(false)
    }

    /// Returns a snapshot of the relay state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RelayStopped`] after shutdown.
    pub async fn status(&self) -> Result<RelayStatus> {
        let (reply, rx) = oneshot::channel();
        self.request(RelayCommand::Status { reply }, rx).await
    }

    /// Returns the connection state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RelayStopped`] after shutdown.
    pub async fn state(&self) -> Result<ConnectionState> {
        Ok(self.status().await?.state)
    }

    /// Executes an outbound request over the request channel.
    ///
    /// Independent of the connection state.
    pub async fn submit(&self, request: OutboundRequest) -> OutboundResult {
        self.inner.router.submit(request).await
    }

    /// Returns the request router.
    #[inline]
    #[must_use]
    pub fn router(&self) -> &RequestRouter {
        &self.inner.router
    }

    /// Returns the configuration resolver.
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &ConfigResolver {
        &self.inner.resolver
    }

    /// Returns `true` until the actor has stopped.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.inner.command_tx.is_closed()
    }

    /// Closes the connection, cancels any retry and stops the actor.
    ///
    /// Idempotent.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        let _ = self.request(RelayCommand::Shutdown { reply }, rx).await;
    }

    async fn request<T>(&self, command: RelayCommand, rx: oneshot::Receiver<T>) -> Result<T> {
        self.inner
            .command_tx
            .send(command)
            .map_err(|_| Error::RelayStopped)?;
        rx.await.map_err(|_| Error::RelayStopped)
    }
}

// ============================================================================
// RelayActor
// ============================================================================

/// Exclusive owner of the registry, connection and retry state.
struct RelayActor {
    resolver: ConfigResolver,
    dispatcher: Dispatcher,
    policy: ReconnectPolicy,
    registry: ConsumerRegistry,
    state: ConnectionState,
    connection: Option<StreamConnection>,
    attempt_id: AttemptId,
    retry: RetryState,
    command_rx: mpsc::UnboundedReceiver<RelayCommand>,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl RelayActor {
    fn new(
        resolver: ConfigResolver,
        dispatcher: Dispatcher,
        policy: ReconnectPolicy,
        command_rx: mpsc::UnboundedReceiver<RelayCommand>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();

        Self {
            resolver,
            dispatcher,
            policy,
            registry: ConsumerRegistry::new(),
            state: ConnectionState::Disconnected,
            connection: None,
            attempt_id: AttemptId::default(),
            retry: RetryState::default(),
            command_rx,
            transport_tx,
            transport_rx,
        }
    }

    async fn run(mut self) {
        debug!("Relay started");

        loop {
            let deadline = self.retry.deadline();

            tokio::select! {
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        self.stop();
                        break;
                    };
                    if self.handle_command(command).await.is_break() {
                        break;
                    }
                }

                Some(event) = self.transport_rx.recv() => self.handle_transport(event).await,

                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_retry().await;
                }
            }
        }

        debug!("Relay stopped");
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn handle_command(&mut self, command: RelayCommand) -> ControlFlow<()> {
        match command {
            RelayCommand::Register { consumer, reply } => {
                let added = self.register(consumer).await;
                let _ = reply.send(added);
            }

            RelayCommand::Deregister { consumer, reply } => {
                let removed = self.deregister(consumer);
                let _ = reply.send(removed);
            }

            RelayCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }

            RelayCommand::Shutdown { reply } => {
                self.stop();
                // Later handles see the relay as stopped before the reply lands.
                self.command_rx.close();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    async fn register(&mut self, consumer: ConsumerId) -> bool {
        let added = self.registry.insert(consumer);
        if added {
            debug!(%consumer, consumers = self.registry.len(), "Consumer registered");
        }

        if self.state == ConnectionState::Connected {
            let delivered = self.dispatcher.deliver_one(
                &mut self.registry,
                consumer,
                &ConsumerMessage::connected(),
            );
            if !delivered && self.registry.is_empty() {
                self.close_connection();
            }
            return added && delivered;
        }

        self.ensure_connected().await;
        added
    }

    fn deregister(&mut self, consumer: ConsumerId) -> bool {
        let removed = self.registry.remove(consumer);
        if removed {
            debug!(%consumer, consumers = self.registry.len(), "Consumer deregistered");
            if self.registry.is_empty() {
                self.close_connection();
            }
        }
        removed
    }

    fn status(&self) -> RelayStatus {
        RelayStatus {
            state: self.state,
            consumers: self.registry.snapshot(),
            retry_pending: self.retry.is_pending(),
            attempt: self.retry.attempt(),
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    async fn handle_transport(&mut self, event: TransportEvent) {
        if event.attempt() != self.attempt_id || self.connection.is_none() {
            trace!(attempt = %event.attempt(), current = %self.attempt_id, "Ignoring stale transport event");
            return;
        }

        match event {
            TransportEvent::Opened { attempt } => {
                if self.state != ConnectionState::Connecting {
                    return;
                }
                info!(%attempt, consumers = self.registry.len(), "Relay connected");
                self.state = ConnectionState::Connected;
                self.retry.reset();
                self.broadcast(&ConsumerMessage::connected());
            }

            TransportEvent::Message { event, .. } => {
                if self.state == ConnectionState::Connected {
                    self.broadcast(&ConsumerMessage::event(event));
                }
            }

            TransportEvent::Closed { attempt, reason } => {
                self.connection = None;

                if self.state == ConnectionState::Disconnecting {
                    debug!(%attempt, "Connection closed by relay");
                    self.state = ConnectionState::Disconnected;
                    self.ensure_connected().await;
                } else {
                    self.connection_lost(reason);
                }
            }
        }
    }

    /// Opens a connection if consumers are waiting and nothing is in flight.
    async fn ensure_connected(&mut self) {
        if self.registry.is_empty() || self.connection.is_some() || self.retry.is_pending() {
            return;
        }
        self.open().await;
    }

    /// Starts a new attempt against a freshly resolved endpoint.
    async fn open(&mut self) {
        self.attempt_id = self.attempt_id.next();
        self.state = ConnectionState::Connecting;

        let endpoint = self.resolver.resolve().await;
        debug!(attempt = %self.attempt_id, %endpoint, "Connecting");

        match StreamConnection::open(&endpoint, self.attempt_id, self.transport_tx.clone()) {
            Ok(connection) => self.connection = Some(connection),
            Err(e) => self.connection_lost(format!("WebSocket connection error: {e}")),
        }
    }

    /// Handles an unexpected end of the connection.
    fn connection_lost(&mut self, reason: String) {
        warn!(attempt = %self.attempt_id, %reason, "Connection lost");

        self.state = ConnectionState::Disconnected;
        self.broadcast(&ConsumerMessage::disconnected(reason));

        if self.registry.is_empty() {
            return;
        }

        if let Some(delay) = self.retry.arm(Instant::now(), &self.policy) {
            info!(
                attempt = self.retry.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Reconnect scheduled"
            );
        }
    }

    async fn fire_retry(&mut self) {
        if !self.retry.fire() {
            return;
        }
        debug!(attempt = self.retry.attempt(), "Retry timer fired");
        self.ensure_connected().await;
    }

    /// Closes the connection because no consumer is left.
    fn close_connection(&mut self) {
        self.retry.reset();

        match &self.connection {
            Some(connection) => {
                info!(attempt = %connection.attempt(), "Last consumer gone, closing connection");
                connection.close();
                self.state = ConnectionState::Disconnecting;
            }
            None => self.state = ConnectionState::Disconnected,
        }
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Fans a message out; closes the connection if pruning emptied the registry.
    fn broadcast(&mut self, message: &ConsumerMessage) {
        if self.registry.is_empty() {
            return;
        }

        let report = self.dispatcher.fan_out(&mut self.registry, message);

        if !report.pruned.is_empty() && self.registry.is_empty() {
            self.close_connection();
        }
    }

    fn stop(&mut self) {
        self.registry.clear();
        self.retry.reset();
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.state = ConnectionState::Disconnected;
    }
}

// ============================================================================
// Tests
// ============================================================================
