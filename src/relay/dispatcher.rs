//! Fan-out of relay messages to registered consumers.
//!
//! Delivery is capability-checked: attempt it, and treat failure as the
//! consumer being gone. Gone consumers are pruned from the registry after
//! the pass, so one failure never interrupts delivery to the rest.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::ConsumerId;
use crate::protocol::ConsumerMessage;

use super::registry::ConsumerRegistry;

// ============================================================================
// ConsumerChannel
// ============================================================================

/// Delivery path to UI surfaces.
///
/// Implementations must not block: a slow consumer may not hold up
/// delivery to the others.
pub trait ConsumerChannel: Send + Sync {
    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConsumerGone`] when the surface no longer exists.
    fn deliver(&self, consumer: ConsumerId, message: &ConsumerMessage) -> Result<()>;
}

// ============================================================================
// ChannelHub
// ============================================================================

/// In-process [`ConsumerChannel`] backed by one unbounded channel per consumer.
///
/// Dropping a receiver makes the consumer gone.
#[derive(Debug, Default)]
pub struct ChannelHub {
    senders: Mutex<FxHashMap<ConsumerId, mpsc::UnboundedSender<ConsumerMessage>>>,
}

impl ChannelHub {
    /// Creates an empty hub.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a consumer, replacing any previous receiver.
    pub fn attach(&self, consumer: ConsumerId) -> mpsc::UnboundedReceiver<ConsumerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().insert(consumer, tx);
        rx
    }

    /// Detaches a consumer; later deliveries to it fail.
    pub fn detach(&self, consumer: ConsumerId) {
        self.senders.lock().remove(&consumer);
    }

    /// Number of attached consumers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    /// Returns `true` if no consumer is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.senders.lock().is_empty()
    }
}

impl ConsumerChannel for ChannelHub {
    fn deliver(&self, consumer: ConsumerId, message: &ConsumerMessage) -> Result<()> {
        let mut senders = self.senders.lock();

        let Some(sender) = senders.get(&consumer) else {
            return Err(Error::consumer_gone(consumer));
        };

        if sender.send(message.clone()).is_err() {
            senders.remove(&consumer);
            return Err(Error::consumer_gone(consumer));
        }

        Ok(())
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Consumers that received the message.
    pub delivered: usize,
    /// Consumers pruned because delivery failed.
    pub pruned: Vec<ConsumerId>,
}

/// Delivers messages to every registered consumer.
#[derive(Clone)]
pub struct Dispatcher {
    channel: Arc<dyn ConsumerChannel>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher over a delivery channel.
    #[inline]
    #[must_use]
    pub fn new(channel: Arc<dyn ConsumerChannel>) -> Self {
        Self { channel }
    }

    /// Delivers `message` to every consumer registered right now.
    ///
    /// Consumers whose delivery fails are removed from `registry` after
    /// the pass.
    pub fn fan_out(
        &self,
        registry: &mut ConsumerRegistry,
        message: &ConsumerMessage,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for consumer in registry.iter() {
            match self.channel.deliver(consumer, message) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(%consumer, error = %e, "Delivery failed, pruning consumer");
                    report.pruned.push(consumer);
                }
            }
        }

        registry.remove_all(&report.pruned);

        trace!(
            delivered = report.delivered,
            pruned = report.pruned.len(),
            "Fan-out complete"
        );

        report
    }

    /// Delivers `message` to one registered consumer, pruning it on failure.
    ///
    /// Returns `true` if delivery succeeded.
    pub fn deliver_one(
        &self,
        registry: &mut ConsumerRegistry,
        consumer: ConsumerId,
        message: &ConsumerMessage,
    ) -> bool {
        match self.channel.deliver(consumer, message) {
            Ok(()) => true,
            Err(e) => {
                debug!(%consumer, error = %e, "Delivery failed, pruning consumer");
                registry.remove(consumer);
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
