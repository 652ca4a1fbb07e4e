//! Registry of consumers interested in live updates.
//!
//! Membership is a set; insertion order is kept for diagnostics only.
//! The relay keeps the streaming connection alive exactly while the
//! registry is non-empty.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashSet;

use crate::identifiers::ConsumerId;

// ============================================================================
// ConsumerRegistry
// ============================================================================

/// Set of registered consumers, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ConsumerRegistry {
    /// Membership index.
    members: FxHashSet<ConsumerId>,
    /// Insertion order.
    order: Vec<ConsumerId>,
}

impl ConsumerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a consumer; returns `true` if it was not registered.
    pub fn insert(&mut self, consumer: ConsumerId) -> bool {
        if !self.members.insert(consumer) {
            return false;
        }
        self.order.push(consumer);
        true
    }

    /// Removes a consumer; returns `true` if it was registered.
    pub fn remove(&mut self, consumer: ConsumerId) -> bool {
        if !self.members.remove(&consumer) {
            return false;
        }
        self.order.retain(|c| *c != consumer);
        true
    }

    /// Removes every consumer in `gone`; returns how many were removed.
    pub fn remove_all(&mut self, gone: &[ConsumerId]) -> usize {
        let before = self.members.len();
        for consumer in gone {
            self.members.remove(consumer);
        }
        self.order.retain(|c| self.members.contains(c));
        before - self.members.len()
    }

    /// Returns `true` if the consumer is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, consumer: ConsumerId) -> bool {
        self.members.contains(&consumer)
    }

    /// Number of registered consumers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if no consumer is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Registered consumers in insertion order.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConsumerId> {
        self.order.clone()
    }

    /// Iterates consumers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = ConsumerId> + '_ {
        self.order.iter().copied()
    }

    /// Removes every consumer.
    pub fn clear(&mut self) {
        self.members.clear();
        self.order.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
