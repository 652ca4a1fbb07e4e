//! Connection relay.
//!
//! Multiplexes one streaming connection across many UI consumers.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Relay`] | Handle to the relay state machine |
//! | [`RelayBuilder`] | Fluent configuration |
//! | [`ConsumerRegistry`] | Consumers interested in live updates |
//! | [`Dispatcher`] | Fan-out with prune-on-failure |
//! | [`ConsumerChannel`] | Delivery path to UI surfaces |
//! | [`ReconnectPolicy`] | Retry timing after unexpected disconnects |

// ============================================================================
// Submodules
// ============================================================================

/// Relay builder.
pub mod builder;

/// Relay handle and state machine.
pub mod core;

/// Consumer delivery and fan-out.
pub mod dispatcher;

/// Reconnection policy and retry state.
pub mod reconnect;

/// Consumer registry.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::RelayBuilder;
pub use core::{ConnectionState, Relay, RelayStatus};
pub use dispatcher::{ChannelHub, ConsumerChannel, DispatchReport, Dispatcher};
pub use reconnect::{DEFAULT_RETRY_DELAY, ReconnectPolicy, RetryState};
pub use registry::ConsumerRegistry;
