//! Application-facing pub/sub client
//!
//! This module provides the high-level API: connecting to a broker,
//! subscribing listeners by trigger name, unsubscribing by id and
//! fire-and-forget publishing.

pub mod config;
/// Client error types
pub mod error;
pub mod pubsub;

// Re-export commonly used types for convenience
pub use config::{ClientSettings, PubSubConfig};
pub use error::PubSubError;
pub use pubsub::PubSub;

// Connection type is available from the root level
// Use: pubsub_mux::PubSubConnection
