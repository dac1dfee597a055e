//! # PubSub Mux
//!
//! A topic-subscription multiplexer that lets many independent logical
//! subscribers share a single upstream MQTT connection.
//!
//! ## Features
//!
//! - **Subscription De-duplication**: One upstream subscribe per topic,
//!   regardless of how many local listeners share it
//! - **Decode-once Fanout**: Each incoming message is decoded once and
//!   delivered to every interested listener, in subscription order
//! - **Resilient Decoding**: Non-JSON payloads degrade to raw text
//!   instead of failing dispatch
//! - **Pluggable Policies**: Trigger-to-topic transform, option
//!   resolvers and subscription hooks with sensible defaults
//! - **Graceful Shutdown**: Active topics are unsubscribed upstream
//!   before the connection terminates
//! - **Async/Await Support**: Built on top of `tokio`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pubsub_mux::{DecodedPayload, ListenerError, PubSub};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One broker connection, shared by all subscriptions
//!     let (client, connection) =
//!         PubSub::connect("mqtt://localhost:1883?client_id=mux").await?;
//!
//!     // Two listeners on the same trigger: one upstream subscribe
//!     let id_a = client
//!         .subscribe("chat", |topic: &str, payload: &DecodedPayload|
//!             -> Result<(), ListenerError> {
//!             println!("a: {topic}: {payload:?}");
//!             Ok(())
//!         })
//!         .await?;
//!     let id_b = client
//!         .subscribe("chat", |_topic: &str, payload: &DecodedPayload|
//!             -> Result<(), ListenerError> {
//!             println!("b: {payload:?}");
//!             Ok(())
//!         })
//!         .await?;
//!
//!     // Fire-and-forget publish, JSON-encoded
//!     client.publish("chat", &serde_json::json!({"text": "hi"})).await;
//!
//!     // The upstream unsubscribe happens only after the last local
//!     // listener is gone
//!     client.unsubscribe(id_a).await?;
//!     client.unsubscribe(id_b).await?;
//!
//!     connection.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Transports
//!
//! The multiplexer drives the [`Transport`] trait rather than a broker
//! client directly. Implement it to run the core over a different
//! transport, or over a mock in tests; feed incoming raw messages into
//! [`PubSub::multiplexer_handle`].

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

// Core modules
pub mod client;
pub mod connection;
/// Listener callbacks invoked on message fanout
pub mod listener;
pub mod payload;
/// Caller-supplied policies and hooks
pub mod policy;
pub mod routing;
pub mod transport;

// === Core Public API ===
// Main client types
pub use client::{ClientSettings, PubSub, PubSubConfig, PubSubError};
pub use connection::PubSubConnection;
// Listener and payload types
pub use listener::{ListenerError, MessageListener};
pub use payload::DecodedPayload;
// Policy surface
pub use policy::{PubSubPolicies, SubscribeOptions};
// Subscription identifiers
pub use routing::SubscriptionId;
// Transport capability
pub use transport::mqtt::MqttTransport;
pub use transport::{
	PublishConfig, QosLevel, SubscribeAck, SubscriptionConfig, Transport,
	TransportError,
};

// Essential external types
pub use arcstr::ArcStr;

/// Result type alias for operations that may fail with PubSubError
pub type Result<T> = std::result::Result<T, PubSubError>;

/// Prelude module for convenient imports
///
/// This module provides the most commonly used types for typical
/// pub/sub applications:
///
/// ```rust
/// use pubsub_mux::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for most pub/sub applications

	pub use crate::{
		DecodedPayload, ListenerError, MessageListener, PubSub, PubSubConfig,
		PubSubConnection, PubSubError, QosLevel, Result, SubscriptionId,
	};
}

/// Advanced types and utilities for complex use cases
///
/// This module contains types that are useful for advanced scenarios:
/// - Custom transports and policies
/// - Direct access to the multiplexer task
/// - Internal bookkeeping structures
pub mod advanced {
	//! Advanced types for complex use cases

	pub use crate::policy::{
		ConnectionObserver, DefaultPublishOptions, DefaultSubscribeOptions,
		IdentityTransform, LogConnectionObserver, NoopSubscribeObserver,
		PublishOptionsResolver, SubscribeObserver, SubscribeOptionsResolver,
		TriggerTransform,
	};
	pub use crate::routing::{
		MultiplexerActor, MultiplexerController, MultiplexerHandle,
		SubscribeOutcome, SubscriptionTable, TopicInterest,
	};
	pub use crate::transport::{
		PublishConfig, SubscribeAck, SubscriptionConfig, Transport,
	};
}

/// Error types used throughout the library
///
/// Re-exports all error types in one convenient location for error
/// handling.
pub mod errors {
	//! All error types used in the library

	pub use crate::policy::OptionResolutionError;
	pub use crate::routing::{
		RegistryError, SendError, SubscribeError, UnsubscribeError,
	};
	pub use crate::{ListenerError, PubSubError, TransportError};
}
