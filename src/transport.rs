//! Transport capability used by the multiplexer
//!
//! The multiplexer never talks to a broker directly. It drives this
//! trait, which covers exactly the three upstream operations it needs:
//! subscribe, unsubscribe and publish. The production implementation
//! over `rumqttc` lives in [`mqtt`]; tests substitute their own.

use async_trait::async_trait;
use thiserror::Error;

pub mod mqtt;

/// Quality-of-service level requested for a subscription or publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QosLevel {
	/// Deliver at most once, no acknowledgment.
	AtMostOnce,
	/// Deliver at least once, acknowledged.
	#[default]
	AtLeastOnce,
	/// Deliver exactly once, handshaked.
	ExactlyOnce,
}

/// Options applied to an upstream subscribe request.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionConfig {
	/// Requested quality-of-service level.
	pub qos: QosLevel,
}

/// Options applied to an upstream publish.
#[derive(Debug, Clone, Default)]
pub struct PublishConfig {
	/// Quality-of-service level for the published message.
	pub qos: QosLevel,
	/// Whether the broker should retain the message for late joiners.
	pub retain: bool,
}

/// Confirmation data returned by a successful upstream subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeAck {
	/// Quality-of-service level the broker granted.
	pub granted_qos: QosLevel,
}

/// Errors surfaced by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
	/// A subscribe/unsubscribe/publish request could not be issued.
	#[error("transport request failed")]
	Request(#[source] Box<dyn std::error::Error + Send + Sync>),

	/// The underlying connection failed.
	#[error("transport connection failed")]
	Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

	/// The broker refused the operation.
	#[error("transport rejected operation: {0}")]
	Rejected(String),
}

impl TransportError {
	/// Wrap a request-level failure.
	pub fn request(
		err: impl std::error::Error + Send + Sync + 'static,
	) -> Self {
		Self::Request(Box::new(err))
	}

	/// Wrap a connection-level failure.
	pub fn connection(
		err: impl std::error::Error + Send + Sync + 'static,
	) -> Self {
		Self::Connection(Box::new(err))
	}

	/// Create a broker-refusal error.
	pub fn rejected(reason: impl Into<String>) -> Self {
		Self::Rejected(reason.into())
	}
}

/// Upstream publish/subscribe connection handle.
///
/// The multiplexer holds the only handle that issues subscribe,
/// unsubscribe and publish calls; message arrival is fed into it
/// separately (see [`crate::routing::MultiplexerHandle::dispatch`]).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
	/// Subscribe to `topic` upstream.
	///
	/// Resolves once the request is accepted, returning the broker's
	/// acknowledgment details.
	async fn subscribe(
		&self,
		topic: &str,
		config: &SubscriptionConfig,
	) -> Result<SubscribeAck, TransportError>;

	/// Unsubscribe from `topic` upstream. Fire-and-forget with respect
	/// to broker acknowledgment.
	async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

	/// Publish a raw payload on `topic`. Fire-and-forget with respect
	/// to broker acknowledgment.
	async fn publish(
		&self,
		topic: &str,
		payload: Vec<u8>,
		config: &PublishConfig,
	) -> Result<(), TransportError>;
}
