//! Caller-supplied policies: trigger mapping, option resolution, hooks
//!
//! The original duck-typed resolver functions are modeled as explicit
//! capability traits with documented defaults. All of them are optional
//! for callers; [`PubSubPolicies::default`] wires in the defaults.

use std::sync::Arc;

use arcstr::ArcStr;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use crate::routing::SubscriptionId;
use crate::transport::{
	PublishConfig, QosLevel, SubscribeAck, SubscriptionConfig, TransportError,
};

/// Per-call options accepted by `subscribe`.
///
/// Passed through to the trigger transform and the subscribe-options
/// resolver; the core itself only forwards them.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
	/// Requested quality-of-service override for this subscription.
	pub qos: Option<QosLevel>,
}

/// Error returned by an option resolver.
#[derive(Debug, Error)]
#[error("option resolution failed: {reason}")]
pub struct OptionResolutionError {
	/// Resolver-supplied description of the failure.
	reason: String,
}

impl OptionResolutionError {
	/// Create a resolution error with the given reason.
	pub fn new(reason: impl Into<String>) -> Self {
		Self {
			reason: reason.into(),
		}
	}
}

/// Maps a caller-facing trigger name to the transport topic string.
pub trait TriggerTransform: Send + Sync {
	/// Resolve the topic a trigger maps to.
	///
	/// `options` carries the subscribe call's options when invoked on
	/// the subscribe path; publishes pass `None`.
	fn topic_for(
		&self,
		trigger: &str,
		options: Option<&SubscribeOptions>,
	) -> ArcStr;
}

/// Default transform: the trigger string is used verbatim as the topic.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl TriggerTransform for IdentityTransform {
	fn topic_for(
		&self,
		trigger: &str,
		_options: Option<&SubscribeOptions>,
	) -> ArcStr {
		ArcStr::from(trigger)
	}
}

/// Resolves the upstream subscribe options for a subscribe call.
#[async_trait]
pub trait SubscribeOptionsResolver: Send + Sync {
	/// Produce the transport-level subscription options.
	///
	/// A failure aborts the subscribe call before any state is touched.
	async fn resolve(
		&self,
		trigger: &str,
		options: &SubscribeOptions,
	) -> Result<SubscriptionConfig, OptionResolutionError>;
}

/// Default resolver: honors the per-call QoS override, otherwise the
/// transport default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSubscribeOptions;

#[async_trait]
impl SubscribeOptionsResolver for DefaultSubscribeOptions {
	async fn resolve(
		&self,
		_trigger: &str,
		options: &SubscribeOptions,
	) -> Result<SubscriptionConfig, OptionResolutionError> {
		Ok(SubscriptionConfig {
			qos: options.qos.unwrap_or_default(),
		})
	}
}

/// Resolves the upstream publish options for a publish call.
#[async_trait]
pub trait PublishOptionsResolver: Send + Sync {
	/// Produce the transport-level publish options for a serialized
	/// payload about to be published on `trigger`.
	async fn resolve(
		&self,
		trigger: &str,
		payload: &[u8],
	) -> Result<PublishConfig, OptionResolutionError>;
}

/// Default resolver: transport defaults, no retain.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPublishOptions;

#[async_trait]
impl PublishOptionsResolver for DefaultPublishOptions {
	async fn resolve(
		&self,
		_trigger: &str,
		_payload: &[u8],
	) -> Result<PublishConfig, OptionResolutionError> {
		Ok(PublishConfig::default())
	}
}

/// Hook invoked after a first-subscribe is acknowledged upstream.
///
/// Fire-and-forget: the subscribe call's result does not depend on it.
pub trait SubscribeObserver: Send + Sync {
	/// Called with the new subscription id and the broker's
	/// acknowledgment details.
	fn on_subscribe(&self, id: SubscriptionId, ack: &SubscribeAck);
}

/// Default observer: does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSubscribeObserver;

impl SubscribeObserver for NoopSubscribeObserver {
	fn on_subscribe(&self, _id: SubscriptionId, _ack: &SubscribeAck) {}
}

/// Hook surfacing transport connection events.
///
/// Connection errors do not tear down subscription state; reconnection
/// policy belongs to the caller.
pub trait ConnectionObserver: Send + Sync {
	/// Called when the transport reports a live connection.
	fn on_connected(&self) {}

	/// Called for each transport-level connection error.
	fn on_error(&self, _error: &TransportError) {}
}

/// Default observer: logs connection events via `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConnectionObserver;

impl ConnectionObserver for LogConnectionObserver {
	fn on_connected(&self) {
		info!("Transport connected");
	}

	fn on_error(&self, error: &TransportError) {
		error!(error = %error, "Transport connection error");
	}
}

/// Bundle of all caller-supplied policies.
#[derive(Clone)]
pub struct PubSubPolicies {
	/// Trigger-to-topic mapping.
	pub trigger_transform: Arc<dyn TriggerTransform>,
	/// Subscribe-options resolution.
	pub subscribe_options: Arc<dyn SubscribeOptionsResolver>,
	/// Publish-options resolution.
	pub publish_options: Arc<dyn PublishOptionsResolver>,
	/// Subscribe-observed hook.
	pub subscribe_observer: Arc<dyn SubscribeObserver>,
	/// Connection event hook.
	pub connection_observer: Arc<dyn ConnectionObserver>,
}

impl Default for PubSubPolicies {
	fn default() -> Self {
		Self {
			trigger_transform: Arc::new(IdentityTransform),
			subscribe_options: Arc::new(DefaultSubscribeOptions),
			publish_options: Arc::new(DefaultPublishOptions),
			subscribe_observer: Arc::new(NoopSubscribeObserver),
			connection_observer: Arc::new(LogConnectionObserver),
		}
	}
}

impl PubSubPolicies {
	/// Replace the trigger transform.
	pub fn with_trigger_transform(
		mut self,
		transform: impl TriggerTransform + 'static,
	) -> Self {
		self.trigger_transform = Arc::new(transform);
		self
	}

	/// Replace the subscribe-options resolver.
	pub fn with_subscribe_options(
		mut self,
		resolver: impl SubscribeOptionsResolver + 'static,
	) -> Self {
		self.subscribe_options = Arc::new(resolver);
		self
	}

	/// Replace the publish-options resolver.
	pub fn with_publish_options(
		mut self,
		resolver: impl PublishOptionsResolver + 'static,
	) -> Self {
		self.publish_options = Arc::new(resolver);
		self
	}

	/// Replace the subscribe-observed hook.
	pub fn with_subscribe_observer(
		mut self,
		observer: impl SubscribeObserver + 'static,
	) -> Self {
		self.subscribe_observer = Arc::new(observer);
		self
	}

	/// Replace the connection event hook.
	pub fn with_connection_observer(
		mut self,
		observer: impl ConnectionObserver + 'static,
	) -> Self {
		self.connection_observer = Arc::new(observer);
		self
	}
}
