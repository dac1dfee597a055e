use std::sync::Arc;

use rumqttc::AsyncClient;
use tracing::error;

use super::config::{ClientSettings, PubSubConfig};
use super::error::PubSubError;
use crate::connection::PubSubConnection;
use crate::listener::MessageListener;
use crate::policy::{PubSubPolicies, SubscribeOptions};
use crate::routing::{
	MultiplexerActor, MultiplexerController, MultiplexerHandle,
	SubscriptionId,
};
use crate::transport::mqtt::{drive_event_loop, MqttTransport};
use crate::transport::Transport;

/// Application-facing pub/sub client.
///
/// Many logical subscribers share the single upstream connection held
/// by the transport; the client de-duplicates upstream subscriptions
/// per topic and fans incoming messages out to every interested
/// listener.
#[derive(Clone)]
pub struct PubSub<C> {
	transport: C,
	multiplexer: MultiplexerHandle,
	policies: Arc<PubSubPolicies>,
}

impl PubSub<MqttTransport> {
	/// Connect to an MQTT broker by URL with default policies.
	pub async fn connect(
		url: &str,
	) -> Result<(Self, PubSubConnection), PubSubError> {
		Self::connect_with_config(
			PubSubConfig::from_url(url)?,
			PubSubPolicies::default(),
		)
		.await
	}

	/// Connect to an MQTT broker with explicit configuration and
	/// policies.
	///
	/// Spawns the multiplexer task and the broker event loop; the
	/// returned [`PubSubConnection`] owns both and must be shut down
	/// gracefully.
	pub async fn connect_with_config(
		config: PubSubConfig,
		policies: PubSubPolicies,
	) -> Result<(Self, PubSubConnection), PubSubError> {
		let mut options = config.connection;
		options.set_keep_alive(config.settings.keep_alive);
		let (client, event_loop) =
			AsyncClient::new(options, config.settings.event_loop_capacity);

		let transport = MqttTransport::new(client.clone());
		let (controller, handle) = MultiplexerActor::spawn(
			transport.clone(),
			config.settings.command_channel_capacity,
		);

		let event_loop_handle = tokio::spawn(drive_event_loop(
			event_loop,
			handle.clone(),
			policies.connection_observer.clone(),
		));

		let pubsub = Self {
			transport,
			multiplexer: handle,
			policies: Arc::new(policies),
		};
		let connection =
			PubSubConnection::new(client, controller, event_loop_handle);
		Ok((pubsub, connection))
	}
}

impl<C> PubSub<C>
where C: Transport + Clone
{
	/// Build a client over a custom transport.
	///
	/// The caller is responsible for feeding incoming raw messages into
	/// [`PubSub::multiplexer_handle`] and for shutting down the
	/// returned controller.
	pub fn with_transport(
		transport: C,
		settings: &ClientSettings,
		policies: PubSubPolicies,
	) -> (Self, MultiplexerController) {
		let (controller, handle) = MultiplexerActor::spawn(
			transport.clone(),
			settings.command_channel_capacity,
		);
		let pubsub = Self {
			transport,
			multiplexer: handle,
			policies: Arc::new(policies),
		};
		(pubsub, controller)
	}

	/// Handle for injecting raw transport messages into the dispatch
	/// path. The MQTT event loop uses the same entry point.
	pub fn multiplexer_handle(&self) -> MultiplexerHandle {
		self.multiplexer.clone()
	}

	/// Subscribe a listener to a trigger with default options.
	///
	/// Returns the new subscription id. Only the first subscription
	/// per topic reaches the broker; later ones attach locally.
	pub async fn subscribe(
		&self,
		trigger: &str,
		listener: impl MessageListener,
	) -> Result<SubscriptionId, PubSubError> {
		self.subscribe_with_options(
			trigger,
			listener,
			SubscribeOptions::default(),
		)
		.await
	}

	/// Subscribe a listener to a trigger with per-call options.
	///
	/// Option resolution happens before anything is allocated, so a
	/// resolver failure leaves no trace.
	pub async fn subscribe_with_options(
		&self,
		trigger: &str,
		listener: impl MessageListener,
		options: SubscribeOptions,
	) -> Result<SubscriptionId, PubSubError> {
		let topic = self
			.policies
			.trigger_transform
			.topic_for(trigger, Some(&options));
		let config = self
			.policies
			.subscribe_options
			.resolve(trigger, &options)
			.await?;

		let outcome = self
			.multiplexer
			.subscribe(topic, Arc::new(listener), config)
			.await?;

		// Subscribe-observed hook: fire-and-forget, first-subscribe
		// acknowledgments only.
		if let Some(ack) = outcome.ack {
			self.policies
				.subscribe_observer
				.on_subscribe(outcome.id, &ack);
		}
		Ok(outcome.id)
	}

	/// Remove the subscription with the given id.
	///
	/// Fails with an unknown-subscription error for ids that were never
	/// allocated or were already unsubscribed.
	pub async fn unsubscribe(
		&self,
		id: SubscriptionId,
	) -> Result<(), PubSubError> {
		self.multiplexer.unsubscribe(id).await.map_err(Into::into)
	}

	/// Publish a payload on a trigger, JSON-encoded.
	///
	/// Fire-and-forget: always reports success; serialization,
	/// resolution and transport failures are logged. Delivery
	/// acknowledgment belongs to the transport layer.
	pub async fn publish<T>(&self, trigger: &str, payload: &T) -> bool
	where T: serde::Serialize {
		let topic = self.policies.trigger_transform.topic_for(trigger, None);
		let bytes = match serde_json::to_vec(payload) {
			| Ok(bytes) => bytes,
			| Err(err) => {
				error!(
					trigger = %trigger,
					error = %err,
					"Failed to serialize publish payload"
				);
				return true;
			}
		};
		let config = match self
			.policies
			.publish_options
			.resolve(trigger, &bytes)
			.await
		{
			| Ok(config) => config,
			| Err(err) => {
				error!(
					trigger = %trigger,
					error = %err,
					"Publish option resolution failed"
				);
				return true;
			}
		};
		if let Err(err) =
			self.transport.publish(topic.as_str(), bytes, &config).await
		{
			error!(
				topic = %topic,
				error = %err,
				"Failed to publish to upstream topic"
			);
		}
		true
	}
}
