//! MQTT transport over `rumqttc`

use std::sync::Arc;
use std::time::Duration;

use rumqttc::Packet::{ConnAck, Disconnect, Publish};
use rumqttc::{AsyncClient, EventLoop};
use rumqttc::{Event::Incoming, Event::Outgoing};
use tokio::time;
use tracing::{debug, error, info, warn};

use super::{
	PublishConfig, QosLevel, SubscribeAck, SubscriptionConfig, Transport,
	TransportError,
};
use crate::policy::ConnectionObserver;
use crate::routing::MultiplexerHandle;

impl From<QosLevel> for rumqttc::QoS {
	fn from(qos: QosLevel) -> Self {
		match qos {
			| QosLevel::AtMostOnce => rumqttc::QoS::AtMostOnce,
			| QosLevel::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
			| QosLevel::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
		}
	}
}

/// [`Transport`] implementation over a shared `rumqttc` client.
///
/// Cloning is cheap; all clones issue requests on the same broker
/// connection.
#[derive(Clone)]
pub struct MqttTransport {
	client: AsyncClient,
}

impl MqttTransport {
	/// Wrap an existing `rumqttc` client.
	pub fn new(client: AsyncClient) -> Self {
		Self { client }
	}
}

#[async_trait::async_trait]
impl Transport for MqttTransport {
	async fn subscribe(
		&self,
		topic: &str,
		config: &SubscriptionConfig,
	) -> Result<SubscribeAck, TransportError> {
		self.client
			.subscribe(topic, config.qos.into())
			.await
			.map_err(TransportError::request)?;
		// rumqttc consumes the SUBACK in its event loop; the granted
		// level reported here echoes the requested one.
		Ok(SubscribeAck {
			granted_qos: config.qos,
		})
	}

	async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
		self.client
			.unsubscribe(topic)
			.await
			.map_err(TransportError::request)
	}

	async fn publish(
		&self,
		topic: &str,
		payload: Vec<u8>,
		config: &PublishConfig,
	) -> Result<(), TransportError> {
		self.client
			.publish(topic, config.qos.into(), config.retain, payload)
			.await
			.map_err(TransportError::request)
	}
}

/// Drive the broker event loop until disconnect.
///
/// Incoming publishes are forwarded into the multiplexer; connection
/// errors are reported to the observer and retried with exponential
/// backoff. The loop terminates naturally when a Disconnect packet is
/// seen in either direction.
pub(crate) async fn drive_event_loop(
	mut event_loop: EventLoop,
	multiplexer: MultiplexerHandle,
	observer: Arc<dyn ConnectionObserver>,
) {
	let mut error_count = 0;
	const MAX_CONSECUTIVE_ERRORS: u32 = 10;
	const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
	const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

	loop {
		match event_loop.poll().await {
			| Ok(Incoming(ConnAck(_))) => {
				error_count = 0;
				debug!("Broker connection acknowledged");
				observer.on_connected();
			}
			| Ok(Incoming(Publish(publish))) => {
				error_count = 0;
				debug!(
					topic = %publish.topic,
					payload_size = publish.payload.len(),
					"Received message"
				);
				if let Err(err) = multiplexer
					.dispatch(publish.topic, publish.payload)
					.await
				{
					error!(error = %err, "Failed to hand message to multiplexer");
				}
			}
			| Ok(Incoming(Disconnect)) => {
				info!("Received Disconnect packet from broker");
				break;
			}
			| Ok(Outgoing(rumqttc::Outgoing::Disconnect)) => {
				info!("Sent Disconnect packet to broker");
				break;
			}
			| Ok(notification) => {
				error_count = 0;
				debug!(notification = ?notification, "Broker notification");
			}
			| Err(err) => {
				error_count += 1;
				error!(error_count = error_count, error = %err, "Event loop error");
				observer.on_error(&TransportError::connection(err));

				if error_count >= MAX_CONSECUTIVE_ERRORS {
					error!(
						error_count = error_count,
						max_errors = MAX_CONSECUTIVE_ERRORS,
						"Too many consecutive errors, terminating event loop"
					);
					break;
				}

				let delay = INITIAL_RETRY_DELAY
					* 2_u32.pow((error_count - 1).min(10));
				let delay = delay.min(MAX_RETRY_DELAY);

				warn!(delay = ?delay, error_count = error_count, "Retrying broker connection");
				time::sleep(delay).await;
			}
		}
	}
	info!("Broker event loop terminated");
}
