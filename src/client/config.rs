//! Configuration for pub/sub client initialization

use std::time::Duration;

use rumqttc::{MqttOptions, OptionError};

/// Client-level performance and behavior settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
	/// Keep-alive interval for the broker connection
	pub keep_alive: Duration,
	/// Capacity of the broker event loop channel
	pub event_loop_capacity: usize,
	/// Capacity of the command channel for the multiplexer task
	pub command_channel_capacity: usize,
}

impl Default for ClientSettings {
	fn default() -> Self {
		Self {
			keep_alive: Duration::from_secs(10),
			event_loop_capacity: 10,
			command_channel_capacity: 100,
		}
	}
}

/// Configuration for pub/sub client creation
#[derive(Debug, Clone)]
pub struct PubSubConfig {
	/// Underlying MQTT connection options (from rumqttc)
	pub connection: MqttOptions,
	/// Client-level performance and behavior settings
	pub settings: ClientSettings,
}

impl PubSubConfig {
	/// Create new config with common defaults
	///
	/// # Arguments
	/// * `client_id` - Unique identifier for this client
	/// * `host` - Broker hostname or IP address
	/// * `port` - Broker port number
	pub fn new(client_id: &str, host: &str, port: u16) -> Self {
		Self {
			connection: MqttOptions::new(client_id, host, port),
			settings: ClientSettings::default(),
		}
	}

	/// Parse configuration from URL string
	///
	/// Supports URLs with protocols: tcp://, mqtt://, ssl://, mqtts://,
	/// ws://, wss://
	///
	/// # Arguments
	/// * `url` - Broker URL (e.g., "mqtt://localhost:1883?client_id=mux")
	pub fn from_url(url: &str) -> Result<Self, OptionError> {
		Ok(Self {
			connection: MqttOptions::parse_url(url)?,
			settings: ClientSettings::default(),
		})
	}

	/// Convenience method for localhost development
	pub fn localhost(client_id: &str) -> Self {
		Self::new(client_id, "localhost", 1883)
	}
}
