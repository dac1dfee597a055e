use rumqttc::OptionError;

use crate::policy::OptionResolutionError;
use crate::routing::{SubscribeError, UnsubscribeError};
use crate::transport::TransportError;

/// Errors that can occur in pub/sub client operations
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
	/// Configuration errors when parsing connection options
	#[error("Configuration error: {0}")]
	Configuration(#[from] OptionError),

	/// An option resolver rejected a subscribe or publish call
	#[error("Option resolution failed: {0}")]
	OptionResolution(#[from] OptionResolutionError),

	/// Subscription management errors
	#[error("Subscribe failed: {0}")]
	Subscribe(#[from] SubscribeError),

	/// Unsubscribe errors, including unknown subscription ids
	#[error("Unsubscribe failed: {0}")]
	Unsubscribe(#[from] UnsubscribeError),

	/// Transport-level errors
	#[error("Transport error: {0}")]
	Transport(#[from] TransportError),
}
