//! Listener callbacks invoked on message fanout

use crate::payload::DecodedPayload;

/// Opaque error a listener may return.
///
/// Listener failures are logged and isolated per listener; they never
/// stop delivery to the remaining listeners of a topic.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Callback invoked with every decoded message on a subscribed topic.
///
/// Invocations happen on the multiplexer task, in subscription order,
/// once per message. Implementations should hand heavy work off to
/// their own task or channel rather than blocking here.
pub trait MessageListener: Send + Sync + 'static {
	/// Handle one decoded message delivered on `topic`.
	fn on_message(
		&self,
		topic: &str,
		payload: &DecodedPayload,
	) -> Result<(), ListenerError>;
}

impl<F> MessageListener for F
where F: Fn(&str, &DecodedPayload) -> Result<(), ListenerError>
		+ Send
		+ Sync
		+ 'static
{
	fn on_message(
		&self,
		topic: &str,
		payload: &DecodedPayload,
	) -> Result<(), ListenerError> {
		self(topic, payload)
	}
}
