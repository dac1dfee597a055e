//! Integration tests for the subscription multiplexer
//!
//! All tests run against a recording mock transport, so every upstream
//! subscribe/unsubscribe/publish the core issues is observable. The
//! multiplexer processes commands in order, which the `fence` helper
//! uses to wait for in-flight dispatches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use pubsub_mux::advanced::{
	SubscribeObserver, SubscribeOptionsResolver, TriggerTransform,
};
use pubsub_mux::errors::{
	OptionResolutionError, SubscribeError, UnsubscribeError,
};
use pubsub_mux::{
	ArcStr, ClientSettings, DecodedPayload, ListenerError, MessageListener,
	PubSub, PubSubError, PubSubPolicies, PublishConfig, QosLevel,
	SubscribeAck, SubscribeOptions, SubscriptionConfig, SubscriptionId,
	Transport, TransportError,
};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TransportCall {
	Subscribe(String),
	Unsubscribe(String),
	Publish(String, Vec<u8>),
}

/// Transport double recording every upstream call the core issues.
#[derive(Clone, Default)]
struct MockTransport {
	calls: Arc<Mutex<Vec<TransportCall>>>,
	fail_subscribe: Arc<AtomicBool>,
	fail_publish: Arc<AtomicBool>,
	subscribe_delay: Option<Duration>,
}

impl MockTransport {
	fn new() -> Self {
		Self::default()
	}

	fn with_subscribe_delay(delay: Duration) -> Self {
		Self {
			subscribe_delay: Some(delay),
			..Self::default()
		}
	}

	fn calls(&self) -> Vec<TransportCall> {
		self.calls.lock().unwrap().clone()
	}

	fn subscribe_count(&self, topic: &str) -> usize {
		self.calls()
			.iter()
			.filter(|call| {
				matches!(call, TransportCall::Subscribe(t) if t == topic)
			})
			.count()
	}

	fn unsubscribe_count(&self, topic: &str) -> usize {
		self.calls()
			.iter()
			.filter(|call| {
				matches!(call, TransportCall::Unsubscribe(t) if t == topic)
			})
			.count()
	}
}

#[async_trait]
impl Transport for MockTransport {
	async fn subscribe(
		&self,
		topic: &str,
		config: &SubscriptionConfig,
	) -> Result<SubscribeAck, TransportError> {
		if let Some(delay) = self.subscribe_delay {
			tokio::time::sleep(delay).await;
		}
		self.calls
			.lock()
			.unwrap()
			.push(TransportCall::Subscribe(topic.to_string()));
		if self.fail_subscribe.load(Ordering::SeqCst) {
			return Err(TransportError::rejected(
				"broker refused subscription",
			));
		}
		Ok(SubscribeAck {
			granted_qos: config.qos,
		})
	}

	async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
		self.calls
			.lock()
			.unwrap()
			.push(TransportCall::Unsubscribe(topic.to_string()));
		Ok(())
	}

	async fn publish(
		&self,
		topic: &str,
		payload: Vec<u8>,
		_config: &PublishConfig,
	) -> Result<(), TransportError> {
		self.calls
			.lock()
			.unwrap()
			.push(TransportCall::Publish(topic.to_string(), payload));
		if self.fail_publish.load(Ordering::SeqCst) {
			return Err(TransportError::rejected("broker refused publish"));
		}
		Ok(())
	}
}

/// Shared record of which listener saw which message, in order.
type FanoutLog = Arc<Mutex<Vec<(&'static str, String, DecodedPayload)>>>;

struct Recorder {
	label: &'static str,
	log: FanoutLog,
	fail: bool,
}

impl Recorder {
	fn new(label: &'static str, log: FanoutLog) -> Self {
		Self {
			label,
			log,
			fail: false,
		}
	}

	fn failing(label: &'static str, log: FanoutLog) -> Self {
		Self {
			label,
			log,
			fail: true,
		}
	}
}

impl MessageListener for Recorder {
	fn on_message(
		&self,
		topic: &str,
		payload: &DecodedPayload,
	) -> Result<(), ListenerError> {
		if self.fail {
			return Err(
				format!("{} refused the message", self.label).into()
			);
		}
		self.log.lock().unwrap().push((
			self.label,
			topic.to_string(),
			payload.clone(),
		));
		Ok(())
	}
}

/// Listener that records nothing; used by `fence`.
struct Quiet;

impl MessageListener for Quiet {
	fn on_message(
		&self,
		_topic: &str,
		_payload: &DecodedPayload,
	) -> Result<(), ListenerError> {
		Ok(())
	}
}

fn mux_client(
	transport: &MockTransport,
	policies: PubSubPolicies,
) -> (PubSub<MockTransport>, pubsub_mux::advanced::MultiplexerController) {
	PubSub::with_transport(
		transport.clone(),
		&ClientSettings::default(),
		policies,
	)
}

/// Wait until every previously issued command has been processed.
///
/// Commands are handled in order by the multiplexer task, so a
/// subscribe/unsubscribe round-trip on a sentinel topic is a barrier
/// for all dispatches sent before it.
async fn fence(client: &PubSub<MockTransport>) {
	let id = client
		.subscribe("fence/sync", Quiet)
		.await
		.expect("fence subscribe");
	client.unsubscribe(id).await.expect("fence unsubscribe");
}

async fn dispatch(
	client: &PubSub<MockTransport>,
	topic: &str,
	payload: &'static [u8],
) {
	client
		.multiplexer_handle()
		.dispatch(topic, Bytes::from_static(payload))
		.await
		.expect("dispatch");
}

#[tokio::test]
async fn shared_topic_subscribes_upstream_once() {
	let transport = MockTransport::new();
	let (client, controller) =
		mux_client(&transport, PubSubPolicies::default());
	let log = FanoutLog::default();

	let first = client
		.subscribe("chat", Recorder::new("L1", log.clone()))
		.await
		.unwrap();
	assert_eq!(first.value(), 0);
	assert_eq!(transport.subscribe_count("chat"), 1);

	let second = client
		.subscribe("chat", Recorder::new("L2", log.clone()))
		.await
		.unwrap();
	assert_eq!(second.value(), 1);
	// Still only one upstream subscribe
	assert_eq!(transport.subscribe_count("chat"), 1);

	client.unsubscribe(first).await.unwrap();
	assert_eq!(transport.unsubscribe_count("chat"), 0);

	client.unsubscribe(second).await.unwrap();
	assert_eq!(transport.unsubscribe_count("chat"), 1);

	// A message arriving after the last unsubscribe reaches nobody
	dispatch(&client, "chat", br#"{"text":"hi"}"#).await;
	fence(&client).await;
	assert!(log.lock().unwrap().is_empty());

	controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_id_unsubscribe_fails_without_upstream_call() {
	let transport = MockTransport::new();
	let (client, controller) =
		mux_client(&transport, PubSubPolicies::default());

	let id = client.subscribe("chat", Quiet).await.unwrap();
	client.unsubscribe(id).await.unwrap();
	assert_eq!(transport.unsubscribe_count("chat"), 1);

	let err = client.unsubscribe(id).await.unwrap_err();
	assert!(matches!(
		err,
		PubSubError::Unsubscribe(UnsubscribeError::UnknownSubscription(
			unknown
		)) if unknown == id
	));
	// No second upstream unsubscribe
	assert_eq!(transport.unsubscribe_count("chat"), 1);

	controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn message_without_listeners_is_dropped_silently() {
	let transport = MockTransport::new();
	let (client, controller) =
		mux_client(&transport, PubSubPolicies::default());
	let log = FanoutLog::default();

	dispatch(&client, "nobody/home", b"anything").await;
	fence(&client).await;
	assert!(log.lock().unwrap().is_empty());

	// The multiplexer is still healthy afterwards
	let id = client
		.subscribe("chat", Recorder::new("L1", log.clone()))
		.await
		.unwrap();
	dispatch(&client, "chat", b"\"ping\"").await;
	fence(&client).await;
	assert_eq!(log.lock().unwrap().len(), 1);

	client.unsubscribe(id).await.unwrap();
	controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn non_json_payload_delivered_as_raw_text_in_order() {
	let transport = MockTransport::new();
	let (client, controller) =
		mux_client(&transport, PubSubPolicies::default());
	let log = FanoutLog::default();

	client
		.subscribe("chat", Recorder::new("L1", log.clone()))
		.await
		.unwrap();
	client
		.subscribe("chat", Recorder::new("L2", log.clone()))
		.await
		.unwrap();

	dispatch(&client, "chat", b"not json at all").await;
	fence(&client).await;

	let events = log.lock().unwrap().clone();
	let expected = DecodedPayload::Raw("not json at all".to_string());
	assert_eq!(
		events,
		vec![
			("L1", "chat".to_string(), expected.clone()),
			("L2", "chat".to_string(), expected),
		]
	);

	controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn structured_payload_fans_out_once_per_listener_in_id_order() {
	let transport = MockTransport::new();
	let (client, controller) =
		mux_client(&transport, PubSubPolicies::default());
	let log = FanoutLog::default();

	client
		.subscribe("room/42", Recorder::new("L3", log.clone()))
		.await
		.unwrap();
	client
		.subscribe("room/42", Recorder::new("L5", log.clone()))
		.await
		.unwrap();

	dispatch(&client, "room/42", br#"{"text":"hi"}"#).await;
	fence(&client).await;

	let events = log.lock().unwrap().clone();
	let expected = DecodedPayload::Structured(json!({"text": "hi"}));
	assert_eq!(
		events,
		vec![
			("L3", "room/42".to_string(), expected.clone()),
			("L5", "room/42".to_string(), expected),
		]
	);

	controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn listener_failure_does_not_stop_fanout() {
	let transport = MockTransport::new();
	let (client, controller) =
		mux_client(&transport, PubSubPolicies::default());
	let log = FanoutLog::default();

	client
		.subscribe("chat", Recorder::failing("L1", log.clone()))
		.await
		.unwrap();
	client
		.subscribe("chat", Recorder::new("L2", log.clone()))
		.await
		.unwrap();

	dispatch(&client, "chat", br#"{"n":1}"#).await;
	fence(&client).await;

	// The failing listener recorded nothing; the second still got the
	// message.
	let events = log.lock().unwrap().clone();
	assert_eq!(
		events,
		vec![(
			"L2",
			"chat".to_string(),
			DecodedPayload::Structured(json!({"n": 1}))
		)]
	);

	controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn publish_always_reports_success() {
	let transport = MockTransport::new();
	let (client, controller) =
		mux_client(&transport, PubSubPolicies::default());

	assert!(client.publish("chat", &json!({"n": 1})).await);
	let expected_payload = serde_json::to_vec(&json!({"n": 1})).unwrap();
	assert_eq!(
		transport.calls(),
		vec![TransportCall::Publish("chat".to_string(), expected_payload)]
	);

	// Transport failure does not change the reported outcome
	transport.fail_publish.store(true, Ordering::SeqCst);
	assert!(client.publish("chat", &json!({"n": 2})).await);

	controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_upstream_subscribe_leaves_no_partial_state() {
	let transport = MockTransport::new();
	let (client, controller) =
		mux_client(&transport, PubSubPolicies::default());
	let log = FanoutLog::default();

	transport.fail_subscribe.store(true, Ordering::SeqCst);
	let err = client
		.subscribe("chat", Recorder::new("L1", log.clone()))
		.await
		.unwrap_err();
	assert!(matches!(
		err,
		PubSubError::Subscribe(SubscribeError::Upstream { .. })
	));
	assert_eq!(transport.subscribe_count("chat"), 1);
	transport.fail_subscribe.store(false, Ordering::SeqCst);

	// No interest entry survived the failure
	dispatch(&client, "chat", br#"{"n":1}"#).await;
	fence(&client).await;
	assert!(log.lock().unwrap().is_empty());

	// The next subscribe is a first interest again and retries upstream
	let id = client
		.subscribe("chat", Recorder::new("L2", log.clone()))
		.await
		.unwrap();
	assert_eq!(transport.subscribe_count("chat"), 2);

	dispatch(&client, "chat", br#"{"n":2}"#).await;
	fence(&client).await;
	assert_eq!(
		log.lock().unwrap().clone(),
		vec![(
			"L2",
			"chat".to_string(),
			DecodedPayload::Structured(json!({"n": 2}))
		)]
	);

	client.unsubscribe(id).await.unwrap();
	assert_eq!(transport.unsubscribe_count("chat"), 1);

	controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_first_subscribes_issue_one_upstream_call() {
	let transport =
		MockTransport::with_subscribe_delay(Duration::from_millis(50));
	let (client, controller) =
		mux_client(&transport, PubSubPolicies::default());
	let log = FanoutLog::default();

	// Both calls race while the first upstream subscribe is in flight;
	// the second queues behind it inside the multiplexer.
	let (first, second) = tokio::join!(
		client.subscribe("chat", Recorder::new("L1", log.clone())),
		client.subscribe("chat", Recorder::new("L2", log.clone())),
	);
	let first = first.unwrap();
	let second = second.unwrap();

	assert_ne!(first, second);
	assert_eq!(transport.subscribe_count("chat"), 1);

	controller.shutdown().await.unwrap();
}

#[derive(Clone, Default)]
struct AckRecorder {
	acks: Arc<Mutex<Vec<(usize, QosLevel)>>>,
}

impl SubscribeObserver for AckRecorder {
	fn on_subscribe(&self, id: SubscriptionId, ack: &SubscribeAck) {
		self.acks.lock().unwrap().push((id.value(), ack.granted_qos));
	}
}

#[tokio::test]
async fn subscribe_observed_hook_fires_on_first_subscribe_only() {
	let transport = MockTransport::new();
	let acks = AckRecorder::default();
	let policies =
		PubSubPolicies::default().with_subscribe_observer(acks.clone());
	let (client, controller) = mux_client(&transport, policies);

	client.subscribe("chat", Quiet).await.unwrap();
	client.subscribe("chat", Quiet).await.unwrap();

	assert_eq!(
		acks.acks.lock().unwrap().clone(),
		vec![(0, QosLevel::AtLeastOnce)]
	);

	controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn per_call_qos_override_reaches_the_acknowledgment() {
	let transport = MockTransport::new();
	let acks = AckRecorder::default();
	let policies =
		PubSubPolicies::default().with_subscribe_observer(acks.clone());
	let (client, controller) = mux_client(&transport, policies);

	client
		.subscribe_with_options(
			"telemetry",
			Quiet,
			SubscribeOptions {
				qos: Some(QosLevel::ExactlyOnce),
			},
		)
		.await
		.unwrap();

	assert_eq!(
		acks.acks.lock().unwrap().clone(),
		vec![(0, QosLevel::ExactlyOnce)]
	);

	controller.shutdown().await.unwrap();
}

/// Resolver that rejects one specific trigger.
struct SelectiveResolver;

#[async_trait]
impl SubscribeOptionsResolver for SelectiveResolver {
	async fn resolve(
		&self,
		trigger: &str,
		options: &SubscribeOptions,
	) -> Result<SubscriptionConfig, OptionResolutionError> {
		if trigger == "forbidden" {
			return Err(OptionResolutionError::new(
				"trigger is not allowed",
			));
		}
		Ok(SubscriptionConfig {
			qos: options.qos.unwrap_or_default(),
		})
	}
}

#[tokio::test]
async fn option_resolver_failure_allocates_nothing() {
	let transport = MockTransport::new();
	let policies =
		PubSubPolicies::default().with_subscribe_options(SelectiveResolver);
	let (client, controller) = mux_client(&transport, policies);

	let err = client.subscribe("forbidden", Quiet).await.unwrap_err();
	assert!(matches!(err, PubSubError::OptionResolution(_)));
	assert!(transport.calls().is_empty());

	// The failed call consumed no id
	let id = client.subscribe("allowed", Quiet).await.unwrap();
	assert_eq!(id.value(), 0);

	controller.shutdown().await.unwrap();
}

/// Transform that maps triggers into a topic namespace.
struct PrefixTransform;

impl TriggerTransform for PrefixTransform {
	fn topic_for(
		&self,
		trigger: &str,
		_options: Option<&SubscribeOptions>,
	) -> ArcStr {
		ArcStr::from(format!("triggers/{trigger}"))
	}
}

#[tokio::test]
async fn trigger_transform_applies_to_subscribe_and_publish() {
	let transport = MockTransport::new();
	let policies =
		PubSubPolicies::default().with_trigger_transform(PrefixTransform);
	let (client, controller) = mux_client(&transport, policies);
	let log = FanoutLog::default();

	let id = client
		.subscribe("chat", Recorder::new("L1", log.clone()))
		.await
		.unwrap();
	assert_eq!(transport.subscribe_count("triggers/chat"), 1);

	assert!(client.publish("chat", &json!("hello")).await);
	assert!(transport.calls().iter().any(|call| matches!(
		call,
		TransportCall::Publish(topic, _) if topic == "triggers/chat"
	)));

	// Messages arrive on the transformed topic
	dispatch(&client, "triggers/chat", b"\"hello\"").await;
	fence(&client).await;
	assert_eq!(
		log.lock().unwrap().clone(),
		vec![(
			"L1",
			"triggers/chat".to_string(),
			DecodedPayload::Structured(json!("hello"))
		)]
	);

	client.unsubscribe(id).await.unwrap();
	controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_unsubscribes_all_active_topics() {
	let transport = MockTransport::new();
	let (client, controller) =
		mux_client(&transport, PubSubPolicies::default());

	client.subscribe("chat", Quiet).await.unwrap();
	client.subscribe("chat", Quiet).await.unwrap();
	client.subscribe("news", Quiet).await.unwrap();

	controller.shutdown().await.unwrap();

	// One cleanup unsubscribe per active topic, shared listeners or not
	assert_eq!(transport.unsubscribe_count("chat"), 1);
	assert_eq!(transport.unsubscribe_count("news"), 1);
}
