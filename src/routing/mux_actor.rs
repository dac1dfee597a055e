#![allow(clippy::missing_docs_in_private_items)]
#![allow(missing_docs)]
use std::sync::Arc;

use arcstr::ArcStr;
use bytes::Bytes;
use tokio::{
	sync::{
		mpsc::{channel, Receiver, Sender},
		oneshot,
	},
	task::{JoinError, JoinHandle},
};
use tracing::{debug, error, info, trace, warn};

use super::error::{SendError, SubscribeError, UnsubscribeError};
use super::interest::{
	InterestChange, InterestRemoval, SubscriptionId, SubscriptionTable,
	TopicInterest,
};
use crate::listener::MessageListener;
use crate::payload::DecodedPayload;
use crate::transport::{SubscribeAck, SubscriptionConfig, Transport};

/// Result of a successful subscribe command.
#[derive(Debug, Clone, Copy)]
pub struct SubscribeOutcome {
	/// Newly allocated subscription id.
	pub id: SubscriptionId,
	/// Upstream acknowledgment, present only when this call was the
	/// first interest in its topic and actually subscribed upstream.
	pub ack: Option<SubscribeAck>,
}

pub enum Command {
	Subscribe {
		topic: ArcStr,
		listener: Arc<dyn MessageListener>,
		config: SubscriptionConfig,
		reply: oneshot::Sender<Result<SubscribeOutcome, SubscribeError>>,
	},
	Unsubscribe {
		id: SubscriptionId,
		reply: oneshot::Sender<Result<(), UnsubscribeError>>,
	},
	Dispatch {
		topic: String,
		payload: Bytes,
	},
}

/// Single owner of the subscription table and interest sets.
///
/// All mutation is serialized through the command channel. Upstream
/// subscribes are awaited inline, so two first-subscribes for the same
/// topic can never race: the second queues behind the first and
/// observes its committed outcome.
pub struct MultiplexerActor<C> {
	table: SubscriptionTable,
	interest: TopicInterest,
	transport: C,
	command_rx: Receiver<Command>,
	shutdown_rx: oneshot::Receiver<()>,
}

impl<C> MultiplexerActor<C>
where C: Transport
{
	pub fn spawn(
		transport: C,
		command_capacity: usize,
	) -> (MultiplexerController, MultiplexerHandle) {
		let (command_tx, command_rx) = channel(command_capacity);
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let actor = Self {
			table: SubscriptionTable::new(),
			interest: TopicInterest::new(),
			transport,
			command_rx,
			shutdown_rx,
		};
		let join_handle = tokio::spawn(async move { actor.run().await });

		let controller = MultiplexerController {
			shutdown_tx,
			join_handle,
		};
		let handle = MultiplexerHandle { command_tx };

		(controller, handle)
	}

	async fn run(mut self) {
		loop {
			tokio::select! {
				_ = &mut self.shutdown_rx => {
					info!("MultiplexerActor: Shutdown signal received");
					break;
				}
				cmd = self.command_rx.recv() => {
					match cmd {
						| Some(Command::Subscribe {
							topic,
							listener,
							config,
							reply,
						}) => {
							self.handle_subscribe(topic, listener, config, reply)
								.await
						}
						| Some(Command::Unsubscribe { id, reply }) => {
							self.handle_unsubscribe(id, reply).await
						}
						| Some(Command::Dispatch { topic, payload }) => {
							self.handle_dispatch(&topic, &payload)
						}
						| None => {
							info!(
								"MultiplexerActor: Command channel closed, \
								 exiting"
							);
							break;
						}
					}
				}
			}
		}
		info!("MultiplexerActor: Exiting run loop");
		self.cleanup_active_subscriptions().await
	}

	/// Unsubscribe upstream from every topic that still has interest,
	/// then drop all local state. Called once on shutdown.
	async fn cleanup_active_subscriptions(&mut self) {
		let active: Vec<ArcStr> =
			self.interest.active_topics().cloned().collect();
		for topic in active {
			if let Err(err) = self.transport.unsubscribe(topic.as_str()).await
			{
				error!(
					topic = %topic,
					error = %err,
					"Failed to unsubscribe from topic during cleanup"
				);
			}
		}
		self.table.clear();
		self.interest.clear();
	}

	async fn handle_subscribe(
		&mut self,
		topic: ArcStr,
		listener: Arc<dyn MessageListener>,
		config: SubscriptionConfig,
		reply: oneshot::Sender<Result<SubscribeOutcome, SubscribeError>>,
	) {
		let id = self.table.allocate();
		if let Err(err) = self.table.put(id, topic.clone(), listener) {
			error!(
				subscription_id = %id,
				error = %err,
				"Subscription table rejected freshly allocated id"
			);
			let _ = reply.send(Err(SubscribeError::Registry(err)));
			return;
		}

		let mut ack = None;
		if self.interest.add(topic.clone(), id) == InterestChange::First {
			match self.transport.subscribe(topic.as_str(), &config).await {
				| Ok(granted) => ack = Some(granted),
				| Err(err) => {
					// A failed first subscribe must leave no partial
					// topic entry behind.
					self.rollback_subscription(&topic, id);
					error!(
						topic = %topic,
						error = %err,
						"Failed to subscribe to upstream topic"
					);
					let _ = reply.send(Err(SubscribeError::Upstream {
						topic: topic.to_string(),
						source: err,
					}));
					return;
				}
			}
		}

		if reply.send(Ok(SubscribeOutcome { id, ack })).is_err() {
			warn!(
				subscription_id = %id,
				"Subscribe response dropped, removing subscription"
			);
			if let Err(err) = self.remove_subscription(id).await {
				warn!(
					subscription_id = %id,
					error = %err,
					"Failed to remove orphaned subscription"
				);
			}
		}
	}

	fn rollback_subscription(&mut self, topic: &ArcStr, id: SubscriptionId) {
		if let Err(err) = self.interest.remove(topic.as_str(), id) {
			warn!(
				subscription_id = %id,
				error = %err,
				"Failed to roll back interest after subscribe error"
			);
		}
		if let Err(err) = self.table.remove(id) {
			warn!(
				subscription_id = %id,
				error = %err,
				"Failed to roll back table entry after subscribe error"
			);
		}
	}

	async fn handle_unsubscribe(
		&mut self,
		id: SubscriptionId,
		reply: oneshot::Sender<Result<(), UnsubscribeError>>,
	) {
		let result = self.remove_subscription(id).await;
		if reply.send(result).is_err() {
			warn!(
				subscription_id = %id,
				"Unsubscribe response dropped (channel closed)"
			);
		}
	}

	/// Remove a subscription and, when it carried the last interest in
	/// its topic, unsubscribe upstream. The table entry is removed on
	/// every path through this function.
	async fn remove_subscription(
		&mut self,
		id: SubscriptionId,
	) -> Result<(), UnsubscribeError> {
		let entry = self
			.table
			.remove(id)
			.map_err(|_| UnsubscribeError::UnknownSubscription(id))?;

		match self.interest.remove(entry.topic.as_str(), id) {
			| Ok(InterestRemoval::Last) => {
				debug!(topic = %entry.topic, "Topic interest now empty");
				// Fire-and-forget with respect to the broker's
				// acknowledgment; local state is already consistent.
				if let Err(err) =
					self.transport.unsubscribe(entry.topic.as_str()).await
				{
					error!(
						topic = %entry.topic,
						error = %err,
						"Failed to unsubscribe from upstream topic"
					);
				}
				Ok(())
			}
			| Ok(InterestRemoval::Remaining) => Ok(()),
			| Err(err) => {
				error!(
					subscription_id = %id,
					topic = %entry.topic,
					error = %err,
					"Interest bookkeeping inconsistent"
				);
				Err(UnsubscribeError::CorruptedState {
					id,
					topic: entry.topic.to_string(),
				})
			}
		}
	}

	/// Fan a raw message out to every listener of its topic.
	///
	/// Read-only on the shared state. The payload is decoded exactly
	/// once; listener failures are logged per listener and never stop
	/// the batch.
	fn handle_dispatch(&self, topic: &str, payload: &Bytes) {
		let ids = self.interest.subscribers(topic);
		if ids.is_empty() {
			// Expected for topics that lost all local listeners while
			// a message was in flight.
			trace!(topic = %topic, "No local interest, dropping message");
			return;
		}
		let decoded = DecodedPayload::decode(payload);
		for id in ids {
			match self.table.get(*id) {
				| Ok(entry) => {
					if let Err(err) = entry.listener.on_message(topic, &decoded)
					{
						error!(
							subscription_id = %id,
							topic = %topic,
							error = %err,
							"Listener failed, continuing fanout"
						);
					}
				}
				| Err(err) => {
					error!(
						subscription_id = %id,
						topic = %topic,
						error = %err,
						"Interest set references missing subscription"
					);
				}
			}
		}
	}
}

/// Owns the actor task; shuts it down and awaits its exit.
pub struct MultiplexerController {
	shutdown_tx: oneshot::Sender<()>,
	join_handle: JoinHandle<()>,
}

impl MultiplexerController {
	/// Signal shutdown and wait for the actor to finish its cleanup
	/// (upstream unsubscribes for all active topics).
	pub async fn shutdown(self) -> Result<(), JoinError> {
		let _ = self.shutdown_tx.send(()).inspect_err(|_| {
			warn!("MultiplexerController: Shutdown signal already sent");
		});
		self.join_handle.await.inspect_err(|e| {
			warn!(error = ?e, "MultiplexerController: Actor run failed");
		})
	}
}

/// Cloneable handle for issuing commands to the multiplexer task.
#[derive(Clone)]
pub struct MultiplexerHandle {
	command_tx: Sender<Command>,
}

impl MultiplexerHandle {
	/// Register a listener for `topic`, subscribing upstream when this
	/// is the first interest.
	pub async fn subscribe(
		&self,
		topic: ArcStr,
		listener: Arc<dyn MessageListener>,
		config: SubscriptionConfig,
	) -> Result<SubscribeOutcome, SubscribeError> {
		let (tx, rx) = oneshot::channel();
		self.command_tx
			.send(Command::Subscribe {
				topic,
				listener,
				config,
				reply: tx,
			})
			.await
			.map_err(|_| SubscribeError::ChannelClosed)?;
		rx.await.map_err(|_| SubscribeError::ResponseLost)?
	}

	/// Remove the subscription with the given id, unsubscribing
	/// upstream when it carried the last interest in its topic.
	pub async fn unsubscribe(
		&self,
		id: SubscriptionId,
	) -> Result<(), UnsubscribeError> {
		let (tx, rx) = oneshot::channel();
		self.command_tx
			.send(Command::Unsubscribe { id, reply: tx })
			.await
			.map_err(|_| UnsubscribeError::ChannelClosed)?;
		rx.await.map_err(|_| UnsubscribeError::ResponseLost)?
	}

	/// Hand a raw transport message to the dispatch path.
	pub async fn dispatch(
		&self,
		topic: impl Into<String>,
		payload: Bytes,
	) -> Result<(), SendError> {
		self.command_tx
			.send(Command::Dispatch {
				topic: topic.into(),
				payload,
			})
			.await
			.map_err(|_| SendError::ChannelClosed)
	}
}
