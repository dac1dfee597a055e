use thiserror::Error;

use super::interest::SubscriptionId;
use crate::transport::TransportError;

/// Errors when handing messages to the multiplexer task.
#[derive(Debug, Error)]
pub enum SendError {
	/// Command channel has been closed.
	#[error("Multiplexer command channel closed")]
	ChannelClosed,
}

/// Bookkeeping errors from the subscription table and interest sets.
///
/// `DuplicateId` and `UnknownTopic` guard internal invariants; they do
/// not occur under correct allocator and actor use.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
	/// An id was inserted twice into the subscription table.
	#[error("Subscription {0} already present in table")]
	DuplicateId(SubscriptionId),

	/// No subscription with the given id exists.
	#[error("Subscription {0} not found")]
	UnknownSubscription(SubscriptionId),

	/// No interest recorded for a topic a live subscription claims.
	#[error("No interest recorded for topic '{0}'")]
	UnknownTopic(String),
}

/// Errors during subscribe operations.
#[derive(Debug, Error)]
pub enum SubscribeError {
	/// The upstream transport refused or failed the subscribe. No
	/// interest-set entry survives this error.
	#[error("Upstream subscribe failed for topic '{topic}'")]
	Upstream {
		/// Topic the subscribe was issued for.
		topic: String,
		/// Transport failure cause.
		#[source]
		source: TransportError,
	},

	/// Internal bookkeeping rejected the new subscription.
	#[error("Subscription registry corrupted: {0}")]
	Registry(#[from] RegistryError),

	/// Command channel to the multiplexer closed.
	#[error("Multiplexer command channel closed")]
	ChannelClosed,

	/// The multiplexer dropped the response channel.
	#[error("Multiplexer response lost")]
	ResponseLost,
}

/// Errors during unsubscribe operations.
#[derive(Debug, Error)]
pub enum UnsubscribeError {
	/// The id is not present in the subscription table.
	#[error("Unknown subscription {0}")]
	UnknownSubscription(SubscriptionId),

	/// Interest bookkeeping was missing for a topic a live
	/// subscription claimed. Internal invariant violation; the
	/// subscription entry itself has still been removed.
	#[error(
		"Interest bookkeeping inconsistent for subscription {id} on topic \
		 '{topic}'"
	)]
	CorruptedState {
		/// Id of the subscription being removed.
		id: SubscriptionId,
		/// Topic whose interest set was missing.
		topic: String,
	},

	/// Command channel to the multiplexer closed.
	#[error("Multiplexer command channel closed")]
	ChannelClosed,

	/// The multiplexer dropped the response channel.
	#[error("Multiplexer response lost")]
	ResponseLost,
}
