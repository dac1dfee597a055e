#![allow(clippy::missing_docs_in_private_items)]
#![allow(missing_docs)]
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arcstr::ArcStr;
use smallvec::SmallVec;

use super::error::RegistryError;
use crate::listener::MessageListener;

/// A subscription identifier.
///
/// Allocated monotonically per multiplexer instance; never reused
/// while the instance lives.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct SubscriptionId(usize);

impl SubscriptionId {
	/// Numeric value of the id.
	pub fn value(&self) -> usize {
		self.0
	}
}

impl fmt::Display for SubscriptionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// One caller's interest in one topic: the resolved topic name and the
/// listener to invoke on fanout. Owned exclusively by the table.
pub struct SubscriptionEntry {
	/// Transport-resolved topic this subscription listens on.
	pub topic: ArcStr,
	/// Callback invoked with each decoded message.
	pub listener: Arc<dyn MessageListener>,
}

impl fmt::Debug for SubscriptionEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SubscriptionEntry")
			.field("topic", &self.topic)
			.field("listener", &"<dyn MessageListener>")
			.finish()
	}
}

/// Id allocator plus id -> (topic, listener) ownership table.
#[derive(Default)]
pub struct SubscriptionTable {
	entries: HashMap<SubscriptionId, SubscriptionEntry>,
	next_id: usize,
}

impl SubscriptionTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the current counter value, then increments it. Never
	/// fails; serialized by the owning actor.
	pub fn allocate(&mut self) -> SubscriptionId {
		let id = SubscriptionId(self.next_id);
		self.next_id = self.next_id.wrapping_add(1);
		id
	}

	/// Record a new subscription entry under a freshly allocated id.
	pub fn put(
		&mut self,
		id: SubscriptionId,
		topic: ArcStr,
		listener: Arc<dyn MessageListener>,
	) -> Result<(), RegistryError> {
		if self.entries.contains_key(&id) {
			return Err(RegistryError::DuplicateId(id));
		}
		self.entries
			.insert(id, SubscriptionEntry { topic, listener });
		Ok(())
	}

	pub fn get(
		&self,
		id: SubscriptionId,
	) -> Result<&SubscriptionEntry, RegistryError> {
		self.entries
			.get(&id)
			.ok_or(RegistryError::UnknownSubscription(id))
	}

	pub fn remove(
		&mut self,
		id: SubscriptionId,
	) -> Result<SubscriptionEntry, RegistryError> {
		self.entries
			.remove(&id)
			.ok_or(RegistryError::UnknownSubscription(id))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Drop all entries. The id counter is left untouched so ids are
	/// never reused within one instance.
	pub fn clear(&mut self) {
		self.entries.clear();
	}
}

/// Outcome of attaching an id to a topic's interest set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestChange {
	/// The set was empty before this call: the caller must subscribe
	/// upstream.
	First,
	/// Interest already existed; no upstream action needed.
	Additional,
}

/// Outcome of detaching an id from a topic's interest set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestRemoval {
	/// The set became empty: the caller must unsubscribe upstream.
	Last,
	/// Other subscriptions remain interested.
	Remaining,
}

/// Topic -> ordered interest set of subscription ids.
///
/// The reference count for a topic is the size of its id set, so
/// removing a specific id stays well-defined. An entry exists iff at
/// least one live subscription references the topic.
#[derive(Default)]
pub struct TopicInterest {
	topics: HashMap<ArcStr, SmallVec<[SubscriptionId; 4]>>,
}

impl TopicInterest {
	pub fn new() -> Self {
		Self::default()
	}

	/// Attach `id` to the topic's interest set, creating the set on
	/// first interest. Adding an id that is already present is a
	/// no-op, not a second reference.
	pub fn add(&mut self, topic: ArcStr, id: SubscriptionId) -> InterestChange {
		let ids = self.topics.entry(topic).or_default();
		let change = if ids.is_empty() {
			InterestChange::First
		} else {
			InterestChange::Additional
		};
		if !ids.contains(&id) {
			ids.push(id);
		}
		change
	}

	/// Detach `id` from the topic's interest set, removing the set
	/// when it becomes empty.
	pub fn remove(
		&mut self,
		topic: &str,
		id: SubscriptionId,
	) -> Result<InterestRemoval, RegistryError> {
		let Some(ids) = self.topics.get_mut(topic) else {
			return Err(RegistryError::UnknownTopic(topic.to_string()));
		};
		if let Some(position) = ids.iter().position(|known| *known == id) {
			ids.remove(position);
		}
		if ids.is_empty() {
			self.topics.remove(topic);
			Ok(InterestRemoval::Last)
		} else {
			Ok(InterestRemoval::Remaining)
		}
	}

	/// Ids interested in `topic`, in subscription order. Empty for
	/// unknown topics.
	pub fn subscribers(&self, topic: &str) -> &[SubscriptionId] {
		self.topics
			.get(topic)
			.map(|ids| ids.as_slice())
			.unwrap_or(&[])
	}

	pub fn has_interest(&self, topic: &str) -> bool {
		self.topics.contains_key(topic)
	}

	/// Topics with at least one interested subscription.
	pub fn active_topics(&self) -> impl Iterator<Item = &ArcStr> {
		self.topics.keys()
	}

	pub fn topic_count(&self) -> usize {
		self.topics.len()
	}

	pub fn clear(&mut self) {
		self.topics.clear();
	}
}
