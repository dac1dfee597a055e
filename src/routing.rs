//! Subscription multiplexing core
//!
//! This module owns the shared state: the id allocator plus
//! subscription table, the per-topic interest sets, and the actor that
//! serializes every operation on them.

pub mod error;
pub mod interest;
pub mod mux_actor;


// Re-export commonly used types for convenience
pub use error::{RegistryError, SendError, SubscribeError, UnsubscribeError};
pub use interest::{
	InterestChange, InterestRemoval, SubscriptionId, SubscriptionTable,
	TopicInterest,
};
pub use mux_actor::{
	MultiplexerActor, MultiplexerController, MultiplexerHandle,
	SubscribeOutcome,
};
