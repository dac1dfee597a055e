//! Broker connection management module
//!
//! This module provides the connection lifecycle management separated
//! from the main client interface for cleaner API separation.

use rumqttc::AsyncClient;
use tracing::{error, warn};

use crate::routing::MultiplexerController;

/// Broker connection handle for lifecycle management
///
/// This type manages the connection lifecycle and provides graceful
/// shutdown. It should be kept alive for the duration of the pub/sub
/// session.
pub struct PubSubConnection {
	client: AsyncClient,
	multiplexer_controller: Option<MultiplexerController>,
	event_loop_handle: Option<tokio::task::JoinHandle<()>>,
}

impl PubSubConnection {
	/// Create a new connection handle
	pub(crate) fn new(
		client: AsyncClient,
		multiplexer_controller: MultiplexerController,
		event_loop_handle: tokio::task::JoinHandle<()>,
	) -> Self {
		Self {
			client,
			multiplexer_controller: Some(multiplexer_controller),
			event_loop_handle: Some(event_loop_handle),
		}
	}

	/// Gracefully shutdown the pub/sub connection by:
	/// 1. Shutting down the multiplexer (unsubscribes all active topics)
	/// 2. Sending a Disconnect packet (triggers event loop termination)
	/// 3. Waiting for the event loop to finish processing
	pub async fn shutdown(mut self) -> Result<(), crate::PubSubError> {
		// Step 1: Shutdown the multiplexer first to clean up
		// subscriptions upstream
		if let Some(controller) = self.multiplexer_controller.take() {
			if let Err(e) = controller.shutdown().await {
				warn!(error = %e, "Failed to shutdown multiplexer");
			}
		} else {
			warn!("No multiplexer controller available for shutdown");
		}

		// Step 2: Send Disconnect packet to the broker
		// This will cause the event loop to see Outgoing(Disconnect) and break
		if let Err(e) = self.client.disconnect().await {
			warn!(error = %e, "Failed to disconnect broker client");
		}

		// Step 3: Wait for the event loop to terminate naturally
		if let Some(handle) = self.event_loop_handle.take() {
			if let Err(e) = handle.await {
				warn!(error = %e, "Event loop task failed");
			}
		} else {
			warn!("No event loop handle available to await");
		}

		Ok(())
	}
}

impl Drop for PubSubConnection {
	fn drop(&mut self) {
		if self.multiplexer_controller.is_some()
			|| self.event_loop_handle.is_some()
		{
			error!(
				"PubSubConnection dropped without calling shutdown(). Please \
				 call shutdown() and await its completion before dropping."
			);
		}
	}
}
