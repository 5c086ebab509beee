//! Fan-out of completed rolls to everyone watching a room.
//!
//! Delivery is best-effort: publishing never waits on subscribers, subscribers that fall behind lose the oldest
//! events, and a room with nobody in it simply drops the event.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::{history::RollRecord, verify::Verification};

/// Name of the event published for every completed roll
pub const MOVE_EXECUTED: &str = "move:executed";

/// Room that rolls are published to when the request doesn't name one
pub const DEFAULT_ROOM: &str = "global";

/// Default number of events buffered per room for slow subscribers
pub const DEFAULT_CAPACITY: usize = 64;

/// Payload of a [`MOVE_EXECUTED`] event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct RollEvent {
	/// Move the roll was made for, if any
	pub move_id: Option<String>,

	/// The recorded roll
	pub record: RollRecord,

	/// Comparison against the client claim, for claimed rolls
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub verification: Option<Verification>,
}

impl RollEvent {
	/// Builds the event for a recorded roll.
	#[must_use]
	pub fn new(record: RollRecord) -> Self {
		Self {
			move_id: record.move_id.clone(),
			verification: record.verification.clone(),
			record,
		}
	}
}

/// Envelope sent to subscribers: the event name and its payload
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<'a> {
	/// Event name
	pub event: &'static str,

	/// Event payload
	pub payload: &'a RollEvent,
}

impl<'a> Envelope<'a> {
	/// Wraps a roll event as a [`MOVE_EXECUTED`] envelope.
	#[must_use]
	pub const fn move_executed(payload: &'a RollEvent) -> Self {
		Self {
			event: MOVE_EXECUTED,
			payload,
		}
	}
}

/// Registry of rooms, each backed by its own broadcast channel.
///
/// Cloning is cheap and every clone shares the same rooms.
#[derive(Debug, Clone)]
pub struct Rooms {
	rooms: Arc<RwLock<HashMap<String, broadcast::Sender<Arc<RollEvent>>>>>,
	capacity: usize,
}

impl Rooms {
	/// Creates an empty registry whose rooms buffer up to `capacity` events per subscriber.
	#[must_use]
	pub fn new(capacity: usize) -> Self {
		Self {
			rooms: Arc::default(),
			capacity: capacity.max(1),
		}
	}

	/// Joins a room, creating it if needed.
	///
	/// Hand the receiver back to [`Rooms::leave`] when done. A receiver that is simply dropped leaves too, but its room
	/// lingers until the next publish finds it empty.
	pub async fn subscribe(&self, room: &str) -> broadcast::Receiver<Arc<RollEvent>> {
		let mut rooms = self.rooms.write().await;
		rooms.entry(room.to_owned())
			.or_insert_with(|| broadcast::channel(self.capacity).0)
			.subscribe()
	}

	/// Publishes an event to a room, returning how many subscribers it was handed to.
	///
	/// Never fails: an empty room is pruned and the event is dropped.
	pub async fn publish(&self, room: &str, event: RollEvent) -> usize {
		let event = Arc::new(event);
		let sent = {
			let rooms = self.rooms.read().await;
			rooms.get(room).map(|tx| tx.send(Arc::clone(&event)))
		};

		match sent {
			Some(Ok(receivers)) => {
				tracing::debug!(room, receivers, id = %event.record.id, "broadcast roll");
				receivers
			}
			Some(Err(_)) => {
				tracing::debug!(room, id = %event.record.id, "room is empty, pruning");
				self.prune(room).await;
				0
			}
			None => {
				tracing::debug!(room, id = %event.record.id, "no subscribers for roll");
				0
			}
		}
	}

	/// Number of live subscribers in a room.
	pub async fn subscriber_count(&self, room: &str) -> usize {
		self.rooms
			.read()
			.await
			.get(room)
			.map_or(0, broadcast::Sender::receiver_count)
	}

	/// Names of rooms that currently exist.
	pub async fn room_names(&self) -> Vec<String> {
		let mut names = self.rooms.read().await.keys().cloned().collect::<Vec<_>>();
		names.sort();
		names
	}

	/// Leaves a room, removing the room if nobody else is in it.
	pub async fn leave(&self, room: &str, events: broadcast::Receiver<Arc<RollEvent>>) {
		drop(events);
		self.prune(room).await;
	}

	async fn prune(&self, room: &str) {
		let mut rooms = self.rooms.write().await;
		if rooms.get(room).is_some_and(|tx| tx.receiver_count() == 0) {
			rooms.remove(room);
		}
	}
}

impl Default for Rooms {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}
