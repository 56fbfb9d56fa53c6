//! Delivery of player snapshots to connection outbound queues.
//!
//! Fan-out only ever enqueues. Each connection's writer task drains its own
//! queue, so a slow client never stalls the game loop or other clients.

use tag_shared::protocol::PlayerMessage;
use tokio::sync::broadcast;

use crate::player::Player;
use crate::registry::Registry;

/// Largest per-connection queue the server accepts
pub const MAX_QUEUE_CAPACITY: usize = 65536;

/// Number of snapshots a queue created with `requested` actually buffers
/// before the oldest is dropped.
pub fn effective_capacity(requested: usize) -> usize {
    requested.max(1).next_power_of_two()
}

/// Bounded, ordered queue of snapshots waiting to be written to one
/// connection. When full, the oldest pending snapshot is dropped and the
/// receiver observes a lag.
///
/// The bound is always a power of two: a requested capacity is rounded up
/// by [`effective_capacity`].
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: broadcast::Sender<PlayerMessage>,
}

impl OutboundQueue {
    /// Create a queue holding at most `effective_capacity(capacity)`
    /// pending snapshots. `capacity` must be between 1 and
    /// [`MAX_QUEUE_CAPACITY`].
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<PlayerMessage>) {
        let (tx, rx) = broadcast::channel(effective_capacity(capacity));
        (Self { tx }, rx)
    }

    /// Enqueue a snapshot. Returns false if the connection's writer is gone.
    pub fn push(&self, msg: PlayerMessage) -> bool {
        self.tx.send(msg).is_ok()
    }
}

/// Which connections a snapshot goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    AllExcept(u32),
    Only(u32),
}

impl Target {
    pub fn matches(&self, player: &Player) -> bool {
        match *self {
            Target::All => true,
            Target::AllExcept(id) => player.id != id,
            Target::Only(id) => player.id == id,
        }
    }
}

/// Enqueue `snapshot` for every registered player matching `target`.
/// Returns how many queues accepted it.
pub fn notify(registry: &Registry, snapshot: &PlayerMessage, target: Target) -> usize {
    let mut delivered = 0;
    registry.for_each(|player| {
        if target.matches(player) {
            if player.send(snapshot.clone()) {
                delivered += 1;
            } else {
                tracing::debug!(player_id = player.id, "Outbound queue closed, snapshot dropped");
            }
        }
    });
    delivered
}
