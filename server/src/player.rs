use std::time::{Duration, Instant};

use tag_shared::protocol::PlayerMessage;
use tag_shared::vec2::{vec2, Vec2};

use crate::config::InputPolicy;
use crate::fanout::OutboundQueue;

/// Authoritative state of one connected craft.
#[derive(Debug)]
pub struct Player {
    pub id: u32,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Heading in radians
    pub angle: f64,
    pub turn: i8,
    pub thrust: bool,
    pub is_tag: bool,
    /// When this player last gained or lost the tag. `None` means the
    /// cooldown has already elapsed.
    pub last_tag_transfer: Option<Instant>,
    outbound: OutboundQueue,
}

impl Player {
    pub fn new(id: u32, position: Vec2, is_tag: bool, outbound: OutboundQueue) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            angle: 0.0,
            turn: 0,
            thrust: false,
            is_tag,
            last_tag_transfer: None,
            outbound,
        }
    }

    pub fn to_message(&self, is_new: bool) -> PlayerMessage {
        PlayerMessage {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            angle: self.angle,
            velocity_x: self.velocity.x,
            velocity_y: self.velocity.y,
            turn: self.turn,
            thrust: self.thrust,
            is_tag: self.is_tag,
            is_new,
            has_disconnected: false,
        }
    }

    /// Overwrite the client-controlled fields from an inbound message.
    pub fn apply_input(&mut self, msg: &PlayerMessage, policy: InputPolicy) {
        if policy == InputPolicy::ClientAuthoritative {
            self.position = vec2(msg.x, msg.y);
            self.angle = msg.angle;
            self.velocity = vec2(msg.velocity_x, msg.velocity_y);
        }
        self.turn = msg.turn;
        self.thrust = msg.thrust;
    }

    /// Whether more than `cooldown` has passed since the last tag transfer.
    pub fn cooldown_elapsed(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last_tag_transfer {
            None => true,
            Some(at) => now.saturating_duration_since(at) > cooldown,
        }
    }

    /// Enqueue a snapshot for this player's connection.
    pub fn send(&self, msg: PlayerMessage) -> bool {
        self.outbound.push(msg)
    }
}
