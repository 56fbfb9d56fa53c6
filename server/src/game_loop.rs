use std::time::{Duration, Instant};

use tag_shared::config::PhysicsConfig;
use tag_shared::protocol::PlayerMessage;
use tokio::sync::{mpsc, oneshot};

use crate::config::{InputPolicy, ServerConfig};
use crate::fanout::{notify, OutboundQueue, Target};
use crate::physics::{self, TagTransfer};
use crate::player::Player;
use crate::registry::Registry;

/// Commands from client connections to the game loop
#[derive(Debug)]
pub enum GameCommand {
    PlayerJoin {
        outbound: OutboundQueue,
        response: oneshot::Sender<u32>,
    },
    PlayerInput {
        id: u32,
        msg: PlayerMessage,
    },
    PlayerLeave {
        id: u32,
    },
    PlayerCount {
        response: oneshot::Sender<usize>,
    },
}

/// Authoritative game state plus the rules for changing it.
/// Every mutation of the registry goes through here.
pub struct GameLoop {
    registry: Registry,
    physics: PhysicsConfig,
    input_policy: InputPolicy,
}

impl GameLoop {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            registry: Registry::new(&config.physics, config.rng_seed),
            physics: config.physics,
            input_policy: config.input_policy,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn handle_command(&mut self, cmd: GameCommand) {
        match cmd {
            GameCommand::PlayerJoin { outbound, response } => {
                // Dropping `response` unanswered tells the session it was refused
                let Some(id) = self.join(outbound) else {
                    return;
                };
                if response.send(id).is_err() {
                    // Connection went away before it learned its id
                    self.leave(id);
                }
            }
            GameCommand::PlayerInput { id, msg } => self.apply_input(id, &msg),
            GameCommand::PlayerLeave { id } => {
                self.leave(id);
            }
            GameCommand::PlayerCount { response } => {
                let _ = response.send(self.registry.len());
            }
        }
    }

    /// Register a new player and give everyone a consistent initial view:
    /// the newcomer gets its own snapshot first, then each existing player's,
    /// and every existing player gets the newcomer's.
    pub fn join(&mut self, outbound: OutboundQueue) -> Option<u32> {
        let Some(id) = self.registry.join(outbound).map(|p| p.id) else {
            tracing::warn!("Player ids exhausted, refusing join");
            return None;
        };
        if let Some(newcomer) = self.registry.get(id) {
            newcomer.send(newcomer.to_message(true));
            let own = newcomer.to_message(false);
            self.registry.for_each(|other| {
                if other.id != id {
                    newcomer.send(other.to_message(false));
                    other.send(own.clone());
                }
            });
        }

        tracing::info!(player_id = id, players = self.registry.len(), "Player joined");
        Some(id)
    }

    /// Apply a client's reported state and forward the result to everyone else.
    pub fn apply_input(&mut self, id: u32, msg: &PlayerMessage) {
        let Some(player) = self.registry.get_mut(id) else {
            return;
        };
        player.apply_input(msg, self.input_policy);
        let snapshot = player.to_message(false);
        notify(&self.registry, &snapshot, Target::AllExcept(id));
    }

    /// Remove a player. If it held the tag, hand the tag to a random
    /// remaining player. Everyone left is told about the new holder and
    /// the departure.
    pub fn leave(&mut self, id: u32) -> Option<Player> {
        let removed = self.registry.leave(id)?;

        let new_tag = if removed.is_tag {
            self.registry.random_other_tag_candidate(id).map(|p| {
                p.is_tag = true;
                p.to_message(false)
            })
        } else {
            None
        };

        if let Some(snapshot) = &new_tag {
            tracing::info!(from = id, to = snapshot.id, "Tag reassigned after disconnect");
            notify(&self.registry, snapshot, Target::All);
        }
        notify(&self.registry, &PlayerMessage::disconnected(id), Target::All);

        tracing::info!(player_id = id, players = self.registry.len(), "Player left");
        Some(removed)
    }

    /// Advance the simulation one tick. A tag transfer is announced to
    /// every player once, old holder first.
    pub fn tick(&mut self, now: Instant) -> Option<TagTransfer> {
        let transfer = physics::step(&mut self.registry, &self.physics, now)?;

        for id in [transfer.from, transfer.to] {
            if let Some(player) = self.registry.get(id) {
                let snapshot = player.to_message(false);
                notify(&self.registry, &snapshot, Target::All);
            }
        }
        tracing::debug!(from = transfer.from, to = transfer.to, "Tag transferred");
        Some(transfer)
    }
}

/// Run the main game loop. Owns all game state.
pub async fn run_game_loop(mut cmd_rx: mpsc::Receiver<GameCommand>, config: ServerConfig) {
    let mut game = GameLoop::new(&config);

    let tick_duration = Duration::from_secs_f64(1.0 / config.tick_rate_hz as f64);
    let mut tick_interval = tokio::time::interval(tick_duration);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                game.tick(Instant::now());
            }

            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => game.handle_command(cmd),
                None => break,
            },
        }
    }

    tracing::info!("Game loop ended");
}
