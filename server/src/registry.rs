use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tag_shared::config::PhysicsConfig;
use tag_shared::vec2::vec2;

use crate::fanout::OutboundQueue;
use crate::player::Player;

/// Every connected player, keyed by id.
///
/// Owned by the game loop task; all access happens there, so joins,
/// leaves and full passes never interleave. Iteration is in ascending id
/// order, which is also join order.
pub struct Registry {
    players: BTreeMap<u32, Player>,
    next_player_id: u32,
    rng: ChaCha8Rng,
    spawn_width: f64,
    spawn_height: f64,
}

impl Registry {
    pub fn new(physics: &PhysicsConfig, rng_seed: Option<u64>) -> Self {
        use rand::SeedableRng;
        let rng = match rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            players: BTreeMap::new(),
            next_player_id: 0,
            rng,
            spawn_width: physics.spawn_width,
            spawn_height: physics.spawn_height,
        }
    }

    /// Register a new player at a random spawn point. The first player in
    /// an empty registry holds the tag.
    ///
    /// Returns `None` once the id space is used up; ids are never reused.
    pub fn join(&mut self, outbound: OutboundQueue) -> Option<&Player> {
        let id = self.next_player_id;
        self.next_player_id = id.checked_add(1)?;

        let position = vec2(
            (self.rng.gen::<f64>() - 0.5) * self.spawn_width,
            (self.rng.gen::<f64>() - 0.5) * self.spawn_height,
        );
        let is_tag = self.players.is_empty();

        Some(
            self.players
                .entry(id)
                .or_insert_with(|| Player::new(id, position, is_tag, outbound)),
        )
    }

    /// Remove a player, returning it if it was registered.
    pub fn leave(&mut self, id: u32) -> Option<Player> {
        self.players.remove(&id)
    }

    pub fn for_each(&self, f: impl FnMut(&Player)) {
        self.players.values().for_each(f);
    }

    pub fn for_each_mut(&mut self, f: impl FnMut(&mut Player)) {
        self.players.values_mut().for_each(f);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Pick a uniformly random registered player other than `excluding`.
    pub fn random_other_tag_candidate(&mut self, excluding: u32) -> Option<&mut Player> {
        let candidates: Vec<u32> = self
            .players
            .keys()
            .copied()
            .filter(|&id| id != excluding)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let id = candidates[self.rng.gen_range(0..candidates.len())];
        self.players.get_mut(&id)
    }

    pub fn get(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Id of the current tag holder, if any
    pub fn tag_holder(&self) -> Option<u32> {
        self.players.values().find(|p| p.is_tag).map(|p| p.id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn set_next_player_id(&mut self, id: u32) {
        self.next_player_id = id;
    }
}
