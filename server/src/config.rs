use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use tag_shared::config::PhysicsConfig;

use crate::fanout::{effective_capacity, MAX_QUEUE_CAPACITY};

/// Which inbound fields a client is allowed to overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InputPolicy {
    /// Client-reported position, heading and velocity are accepted verbatim
    /// along with turn and thrust.
    #[default]
    ClientAuthoritative,
    /// Only turn and thrust are accepted; the simulation is the sole writer
    /// of kinematic state.
    ServerAuthoritative,
}

/// Command-line flags
#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative tag game server")]
pub struct ServerArgs {
    /// Address to bind the HTTP/WebSocket listener to
    #[arg(long, default_value = "0.0.0.0:80")]
    pub addr: SocketAddr,
    /// Simulation ticks per second
    #[arg(long, default_value_t = 60)]
    pub tick_rate: u32,
    /// Pending snapshots kept per connection before the oldest are dropped,
    /// rounded up to a power of two (at most 65536)
    #[arg(long, default_value_t = 100)]
    pub queue_capacity: usize,
    /// Largest inbound WebSocket message accepted, in bytes
    #[arg(long, default_value_t = 1024)]
    pub max_message_bytes: usize,
    /// Which fields of a client's message the server accepts
    #[arg(long, value_enum, default_value_t = InputPolicy::ClientAuthoritative)]
    pub input_policy: InputPolicy,
    /// Seed for spawn positions and tag reassignment (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,
}

impl ServerArgs {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            listen_addr: self.addr,
            tick_rate_hz: self.tick_rate,
            queue_capacity: self.queue_capacity,
            max_message_bytes: self.max_message_bytes,
            input_policy: self.input_policy,
            rng_seed: self.seed,
            physics: PhysicsConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub tick_rate_hz: u32,
    pub queue_capacity: usize,
    pub max_message_bytes: usize,
    pub input_policy: InputPolicy,
    pub rng_seed: Option<u64>,
    pub physics: PhysicsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 80)),
            tick_rate_hz: 60,
            queue_capacity: 100,
            max_message_bytes: 1024,
            input_policy: InputPolicy::default(),
            rng_seed: None,
            physics: PhysicsConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tick rate must be between 1 and 1000 Hz, got {0}")]
    TickRate(u32),

    #[error("outbound queue capacity must be between 1 and {max}, got {0}", max = MAX_QUEUE_CAPACITY)]
    QueueCapacity(usize),

    #[error("max message size must be at least 64 bytes, got {0}")]
    MessageSize(usize),

    #[error("invalid physics config: {0}")]
    Physics(String),
}

impl ServerConfig {
    /// Snapshots each connection actually buffers before dropping the oldest
    pub fn effective_queue_capacity(&self) -> usize {
        effective_capacity(self.queue_capacity)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err(ConfigError::TickRate(self.tick_rate_hz));
        }
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::QueueCapacity(self.queue_capacity));
        }
        if self.max_message_bytes < 64 {
            return Err(ConfigError::MessageSize(self.max_message_bytes));
        }
        self.physics.validate().map_err(ConfigError::Physics)
    }
}
