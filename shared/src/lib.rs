//! Types shared between the tag server and its clients.
//!
//! Everything a client needs to interpret the wire feed lives here: the
//! player snapshot message, the arena/physics tuning, and the 2D vector
//! helpers the simulation is written against.

pub mod config;
pub mod protocol;
pub mod vec2;
