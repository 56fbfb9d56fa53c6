//! Tag game server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod config;
pub mod fanout;
pub mod game_loop;
pub mod physics;
pub mod player;
pub mod registry;
pub mod routes;
pub mod status;
pub mod ws;
