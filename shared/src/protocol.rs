use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Snapshot of one player's externally visible state.
///
/// The same shape is used in both directions. Clients only fill the
/// kinematic and input fields; the server sets the flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(default)]
pub struct PlayerMessage {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub turn: i8,
    pub thrust: bool,
    pub is_tag: bool,
    /// Set only on the first snapshot a client receives about itself
    pub is_new: bool,
    pub has_disconnected: bool,
}

impl PlayerMessage {
    /// Notice that player `id` has left. All other fields are zeroed.
    pub fn disconnected(id: u32) -> Self {
        Self {
            id,
            has_disconnected: true,
            ..Default::default()
        }
    }
}
