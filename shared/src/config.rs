/// Arena and craft tuning. Units are per simulation tick unless noted.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PhysicsConfig {
    /// Heading change per tick at full turn input (radians)
    pub turn_speed: f64,
    /// Velocity gained per tick while thrusting
    pub acceleration: f64,
    pub max_speed: f64,
    /// Speed multiplier applied each tick while coasting
    pub drag: f64,
    /// Horizontal wrap limit, the arena spans -x_limit..x_limit
    pub x_limit: f64,
    /// Lower wrap limit, the arena spans -y_limit..y_limit + y_overhang
    pub y_limit: f64,
    pub y_overhang: f64,
    /// Spawn area, centered on the origin
    pub spawn_width: f64,
    pub spawn_height: f64,
    /// Contact distance for a tag transfer
    pub tag_radius: f64,
    /// Minimum time between tag transfers involving the same player (seconds)
    pub tag_cooldown_secs: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            turn_speed: 0.1,
            acceleration: 0.1,
            max_speed: 5.0,
            drag: 0.99,
            x_limit: 700.0,
            y_limit: 520.0,
            y_overhang: 120.0,
            spawn_width: 1280.0,
            spawn_height: 720.0,
            tag_radius: 50.0,
            tag_cooldown_secs: 3.0,
        }
    }
}

impl PhysicsConfig {
    /// Upper y wrap line
    pub fn y_top(&self) -> f64 {
        self.y_limit + self.y_overhang
    }

    pub fn tag_cooldown(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.tag_cooldown_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.turn_speed.is_finite() {
            return Err("turn_speed must be finite".to_string());
        }
        if !self.acceleration.is_finite() || self.acceleration < 0.0 {
            return Err("acceleration must be finite and >= 0".to_string());
        }
        if !self.max_speed.is_finite() || self.max_speed <= 0.0 {
            return Err("max_speed must be finite and > 0".to_string());
        }
        if !self.drag.is_finite() || self.drag <= 0.0 || self.drag > 1.0 {
            return Err("drag must be in (0, 1]".to_string());
        }
        if !self.x_limit.is_finite() || self.x_limit <= 0.0 {
            return Err("x_limit must be finite and > 0".to_string());
        }
        if !self.y_limit.is_finite() || self.y_limit <= 0.0 {
            return Err("y_limit must be finite and > 0".to_string());
        }
        if !self.y_overhang.is_finite() || self.y_overhang < 0.0 {
            return Err("y_overhang must be finite and >= 0".to_string());
        }
        if !self.spawn_width.is_finite() || self.spawn_width < 0.0 {
            return Err("spawn_width must be finite and >= 0".to_string());
        }
        if !self.spawn_height.is_finite() || self.spawn_height < 0.0 {
            return Err("spawn_height must be finite and >= 0".to_string());
        }
        if !self.tag_radius.is_finite() || self.tag_radius <= 0.0 {
            return Err("tag_radius must be finite and > 0".to_string());
        }
        if !self.tag_cooldown_secs.is_finite() || self.tag_cooldown_secs < 0.0 {
            return Err("tag_cooldown_secs must be finite and >= 0".to_string());
        }
        Ok(())
    }
}
