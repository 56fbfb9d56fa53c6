//! Per-tick craft integration and tag transfer rules.

use std::time::Instant;

use tag_shared::config::PhysicsConfig;
use tag_shared::vec2::{add, distance, length, normalize, scale, Vec2};

use crate::player::Player;
use crate::registry::Registry;

/// A tag handed from one player to another during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagTransfer {
    pub from: u32,
    pub to: u32,
}

/// Advance one player's heading, velocity and position by one tick.
pub fn integrate(player: &mut Player, config: &PhysicsConfig) {
    player.angle -= f64::from(player.turn) * config.turn_speed;

    let acceleration = if player.thrust {
        config.acceleration
    } else {
        0.0
    };
    let mut velocity = add(
        player.velocity,
        scale(Vec2::from_angle(player.angle), acceleration),
    );

    // No drag while thrusting, even when clamped
    let speed = length(velocity);
    if speed > config.max_speed {
        velocity = scale(normalize(velocity), config.max_speed);
    } else if !player.thrust && speed > 0.0 {
        velocity = scale(normalize(velocity), speed * config.drag);
    }

    player.velocity = velocity;
    player.position = wrap_position(add(player.position, velocity), config);
}

/// Wrap a position that left the arena to the opposite edge.
pub fn wrap_position(mut pos: Vec2, config: &PhysicsConfig) -> Vec2 {
    if pos.x > config.x_limit {
        pos.x = -config.x_limit;
    } else if pos.x < -config.x_limit {
        pos.x = config.x_limit;
    }

    if pos.y > config.y_top() {
        pos.y = -config.y_limit;
    } else if pos.y < -config.y_limit {
        pos.y = config.y_top();
    }
    pos
}

/// Scan all pairs in the given order and return the first qualifying
/// transfer: the pair is in contact, exactly one of them holds the tag,
/// and the other is out of cooldown.
pub fn find_tag_transfer(
    players: &[&Player],
    config: &PhysicsConfig,
    now: Instant,
) -> Option<TagTransfer> {
    let cooldown = config.tag_cooldown();
    for (i, first) in players.iter().enumerate() {
        for second in &players[i + 1..] {
            if distance(first.position, second.position) >= config.tag_radius {
                continue;
            }
            let (holder, other) = match (first.is_tag, second.is_tag) {
                (true, false) => (first, second),
                (false, true) => (second, first),
                _ => continue,
            };
            if other.cooldown_elapsed(now, cooldown) {
                return Some(TagTransfer {
                    from: holder.id,
                    to: other.id,
                });
            }
        }
    }
    None
}

/// Move the tag and stamp both players so neither can take part in
/// another transfer until the cooldown passes.
pub fn apply_tag_transfer(registry: &mut Registry, transfer: TagTransfer, now: Instant) {
    if let Some(old) = registry.get_mut(transfer.from) {
        old.is_tag = false;
        old.last_tag_transfer = Some(now);
    }
    if let Some(new) = registry.get_mut(transfer.to) {
        new.is_tag = true;
        new.last_tag_transfer = Some(now);
    }
}

/// Run one simulation tick over the whole registry.
pub fn step(registry: &mut Registry, config: &PhysicsConfig, now: Instant) -> Option<TagTransfer> {
    registry.for_each_mut(|player| integrate(player, config));

    let transfer = {
        let players: Vec<&Player> = registry.iter().collect();
        find_tag_transfer(&players, config, now)
    }?;
    apply_tag_transfer(registry, transfer, now);
    Some(transfer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::OutboundQueue;
    use proptest::prelude::*;
    use std::time::Duration;
    use tag_shared::vec2::vec2;

    fn player_at(id: u32, x: f64, y: f64, is_tag: bool) -> Player {
        Player::new(id, vec2(x, y), is_tag, OutboundQueue::new(4).0)
    }

    fn registry_at(positions: &[(f64, f64)]) -> Registry {
        let mut registry = Registry::new(&PhysicsConfig::default(), Some(1));
        for (i, &(x, y)) in positions.iter().enumerate() {
            registry.join(OutboundQueue::new(4).0).unwrap();
            registry.get_mut(i as u32).unwrap().position = vec2(x, y);
        }
        registry
    }

    #[test]
    fn turn_input_rotates_heading() {
        let config = PhysicsConfig::default();
        let mut p = player_at(0, 0.0, 0.0, false);
        p.turn = 1;
        integrate(&mut p, &config);
        assert!((p.angle - (-0.1)).abs() < 1e-12);
        p.turn = -1;
        integrate(&mut p, &config);
        integrate(&mut p, &config);
        assert!((p.angle - 0.1).abs() < 1e-12);
    }

    #[test]
    fn thrust_accelerates_along_heading() {
        let config = PhysicsConfig::default();
        let mut p = player_at(0, 0.0, 0.0, false);
        p.thrust = true;
        integrate(&mut p, &config);
        assert!((p.velocity.x - 0.1).abs() < 1e-12);
        assert!(p.velocity.y.abs() < 1e-12);
        assert!((p.position.x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn fifty_ticks_of_thrust_reach_max_speed() {
        let config = PhysicsConfig::default();
        let mut p = player_at(0, 0.0, 0.0, false);
        p.thrust = true;
        for _ in 0..50 {
            integrate(&mut p, &config);
        }
        assert!((length(p.velocity) - 5.0).abs() < 1e-9);

        for _ in 0..10 {
            integrate(&mut p, &config);
            assert!((length(p.velocity) - config.max_speed).abs() < 1e-9);
        }
    }

    #[test]
    fn no_drag_while_thrusting() {
        let config = PhysicsConfig::default();
        let mut p = player_at(0, 0.0, 0.0, false);
        p.thrust = true;
        p.angle = std::f64::consts::PI;
        p.velocity = vec2(2.0, 0.0);
        integrate(&mut p, &config);
        // Thrust opposes motion: 2.0 - 0.1, no extra 1% loss
        assert!((p.velocity.x - 1.9).abs() < 1e-12);
    }

    #[test]
    fn coasting_decays_speed_monotonically() {
        let config = PhysicsConfig::default();
        let mut p = player_at(0, 0.0, 0.0, false);
        p.velocity = vec2(3.0, -2.0);
        let mut prev = length(p.velocity);
        for _ in 0..500 {
            integrate(&mut p, &config);
            let speed = length(p.velocity);
            assert!(speed < prev, "speed {} did not drop below {}", speed, prev);
            prev = speed;
        }
    }

    #[test]
    fn coasting_from_rest_stays_at_rest() {
        let config = PhysicsConfig::default();
        let mut p = player_at(0, 12.0, 34.0, false);
        integrate(&mut p, &config);
        assert_eq!(p.velocity, Vec2::ZERO);
        assert_eq!(p.position, vec2(12.0, 34.0));
    }

    #[test]
    fn wraps_right_edge_to_left() {
        let config = PhysicsConfig::default();
        let mut p = player_at(0, 699.0, 0.0, false);
        p.velocity = vec2(2.0, 0.0);
        integrate(&mut p, &config);
        assert_eq!(p.position.x, -700.0);
    }

    #[test]
    fn wraps_left_edge_to_right() {
        let config = PhysicsConfig::default();
        assert_eq!(wrap_position(vec2(-700.01, 5.0), &config), vec2(700.0, 5.0));
        assert_eq!(wrap_position(vec2(-700.0, 5.0), &config), vec2(-700.0, 5.0));
    }

    #[test]
    fn wraps_asymmetric_y_band() {
        let config = PhysicsConfig::default();
        assert_eq!(wrap_position(vec2(0.0, 640.01), &config), vec2(0.0, -520.0));
        assert_eq!(wrap_position(vec2(0.0, 600.0), &config), vec2(0.0, 600.0));
        assert_eq!(wrap_position(vec2(0.0, -520.01), &config), vec2(0.0, 640.0));
        assert_eq!(wrap_position(vec2(0.0, -520.0), &config), vec2(0.0, -520.0));
    }

    #[test]
    fn contact_transfers_tag() {
        let config = PhysicsConfig::default();
        let now = Instant::now();
        let mut registry = registry_at(&[(0.0, 0.0), (30.0, 0.0)]);
        let transfer = step(&mut registry, &config, now);
        assert_eq!(transfer, Some(TagTransfer { from: 0, to: 1 }));
        assert!(!registry.get(0).unwrap().is_tag);
        assert!(registry.get(1).unwrap().is_tag);
        assert_eq!(registry.get(0).unwrap().last_tag_transfer, Some(now));
        assert_eq!(registry.get(1).unwrap().last_tag_transfer, Some(now));
    }

    #[test]
    fn distance_at_radius_is_not_contact() {
        let config = PhysicsConfig::default();
        let mut registry = registry_at(&[(0.0, 0.0), (50.0, 0.0)]);
        assert_eq!(step(&mut registry, &config, Instant::now()), None);
        assert_eq!(registry.tag_holder(), Some(0));
    }

    #[test]
    fn holder_can_be_second_in_pair() {
        let config = PhysicsConfig::default();
        let a = player_at(0, 0.0, 0.0, false);
        let b = player_at(1, 10.0, 0.0, true);
        let transfer = find_tag_transfer(&[&a, &b], &config, Instant::now());
        assert_eq!(transfer, Some(TagTransfer { from: 1, to: 0 }));
    }

    #[test]
    fn cooldown_blocks_retransfer_on_same_pair() {
        let config = PhysicsConfig::default();
        let start = Instant::now();
        let mut registry = registry_at(&[(0.0, 0.0), (10.0, 0.0)]);

        assert!(step(&mut registry, &config, start).is_some());
        for ms in (16..3000).step_by(16) {
            let now = start + Duration::from_millis(ms);
            assert_eq!(step(&mut registry, &config, now), None, "transfer at {}ms", ms);
        }
        assert_eq!(registry.tag_holder(), Some(1));

        let later = start + Duration::from_millis(3001);
        assert_eq!(
            step(&mut registry, &config, later),
            Some(TagTransfer { from: 1, to: 0 })
        );
    }

    #[test]
    fn cooldown_of_candidate_blocks_transfer() {
        let config = PhysicsConfig::default();
        let now = Instant::now();
        let holder = player_at(0, 0.0, 0.0, true);
        let mut fresh = player_at(1, 10.0, 0.0, false);
        fresh.last_tag_transfer = Some(now);
        let later = now + Duration::from_secs(1);
        assert_eq!(find_tag_transfer(&[&holder, &fresh], &config, later), None);
    }

    #[test]
    fn first_pair_in_id_order_wins() {
        let config = PhysicsConfig::default();
        let now = Instant::now();
        let mut registry = registry_at(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        assert_eq!(
            step(&mut registry, &config, now),
            Some(TagTransfer { from: 0, to: 1 })
        );
        // The new holder does not pass it on to player 2 in the same tick
        assert_eq!(registry.tag_holder(), Some(1));
        assert!(!registry.get(2).unwrap().is_tag);
    }

    #[test]
    fn skips_pair_in_cooldown_for_later_pair() {
        let config = PhysicsConfig::default();
        let now = Instant::now();
        let holder = player_at(0, 0.0, 0.0, true);
        let mut cooling = player_at(1, 10.0, 0.0, false);
        cooling.last_tag_transfer = Some(now);
        let ready = player_at(2, -10.0, 0.0, false);
        assert_eq!(
            find_tag_transfer(&[&holder, &cooling, &ready], &config, now),
            Some(TagTransfer { from: 0, to: 2 })
        );
    }

    #[test]
    fn non_holders_in_contact_do_nothing() {
        let config = PhysicsConfig::default();
        let a = player_at(0, 0.0, 0.0, false);
        let b = player_at(1, 1.0, 0.0, false);
        assert_eq!(find_tag_transfer(&[&a, &b], &config, Instant::now()), None);
    }

    proptest! {
        #[test]
        fn speed_never_exceeds_max_after_tick(
            vx in -1.0e6f64..1.0e6,
            vy in -1.0e6f64..1.0e6,
            angle in -10.0f64..10.0,
            turn in -1i8..=1,
            thrust in any::<bool>(),
        ) {
            let config = PhysicsConfig::default();
            let mut p = player_at(0, 0.0, 0.0, false);
            p.velocity = vec2(vx, vy);
            p.angle = angle;
            p.turn = turn;
            p.thrust = thrust;
            integrate(&mut p, &config);
            prop_assert!(length(p.velocity) <= config.max_speed + 1e-9);
        }

        #[test]
        fn position_stays_in_arena(
            x in -700.0f64..700.0,
            y in -520.0f64..640.0,
            vx in -5.0f64..5.0,
            vy in -5.0f64..5.0,
        ) {
            let config = PhysicsConfig::default();
            let mut p = player_at(0, x, y, false);
            p.velocity = vec2(vx, vy);
            integrate(&mut p, &config);
            prop_assert!(p.position.x.abs() <= config.x_limit);
            prop_assert!(p.position.y >= -config.y_limit);
            prop_assert!(p.position.y <= config.y_top());
        }
    }
}
