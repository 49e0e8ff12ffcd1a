//! Server-side resolution of client-reported hits
//!
//! The shooter reports both its own snapshot and its target's. A hit only
//! lands when both snapshots agree with the server's positions within the
//! desync tolerance, so a lagging or tampered client cannot shoot from a
//! place it never was.

use crate::config::GameConfig;
use crate::session::SessionRegistry;
use log::{debug, info};
use shared::DamageRequest;

#[derive(Debug, Clone, PartialEq)]
pub enum DamageOutcome {
    /// Damage was applied. `killed` carries (killer, victim) names when the
    /// hit took the target to zero health.
    Applied { killed: Option<(String, String)> },
    /// One of the referenced players has no session.
    UnknownPlayer,
    /// A client-reported position is too far from the server's.
    Desync {
        local_distance: f64,
        target_distance: f64,
    },
    NegativeDamage,
}

/// Applies one damage request to the registry.
pub fn resolve(
    request: &DamageRequest,
    sessions: &mut SessionRegistry,
    config: &GameConfig,
    now: f64,
) -> DamageOutcome {
    if request.damage < 0.0 {
        return DamageOutcome::NegativeDamage;
    }

    let local_id = request.local_player.id;
    let target_id = request.target_player.id;

    let (local_distance, killer_name) = match sessions.get(local_id) {
        Some(local) => (
            local.position.distance_to(&request.local_player.position),
            local.name.clone(),
        ),
        None => return DamageOutcome::UnknownPlayer,
    };
    let target_distance = match sessions.get(target_id) {
        Some(target) => target.position.distance_to(&request.target_player.position),
        None => return DamageOutcome::UnknownPlayer,
    };

    if local_distance > config.desync_tolerance || target_distance > config.desync_tolerance {
        debug!(
            "Rejected hit {} -> {}: out of sync by {:.2} / {:.2}",
            local_id, target_id, local_distance, target_distance
        );
        return DamageOutcome::Desync {
            local_distance,
            target_distance,
        };
    }

    let Some(target) = sessions.get_mut(target_id) else {
        return DamageOutcome::UnknownPlayer;
    };
    let was_alive = !target.is_dead();
    target.health = (target.health - request.damage).clamp(0.0, config.max_health);
    target.last_damage_time = Some(now);

    let killed = if was_alive && target.is_dead() {
        info!("{} killed {}", killer_name, target.name);
        Some((killer_name, target.name.clone()))
    } else {
        None
    };

    DamageOutcome::Applied { killed }
}
