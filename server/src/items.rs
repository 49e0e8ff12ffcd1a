//! Spawned pickups and proximity-based pickup resolution

use crate::config::GameConfig;
use crate::map::ItemRespawnPoint;
use crate::session::SessionRegistry;
use crate::utils::item_name;
use log::{debug, info};
use rand::Rng;
use shared::{Vector3, WorldItem};

/// Item type players consume by walking over it.
pub const CONSUMABLE_ITEM: i64 = 1;

const MAX_ITEM_ID: u32 = 100_000;

/// A completed pickup, reported so the caller can announce it.
#[derive(Debug, Clone, PartialEq)]
pub struct Pickup {
    pub player_name: String,
    pub item_type: i64,
}

#[derive(Debug, Default)]
pub struct WorldItemRegistry {
    items: Vec<WorldItem>,
    dirty: bool,
}

impl WorldItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places an item with a fresh id that no live item uses.
    ///
    /// The item cap keeps the live count far below the id space.
    pub fn spawn<R: Rng>(
        &mut self,
        rng: &mut R,
        vector: Vector3,
        item_type: i64,
        now: f64,
    ) -> u32 {
        debug_assert!(self.items.len() < MAX_ITEM_ID as usize);
        let id = loop {
            let candidate = rng.gen_range(1..=MAX_ITEM_ID);
            if !self.items.iter().any(|item| item.id == candidate) {
                break candidate;
            }
        };
        self.items.push(WorldItem {
            id,
            vector,
            item_type,
            created_at: now,
        });
        self.dirty = true;
        id
    }

    /// Rolls every item respawn point once.
    ///
    /// A point only produces an item when the world is below its item cap and
    /// no live item already sits within `item_spacing` of it.
    pub fn roll_spawns<R: Rng>(
        &mut self,
        rng: &mut R,
        points: &[ItemRespawnPoint],
        config: &GameConfig,
        now: f64,
    ) {
        for point in points {
            if self.items.len() >= config.max_world_items {
                return;
            }
            if !rng.gen_bool(point.spawn_chance_per_tick.clamp(0.0, 1.0)) {
                continue;
            }
            if self.is_close_to(&point.position, config.item_spacing) {
                continue;
            }
            let id = self.spawn(rng, point.position, point.item_id, now);
            debug!("Spawned {} {} at {:?}", item_name(point.item_id), id, point.position);
        }
    }

    /// Resolves pickups for every live player, in registry order.
    ///
    /// Each player takes at most one item per sweep and an item is removed the
    /// moment it is taken, so when two players qualify for the same item the
    /// earlier session gets it.
    pub fn sweep_pickups(
        &mut self,
        sessions: &mut SessionRegistry,
        config: &GameConfig,
    ) -> Vec<Pickup> {
        let mut pickups = Vec::new();

        for player in sessions.iter_mut() {
            if player.is_dead() {
                continue;
            }
            let Some(index) = self.items.iter().position(|item| {
                item.item_type == CONSUMABLE_ITEM
                    && player.position.distance_to(&item.vector) < config.pickup_radius
            }) else {
                continue;
            };

            let item = self.items.remove(index);
            player.inventory.push(item.item_type);
            self.dirty = true;
            info!("{} picked up {}!", player.name, item_name(item.item_type));
            pickups.push(Pickup {
                player_name: player.name.clone(),
                item_type: item.item_type,
            });
        }

        if !pickups.is_empty() {
            sessions.mark_dirty();
        }
        pickups
    }

    /// Drops items that fell out of the world or outlived the despawn age.
    pub fn cleanup(&mut self, config: &GameConfig, now: f64) -> usize {
        let before = self.items.len();
        self.items.retain(|item| {
            let fell = item.vector.y < config.item_floor;
            let expired =
                config.item_despawn_time > 0.0 && now - item.created_at > config.item_despawn_time;
            !(fell || expired)
        });
        let removed = before - self.items.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    pub fn is_close_to(&self, point: &Vector3, distance: f64) -> bool {
        self.items
            .iter()
            .any(|item| item.vector.distance_to(point) < distance)
    }

    pub fn get(&self, id: u32) -> Option<&WorldItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Full snapshot for `worldItemData`.
    pub fn snapshot(&self) -> Vec<WorldItem> {
        self.items.clone()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Spawn;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{PlayerData, IDENTITY_QUATERNION};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn add_player(sessions: &mut SessionRegistry, id: i64, at: Vector3, config: &GameConfig) {
        sessions.upsert(PlayerData::new(id, &format!("p{}", id), "v1"), config, 0.0, || {
            Spawn {
                position: at,
                rotation: IDENTITY_QUATERNION,
            }
        });
    }

    #[test]
    fn test_spawn_assigns_unique_ids() {
        let mut items = WorldItemRegistry::new();
        let mut rng = rng();
        let mut ids = Vec::new();
        for _ in 0..200 {
            ids.push(items.spawn(&mut rng, Vector3::ZERO, 1, 0.0));
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 200);
        assert!(ids.iter().all(|id| (1..=MAX_ITEM_ID).contains(id)));
    }

    #[test]
    fn test_pickup_within_radius() {
        let config = GameConfig::default();
        let mut sessions = SessionRegistry::new();
        let mut items = WorldItemRegistry::new();
        let mut rng = rng();

        add_player(&mut sessions, 1, Vector3::new(0.0, 0.0, 0.0), &config);
        let near = items.spawn(&mut rng, Vector3::new(0.3, 0.0, 0.0), 1, 0.0);
        let far = items.spawn(&mut rng, Vector3::new(5.0, 0.0, 0.0), 1, 0.0);
        items.clear_dirty();

        let pickups = items.sweep_pickups(&mut sessions, &config);
        assert_eq!(pickups.len(), 1);
        assert_eq!(pickups[0].player_name, "p1");
        assert!(items.get(near).is_none());
        assert!(items.get(far).is_some());
        assert!(items.is_dirty());
        assert_eq!(sessions.get(1).unwrap().inventory, vec![1, 1]);
    }

    #[test]
    fn test_pickup_radius_is_exclusive() {
        let config = GameConfig::default();
        let mut sessions = SessionRegistry::new();
        let mut items = WorldItemRegistry::new();

        add_player(&mut sessions, 1, Vector3::ZERO, &config);
        items.spawn(&mut rng(), Vector3::new(0.5, 0.0, 0.0), 1, 0.0);

        assert!(items.sweep_pickups(&mut sessions, &config).is_empty());
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_pickup_is_exactly_once() {
        let config = GameConfig::default();
        let mut sessions = SessionRegistry::new();
        let mut items = WorldItemRegistry::new();

        add_player(&mut sessions, 1, Vector3::ZERO, &config);
        add_player(&mut sessions, 2, Vector3::new(0.1, 0.0, 0.0), &config);
        items.spawn(&mut rng(), Vector3::new(0.05, 0.0, 0.0), 1, 0.0);

        let pickups = items.sweep_pickups(&mut sessions, &config);
        assert_eq!(pickups.len(), 1);
        assert!(items.is_empty());
        assert_eq!(sessions.get(1).unwrap().inventory, vec![1, 1]);
        assert_eq!(sessions.get(2).unwrap().inventory, vec![1]);
    }

    #[test]
    fn test_one_item_per_player_per_sweep() {
        let config = GameConfig::default();
        let mut sessions = SessionRegistry::new();
        let mut items = WorldItemRegistry::new();
        let mut rng = rng();

        add_player(&mut sessions, 1, Vector3::ZERO, &config);
        items.spawn(&mut rng, Vector3::new(0.1, 0.0, 0.0), 1, 0.0);
        items.spawn(&mut rng, Vector3::new(-0.1, 0.0, 0.0), 1, 0.0);

        assert_eq!(items.sweep_pickups(&mut sessions, &config).len(), 1);
        assert_eq!(items.len(), 1);
        assert_eq!(items.sweep_pickups(&mut sessions, &config).len(), 1);
        assert!(items.is_empty());
    }

    #[test]
    fn test_non_consumables_and_dead_players_are_skipped() {
        let config = GameConfig::default();
        let mut sessions = SessionRegistry::new();
        let mut items = WorldItemRegistry::new();
        let mut rng = rng();

        add_player(&mut sessions, 1, Vector3::ZERO, &config);
        items.spawn(&mut rng, Vector3::ZERO, 3, 0.0);
        assert!(items.sweep_pickups(&mut sessions, &config).is_empty());

        items.spawn(&mut rng, Vector3::ZERO, 1, 0.0);
        sessions.get_mut(1).unwrap().health = 0.0;
        assert!(items.sweep_pickups(&mut sessions, &config).is_empty());
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_roll_spawns_respects_spacing_and_cap() {
        let config = GameConfig {
            max_world_items: 2,
            ..GameConfig::default()
        };
        let mut items = WorldItemRegistry::new();
        let mut rng = rng();
        let point = |x: f64| ItemRespawnPoint {
            position: Vector3::new(x, 0.0, 0.0),
            item_id: 1,
            spawn_chance_per_tick: 1.0,
        };
        let points = vec![point(0.0), point(0.5), point(10.0), point(20.0)];

        items.roll_spawns(&mut rng, &points, &config, 0.0);
        assert_eq!(items.len(), 2);
        assert!(items.is_close_to(&Vector3::ZERO, 0.1));
        assert!(items.is_close_to(&Vector3::new(10.0, 0.0, 0.0), 0.1));
    }

    #[test]
    fn test_roll_spawns_zero_chance() {
        let config = GameConfig::default();
        let mut items = WorldItemRegistry::new();
        let points = vec![ItemRespawnPoint {
            position: Vector3::ZERO,
            item_id: 1,
            spawn_chance_per_tick: 0.0,
        }];

        for _ in 0..100 {
            items.roll_spawns(&mut rng(), &points, &config, 0.0);
        }
        assert!(items.is_empty());
    }

    #[test]
    fn test_cleanup_removes_fallen_and_expired() {
        let config = GameConfig::default();
        let mut items = WorldItemRegistry::new();
        let mut rng = rng();

        let fallen = items.spawn(&mut rng, Vector3::new(0.0, -6.0, 0.0), 1, 100.0);
        let old = items.spawn(&mut rng, Vector3::ZERO, 1, 0.0);
        let fresh = items.spawn(&mut rng, Vector3::new(3.0, 0.0, 0.0), 1, 100.0);
        items.clear_dirty();

        assert_eq!(items.cleanup(&config, 301.0), 2);
        assert!(items.get(fallen).is_none());
        assert!(items.get(old).is_none());
        assert!(items.get(fresh).is_some());
        assert!(items.is_dirty());
    }

    #[test]
    fn test_despawn_disabled() {
        let config = GameConfig {
            item_despawn_time: 0.0,
            ..GameConfig::default()
        };
        let mut items = WorldItemRegistry::new();
        items.spawn(&mut rng(), Vector3::ZERO, 1, 0.0);
        items.clear_dirty();

        assert_eq!(items.cleanup(&config, 1e9), 0);
        assert!(!items.is_dirty());
    }
}
