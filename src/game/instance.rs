//! One game instance: entity bookkeeping and the authoritative tick

use std::collections::BTreeMap;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::food::{Food, FoodKind, FoodTargets};
use super::physics::{BodyId, PhysicsEngine, Vec2};
use super::player::{Player, PlayerInputs, StatKind, PLAYER_RADIUS};
use super::projectile::{Projectile, ProjectileParams, PROJECTILE_RADIUS};
use super::snapshot::{FoodState, GameState, PlayerState, ProjectileState, WorldBounds};
use super::{HasBody, PlayerId};

/// Experience awarded to a shooter per level of the player they defeat
pub const KILL_EXPERIENCE_PER_LEVEL: u64 = 500;
/// Gap between a shooter's edge and a freshly spawned projectile
const MUZZLE_GAP: f32 = 1.0;

/// Per-instance simulation settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameConfig {
    pub world_width: f32,
    pub world_height: f32,
    /// Upper bound for one tick's delta, in seconds
    pub max_tick_delta: f32,
    pub food_targets: FoodTargets,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            world_width: 2000.0,
            world_height: 2000.0,
            max_tick_delta: 0.1,
            food_targets: FoodTargets::default(),
        }
    }
}

/// A player defeated during a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kill {
    pub killer_id: PlayerId,
    pub victim_id: PlayerId,
    pub experience_awarded: u64,
}

/// Side effects of one tick that the transport reports to clients
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub projectiles_created: Vec<ProjectileState>,
    pub kills: Vec<Kill>,
}

fn overlapping(physics: &PhysicsEngine, a: &impl HasBody, b: &impl HasBody) -> bool {
    match (physics.body(a.body_id()), physics.body(b.body_id())) {
        (Some(a), Some(b)) => a.overlaps(b),
        _ => false,
    }
}

pub struct GameInstance {
    physics: PhysicsEngine,
    players: BTreeMap<PlayerId, Player>,
    food: BTreeMap<BodyId, Food>,
    projectiles: BTreeMap<BodyId, Projectile>,
    config: GameConfig,
    rng: ChaCha8Rng,
    tick: u64,
    last_update: Instant,
}

impl GameInstance {
    pub fn new(config: GameConfig, seed: u64) -> Self {
        let mut game = Self {
            physics: PhysicsEngine::new(config.world_width, config.world_height),
            players: BTreeMap::new(),
            food: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            last_update: Instant::now(),
        };
        game.respawn_food();
        game
    }

    pub fn world_bounds(&self) -> WorldBounds {
        let (width, height) = self.physics.bounds();
        WorldBounds { width, height }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn food_count(&self, kind: FoodKind) -> usize {
        self.food.values().filter(|f| f.kind == kind).count()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    /// Uniform position that keeps a circle of `radius` inside the world
    fn random_position(&mut self, radius: f32) -> Vec2 {
        let mut axis = |extent: f32| {
            if extent > 2.0 * radius {
                self.rng.gen_range(radius..extent - radius)
            } else {
                extent / 2.0
            }
        };
        let x = axis(self.config.world_width);
        let y = axis(self.config.world_height);
        Vec2::new(x, y)
    }

    /// Add a player at a random position. Joining twice keeps the existing player.
    pub fn add_player(&mut self, id: PlayerId) -> Option<PlayerState> {
        if !self.players.contains_key(&id) {
            self.spawn_player(id);
        }
        self.player_state(&id)
    }

    fn spawn_player(&mut self, id: PlayerId) {
        let position = self.random_position(PLAYER_RADIUS);
        let body = self.physics.add_body(Player::body_for(position));
        self.players.insert(id, Player::new(id, body));
    }

    /// Remove a player and its body; unknown ids are ignored
    pub fn remove_player(&mut self, id: &PlayerId) -> bool {
        match self.players.remove(id) {
            Some(player) => {
                self.physics.remove_body(player.body);
                true
            }
            None => false,
        }
    }

    /// Replace a defeated player with a fresh one under the same id
    fn respawn_player(&mut self, id: PlayerId) {
        if self.remove_player(&id) {
            self.spawn_player(id);
        }
    }

    /// Overwrite a player's live input state
    pub fn set_input(&mut self, id: &PlayerId, inputs: PlayerInputs, rotation: f32) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.inputs = inputs;
                player.rotation = rotation;
                true
            }
            None => false,
        }
    }

    /// Mark intent to fire on the next tick
    pub fn request_shoot(&mut self, id: &PlayerId) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.shoot_requested = true;
                true
            }
            None => false,
        }
    }

    pub fn upgrade_player(&mut self, id: &PlayerId, stat: StatKind) -> bool {
        self.players
            .get_mut(id)
            .map(|player| player.upgrade(stat))
            .unwrap_or(false)
    }

    pub fn player_state(&self, id: &PlayerId) -> Option<PlayerState> {
        let player = self.players.get(id)?;
        let body = self.physics.body(player.body)?;
        Some(PlayerState::new(player, body))
    }

    pub fn player_states(&self) -> Vec<PlayerState> {
        self.players
            .values()
            .filter_map(|p| self.physics.body(p.body).map(|b| PlayerState::new(p, b)))
            .collect()
    }

    /// Run one tick using the wall time elapsed since the previous one
    pub fn update(&mut self) -> TickReport {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.step(elapsed)
    }

    /// Run one tick of `dt` seconds (clamped to the configured maximum)
    pub fn step(&mut self, dt: f32) -> TickReport {
        let dt = dt.clamp(0.0, self.config.max_tick_delta);
        let mut report = TickReport::default();
        self.tick += 1;

        self.physics.update(dt);

        for player in self.players.values_mut() {
            if let Some(body) = self.physics.body_mut(player.body) {
                player.update(dt, body);
            }
        }
        for projectile in self.projectiles.values_mut() {
            projectile.update(dt);
        }

        let shooters: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.wants_to_shoot())
            .map(|p| p.id)
            .collect();
        for id in shooters {
            if let Some(created) = self.try_fire(id) {
                report.projectiles_created.push(created);
            }
        }

        self.collect_food();
        report.kills = self.resolve_projectile_hits();
        self.reap_projectiles();
        self.respawn_food();

        report
    }

    /// Fire if the cooldown allows; a request made during the cooldown is dropped
    fn try_fire(&mut self, id: PlayerId) -> Option<ProjectileState> {
        let player = self.players.get_mut(&id)?;
        if !player.can_shoot() {
            player.shoot_requested = false;
            return None;
        }
        let body = self.physics.body(player.body)?;
        let rotation = player.rotation;
        let origin = body.position
            + Vec2::from_angle(rotation) * (body.radius + PROJECTILE_RADIUS + MUZZLE_GAP);
        let params = player.shoot();

        self.spawn_projectile(id, origin, rotation, params)
    }

    fn spawn_projectile(
        &mut self,
        owner_id: PlayerId,
        origin: Vec2,
        direction: f32,
        params: ProjectileParams,
    ) -> Option<ProjectileState> {
        let body = self
            .physics
            .add_body(Projectile::body_for(origin, direction, &params));
        let projectile = Projectile::new(body, owner_id, &params);
        let state = self
            .physics
            .body(body)
            .map(|b| ProjectileState::new(&projectile, b));
        self.projectiles.insert(body, projectile);
        state
    }

    /// Players at least as large as a piece of food eat it on contact.
    /// Returns the kinds eaten, in order.
    fn collect_food(&mut self) -> Vec<FoodKind> {
        let mut eaten = Vec::new();

        for player in self.players.values_mut() {
            let Some(player_radius) = self.physics.body(player.body).map(|b| b.radius) else {
                continue;
            };

            let reachable: Vec<BodyId> = self
                .food
                .values()
                .filter(|food| {
                    self.physics
                        .body(food.body)
                        .is_some_and(|b| player_radius >= b.radius)
                        && overlapping(&self.physics, &*player, *food)
                })
                .map(|food| food.body)
                .collect();

            for id in reachable {
                let Some(food) = self.food.remove(&id) else {
                    continue;
                };
                self.physics.remove_body(id);
                eaten.push(food.kind);

                if player.add_experience(food.experience) {
                    if let Some(body) = self.physics.body_mut(player.body) {
                        body.radius = player.radius();
                    }
                }
            }
        }

        eaten
    }

    pub(crate) fn award_experience(&mut self, id: &PlayerId, amount: u64) {
        let Some(player) = self.players.get_mut(id) else {
            return;
        };
        if player.add_experience(amount) {
            if let Some(body) = self.physics.body_mut(player.body) {
                body.radius = player.radius();
            }
        }
    }

    /// Apply projectile hits against non-owners; a spent projectile stops hitting this tick
    fn resolve_projectile_hits(&mut self) -> Vec<Kill> {
        let mut kills = Vec::new();
        let projectile_ids: Vec<BodyId> = self.projectiles.keys().copied().collect();

        for projectile_id in projectile_ids {
            let Some(owner_id) = self
                .projectiles
                .get(&projectile_id)
                .filter(|p| !p.is_dead())
                .map(|p| p.owner_id)
            else {
                continue;
            };

            let targets: Vec<PlayerId> = self.players.keys().copied().collect();
            for target_id in targets {
                if target_id == owner_id {
                    continue;
                }
                let (Some(projectile), Some(target)) = (
                    self.projectiles.get(&projectile_id),
                    self.players.get(&target_id),
                ) else {
                    continue;
                };
                if !overlapping(&self.physics, projectile, target) {
                    continue;
                }

                let damage = projectile.damage;
                let spent = self
                    .projectiles
                    .get_mut(&projectile_id)
                    .map_or(true, |p| p.take_damage(1.0));

                let victim = self.players.get_mut(&target_id).and_then(|target| {
                    target.take_damage(damage).then_some(target.level)
                });

                if let Some(victim_level) = victim {
                    let experience_awarded = victim_level as u64 * KILL_EXPERIENCE_PER_LEVEL;
                    self.award_experience(&owner_id, experience_awarded);
                    self.respawn_player(target_id);
                    kills.push(Kill {
                        killer_id: owner_id,
                        victim_id: target_id,
                        experience_awarded,
                    });
                }

                if spent {
                    break;
                }
            }
        }

        kills
    }

    fn reap_projectiles(&mut self) {
        let dead: Vec<BodyId> = self
            .projectiles
            .values()
            .filter(|p| p.is_dead())
            .map(|p| p.body)
            .collect();

        for id in dead {
            self.projectiles.remove(&id);
            self.physics.remove_body(id);
        }
    }

    /// Top each food kind back up to its target population
    fn respawn_food(&mut self) {
        for kind in FoodKind::ALL {
            let missing = self
                .config
                .food_targets
                .for_kind(kind)
                .saturating_sub(self.food_count(kind));

            for _ in 0..missing {
                let position = self.random_position(kind.spec().radius);
                let body = self.physics.add_body(Food::body_for(kind, position));
                self.food.insert(body, Food::new(body, kind));
            }
        }
    }

    /// Read-only snapshot, ordered by player id and body id
    pub fn get_state(&self) -> GameState {
        GameState {
            tick: self.tick,
            players: self.player_states(),
            food: self
                .food
                .values()
                .filter_map(|f| self.physics.body(f.body).map(|b| FoodState::new(f, b)))
                .collect(),
            projectiles: self
                .projectiles
                .values()
                .filter_map(|p| self.physics.body(p.body).map(|b| ProjectileState::new(p, b)))
                .collect(),
            world_bounds: self.world_bounds(),
        }
    }
}
