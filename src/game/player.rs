//! Player entity: input-driven movement, shooting cooldown, health and progression

use serde::{Deserialize, Serialize};

use super::physics::{Body, BodyId, Vec2};
use super::projectile::ProjectileParams;
use super::{HasBody, PlayerId};

pub const PLAYER_RADIUS: f32 = 20.0;
pub const MAX_PLAYER_RADIUS: f32 = 40.0;
pub const PLAYER_MASS: f32 = 1.0;
/// Force applied per held direction key at speed stat 1
pub const PLAYER_FORCE: f32 = 500.0;
pub const BASE_MAX_HEALTH: f32 = 100.0;
pub const MAX_HEALTH_PER_LEVEL: f32 = 10.0;
pub const RADIUS_PER_LEVEL: f32 = 1.0;
/// Seconds between shots at fire rate 1
pub const BASE_SHOOT_COOLDOWN: f32 = 0.5;
pub const BASE_PROJECTILE_DAMAGE: f32 = 10.0;
pub const BASE_PROJECTILE_SPEED: f32 = 800.0;
pub const MAX_STAT_LEVEL: u32 = 10;
/// Experience scale of the level curve: level = floor(1 + sqrt(xp / LEVEL_CURVE_SCALE))
pub const LEVEL_CURVE_SCALE: f64 = 100.0;

/// Directional and fire flags as last reported by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInputs {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub shoot: bool,
}

/// Upgradeable stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Speed,
    Damage,
    FireRate,
    ProjectileSpeed,
    ProjectileHealth,
}

/// Stat levels, each in `1..=MAX_STAT_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub speed: u32,
    pub damage: u32,
    pub fire_rate: u32,
    pub projectile_speed: u32,
    pub projectile_health: u32,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            speed: 1,
            damage: 1,
            fire_rate: 1,
            projectile_speed: 1,
            projectile_health: 1,
        }
    }
}

impl PlayerStats {
    pub fn get(&self, stat: StatKind) -> u32 {
        match stat {
            StatKind::Speed => self.speed,
            StatKind::Damage => self.damage,
            StatKind::FireRate => self.fire_rate,
            StatKind::ProjectileSpeed => self.projectile_speed,
            StatKind::ProjectileHealth => self.projectile_health,
        }
    }

    fn get_mut(&mut self, stat: StatKind) -> &mut u32 {
        match stat {
            StatKind::Speed => &mut self.speed,
            StatKind::Damage => &mut self.damage,
            StatKind::FireRate => &mut self.fire_rate,
            StatKind::ProjectileSpeed => &mut self.projectile_speed,
            StatKind::ProjectileHealth => &mut self.projectile_health,
        }
    }

    /// Upgrade points already spent across all stats
    pub fn points_spent(&self) -> u32 {
        [
            self.speed,
            self.damage,
            self.fire_rate,
            self.projectile_speed,
            self.projectile_health,
        ]
        .iter()
        .map(|v| v.saturating_sub(1))
        .sum()
    }
}

/// Level reached with `experience` total experience
pub fn level_for_experience(experience: u64) -> u32 {
    (1.0 + (experience as f64 / LEVEL_CURVE_SCALE).sqrt()).floor() as u32
}

/// Authoritative player state
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub body: BodyId,
    /// Facing angle in radians, reported by the client
    pub rotation: f32,
    pub inputs: PlayerInputs,
    /// One-shot fire request from a `shoot` message
    pub shoot_requested: bool,
    pub level: u32,
    pub experience: u64,
    pub health: f32,
    pub max_health: f32,
    pub stats: PlayerStats,
    pub shoot_cooldown: f32,
}

impl Player {
    /// Build the body for a freshly spawned player
    pub fn body_for(position: Vec2) -> Body {
        Body::new(position, PLAYER_RADIUS, PLAYER_MASS)
    }

    pub fn new(id: PlayerId, body: BodyId) -> Self {
        Self {
            id,
            body,
            rotation: 0.0,
            inputs: PlayerInputs::default(),
            shoot_requested: false,
            level: 1,
            experience: 0,
            health: BASE_MAX_HEALTH,
            max_health: BASE_MAX_HEALTH,
            stats: PlayerStats::default(),
            shoot_cooldown: 0.0,
        }
    }

    /// Push the body according to held keys and tick down the weapon cooldown.
    /// The force is integrated by the next physics step.
    pub fn update(&mut self, dt: f32, body: &mut Body) {
        let mut direction = Vec2::ZERO;
        if self.inputs.up {
            direction.y -= 1.0;
        }
        if self.inputs.down {
            direction.y += 1.0;
        }
        if self.inputs.left {
            direction.x -= 1.0;
        }
        if self.inputs.right {
            direction.x += 1.0;
        }
        body.apply_force(direction * (PLAYER_FORCE * self.stats.speed as f32));

        self.shoot_cooldown = (self.shoot_cooldown - dt).max(0.0);
    }

    pub fn can_shoot(&self) -> bool {
        self.shoot_cooldown <= 0.0
    }

    pub fn wants_to_shoot(&self) -> bool {
        self.inputs.shoot || self.shoot_requested
    }

    /// Start the weapon cooldown and return the parameters of the fired projectile
    pub fn shoot(&mut self) -> ProjectileParams {
        self.shoot_cooldown = BASE_SHOOT_COOLDOWN / self.stats.fire_rate as f32;
        self.shoot_requested = false;
        ProjectileParams {
            damage: BASE_PROJECTILE_DAMAGE * self.stats.damage as f32,
            speed: BASE_PROJECTILE_SPEED * self.stats.projectile_speed as f32,
            health: self.stats.projectile_health as f32,
        }
    }

    /// Returns true if this damage kills the player
    pub fn take_damage(&mut self, amount: f32) -> bool {
        self.health = (self.health - amount.max(0.0)).max(0.0);
        self.health <= 0.0
    }

    pub fn heal(&mut self, amount: f32) {
        self.health = (self.health + amount.max(0.0)).min(self.max_health);
    }

    /// Add experience, returns true if a level was gained
    pub fn add_experience(&mut self, amount: u64) -> bool {
        self.experience = self.experience.saturating_add(amount);
        let level = level_for_experience(self.experience);
        if level > self.level {
            self.level_up(level);
            true
        } else {
            false
        }
    }

    /// Raise the level and restore full health at the new maximum
    pub fn level_up(&mut self, new_level: u32) {
        self.level = new_level.max(self.level);
        self.max_health = BASE_MAX_HEALTH + (self.level - 1) as f32 * MAX_HEALTH_PER_LEVEL;
        self.heal(self.max_health);
    }

    /// Body radius for the current level
    pub fn radius(&self) -> f32 {
        (PLAYER_RADIUS + (self.level - 1) as f32 * RADIUS_PER_LEVEL).min(MAX_PLAYER_RADIUS)
    }

    /// One point per level gained, minus points already spent
    pub fn upgrade_points(&self) -> u32 {
        (self.level - 1).saturating_sub(self.stats.points_spent())
    }

    /// Spend one point on `stat`; false leaves the player unchanged
    pub fn upgrade(&mut self, stat: StatKind) -> bool {
        if self.upgrade_points() == 0 || self.stats.get(stat) >= MAX_STAT_LEVEL {
            return false;
        }
        *self.stats.get_mut(stat) += 1;
        true
    }
}

impl HasBody for Player {
    fn body_id(&self) -> BodyId {
        self.body
    }
}
