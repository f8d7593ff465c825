//! Projectiles fired by players

use super::physics::{Body, BodyId, Vec2};
use super::{HasBody, PlayerId};

pub const PROJECTILE_RADIUS: f32 = 5.0;
pub const PROJECTILE_MASS: f32 = 0.2;
pub const PROJECTILE_DAMPING: f32 = 0.99;
/// Seconds a projectile lives without hitting anything
pub const PROJECTILE_LIFETIME: f32 = 2.0;

/// Firing parameters derived from the shooter's stats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileParams {
    pub damage: f32,
    pub speed: f32,
    /// Number of hits the projectile survives
    pub health: f32,
}

/// Active projectile in the game
#[derive(Debug, Clone)]
pub struct Projectile {
    pub body: BodyId,
    pub owner_id: PlayerId,
    pub damage: f32,
    pub health: f32,
    pub lifetime_remaining: f32,
}

impl Projectile {
    /// Build the body for a projectile leaving `origin` along `direction` (radians)
    pub fn body_for(origin: Vec2, direction: f32, params: &ProjectileParams) -> Body {
        Body::new(origin, PROJECTILE_RADIUS, PROJECTILE_MASS)
            .with_damping(PROJECTILE_DAMPING)
            .with_velocity(Vec2::from_angle(direction) * params.speed)
    }

    pub fn new(body: BodyId, owner_id: PlayerId, params: &ProjectileParams) -> Self {
        Self {
            body,
            owner_id,
            damage: params.damage,
            health: params.health,
            lifetime_remaining: PROJECTILE_LIFETIME,
        }
    }

    /// Age the projectile; motion itself is integrated by the physics engine
    pub fn update(&mut self, dt: f32) {
        self.lifetime_remaining -= dt;
    }

    pub fn is_dead(&self) -> bool {
        self.lifetime_remaining <= 0.0 || self.health <= 0.0
    }

    /// Spend piercing health, returns true if this destroys the projectile
    pub fn take_damage(&mut self, amount: f32) -> bool {
        self.health -= amount;
        self.health <= 0.0
    }
}

impl HasBody for Projectile {
    fn body_id(&self) -> BodyId {
        self.body
    }
}
