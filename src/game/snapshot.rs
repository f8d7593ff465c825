//! Public, read-only views of simulation state sent to clients

use serde::{Deserialize, Serialize};

use super::food::{Food, FoodKind};
use super::physics::{Body, BodyId};
use super::player::{Player, PlayerStats};
use super::projectile::Projectile;
use super::PlayerId;

/// World size in world units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

/// Player fields visible to every client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Facing angle in radians
    pub rotation: f32,
    pub level: u32,
    pub experience: u64,
    pub health: f32,
    pub max_health: f32,
    pub stats: PlayerStats,
    /// Unspent upgrade points
    pub upgrade_points: u32,
}

impl PlayerState {
    pub fn new(player: &Player, body: &Body) -> Self {
        Self {
            id: player.id,
            x: body.position.x,
            y: body.position.y,
            radius: body.radius,
            rotation: player.rotation,
            level: player.level,
            experience: player.experience,
            health: player.health,
            max_health: player.max_health,
            stats: player.stats,
            upgrade_points: player.upgrade_points(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    pub id: BodyId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub owner_id: PlayerId,
}

impl ProjectileState {
    pub fn new(projectile: &Projectile, body: &Body) -> Self {
        Self {
            id: projectile.body,
            x: body.position.x,
            y: body.position.y,
            radius: body.radius,
            owner_id: projectile.owner_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodState {
    pub id: BodyId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub kind: FoodKind,
    pub color: u32,
}

impl FoodState {
    pub fn new(food: &Food, body: &Body) -> Self {
        Self {
            id: food.body,
            x: body.position.x,
            y: body.position.y,
            radius: body.radius,
            kind: food.kind,
            color: food.color,
        }
    }
}

/// Full per-tick snapshot of one game instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Server tick number
    pub tick: u64,
    pub players: Vec<PlayerState>,
    pub food: Vec<FoodState>,
    pub projectiles: Vec<ProjectileState>,
    pub world_bounds: WorldBounds,
}
