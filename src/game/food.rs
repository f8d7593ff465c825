//! Collectible food shapes

use serde::{Deserialize, Serialize};

use super::physics::{Body, BodyId, Vec2};
use super::HasBody;

const FOOD_DAMPING: f32 = 0.98;

/// Food shapes, from most common to rarest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodKind {
    Square,
    Triangle,
    Pentagon,
}

/// Fixed physical and reward properties of a food kind
#[derive(Debug, Clone, Copy)]
pub struct FoodSpec {
    pub radius: f32,
    pub mass: f32,
    pub experience: u64,
    pub color: u32,
}

impl FoodKind {
    pub const ALL: [FoodKind; 3] = [FoodKind::Square, FoodKind::Triangle, FoodKind::Pentagon];

    pub fn spec(self) -> FoodSpec {
        match self {
            FoodKind::Square => FoodSpec {
                radius: 10.0,
                mass: 0.5,
                experience: 100,
                color: 0xFFFF00,
            },
            FoodKind::Triangle => FoodSpec {
                radius: 15.0,
                mass: 0.8,
                experience: 300,
                color: 0xFF0000,
            },
            FoodKind::Pentagon => FoodSpec {
                radius: 25.0,
                mass: 1.2,
                experience: 900,
                color: 0x0000FF,
            },
        }
    }
}

/// Target population per food kind, topped up every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoodTargets {
    pub square: usize,
    pub triangle: usize,
    pub pentagon: usize,
}

impl FoodTargets {
    pub fn for_kind(&self, kind: FoodKind) -> usize {
        match kind {
            FoodKind::Square => self.square,
            FoodKind::Triangle => self.triangle,
            FoodKind::Pentagon => self.pentagon,
        }
    }
}

impl Default for FoodTargets {
    fn default() -> Self {
        Self {
            square: 100,
            triangle: 50,
            pentagon: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Food {
    pub body: BodyId,
    pub kind: FoodKind,
    pub experience: u64,
    pub color: u32,
}

impl Food {
    /// Build the body for a new piece of food at `position`
    pub fn body_for(kind: FoodKind, position: Vec2) -> Body {
        let spec = kind.spec();
        Body::new(position, spec.radius, spec.mass).with_damping(FOOD_DAMPING)
    }

    pub fn new(body: BodyId, kind: FoodKind) -> Self {
        let spec = kind.spec();
        Self {
            body,
            kind,
            experience: spec.experience,
            color: spec.color,
        }
    }
}

impl HasBody for Food {
    fn body_id(&self) -> BodyId {
        self.body
    }
}
