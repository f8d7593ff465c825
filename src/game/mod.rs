//! Game simulation modules

pub mod driver;
pub mod food;
pub mod instance;
pub mod physics;
pub mod player;
pub mod projectile;
pub mod registry;
pub mod snapshot;

pub use instance::GameConfig;
pub use registry::{GameEntry, GameRegistry, JoinOutcome, RegistryError};
pub use snapshot::{GameState, PlayerState, ProjectileState, WorldBounds};

use physics::BodyId;
use uuid::Uuid;

/// Players are identified by their connection id
pub type PlayerId = Uuid;

/// Short human-typable game code
pub type GameId = String;

/// An entity backed by a body in the physics engine
pub trait HasBody {
    fn body_id(&self) -> BodyId;
}
