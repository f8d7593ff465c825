//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::driver::{self, EMPTY_GAME_GRACE};
use crate::game::registry::Placement;
use crate::game::{GameEntry, GameId, GameRegistry, JoinOutcome, PlayerId, RegistryError};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<GameRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(GameRegistry::new(config.game_capacity, config.game));

        Self {
            config: Arc::new(config),
            registry,
        }
    }

    /// Matchmake without joining, starting a tick loop if a game had to be created
    pub fn find_or_create_game(&self) -> GameId {
        let Placement { entry, created } = self.registry.find_or_create_game();
        if created {
            self.start_game_loop(entry.clone());
        }
        entry.id.clone()
    }

    /// Join a player, starting a tick loop if a game had to be created
    pub fn join_game(
        &self,
        player_id: PlayerId,
        requested: Option<&str>,
    ) -> Result<JoinOutcome, RegistryError> {
        let outcome = self.registry.join(player_id, requested)?;
        if outcome.created {
            self.start_game_loop(outcome.entry.clone());
        }
        Ok(outcome)
    }

    fn start_game_loop(&self, entry: Arc<GameEntry>) {
        driver::spawn(
            self.registry.clone(),
            entry,
            self.config.tick_rate,
            EMPTY_GAME_GRACE,
        );
    }
}
