//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::food::FoodTargets;
use crate::game::GameConfig;

/// Highest accepted TICK_RATE; keeps the tick period at one millisecond or more
pub const MAX_TICK_RATE: u32 = 1000;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated. Any origin when unset.
    pub client_origin: Option<String>,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Players per game before matchmaking opens a new one
    pub game_capacity: usize,
    /// Settings handed to every new game instance
    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Render-style PORT wins over SERVER_ADDR
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let defaults = GameConfig::default();
        let food = FoodTargets::default();

        let tick_rate: u32 = parse_or(&lookup, "TICK_RATE", 60)?;
        if tick_rate == 0 || tick_rate > MAX_TICK_RATE {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }
        let game_capacity: usize = parse_or(&lookup, "GAME_CAPACITY", 10)?;
        if game_capacity == 0 {
            return Err(ConfigError::Invalid("GAME_CAPACITY"));
        }

        let game = GameConfig {
            world_width: positive(
                parse_or(&lookup, "WORLD_WIDTH", defaults.world_width)?,
                "WORLD_WIDTH",
            )?,
            world_height: positive(
                parse_or(&lookup, "WORLD_HEIGHT", defaults.world_height)?,
                "WORLD_HEIGHT",
            )?,
            max_tick_delta: positive(
                parse_or(&lookup, "MAX_TICK_DELTA", defaults.max_tick_delta)?,
                "MAX_TICK_DELTA",
            )?,
            food_targets: FoodTargets {
                square: parse_or(&lookup, "FOOD_SQUARES", food.square)?,
                triangle: parse_or(&lookup, "FOOD_TRIANGLES", food.triangle)?,
                pentagon: parse_or(&lookup, "FOOD_PENTAGONS", food.pentagon)?,
            },
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").filter(|s| !s.trim().is_empty()),
            tick_rate,
            game_capacity,
            game,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn positive(value: f32, key: &'static str) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(key))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = assert_ok!(config_from(&[]));
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.game_capacity, 10);
        assert_eq!(config.game, GameConfig::default());
        assert!(config.client_origin.is_none());
    }

    #[test]
    fn test_port_overrides_server_addr() {
        let config = assert_ok!(config_from(&[
            ("PORT", "9000"),
            ("SERVER_ADDR", "127.0.0.1:7000"),
        ]));
        assert_eq!(config.server_addr.port(), 9000);

        let config = assert_ok!(config_from(&[("SERVER_ADDR", "127.0.0.1:7000")]));
        assert_eq!(config.server_addr.to_string(), "127.0.0.1:7000");
    }

    #[test]
    fn test_game_settings_from_env() {
        let config = assert_ok!(config_from(&[
            ("WORLD_WIDTH", "500"),
            ("WORLD_HEIGHT", "400"),
            ("FOOD_SQUARES", "12"),
            ("FOOD_PENTAGONS", "0"),
            ("GAME_CAPACITY", "4"),
            ("CLIENT_ORIGIN", "http://localhost:3000"),
        ]));
        assert_eq!(config.game.world_width, 500.0);
        assert_eq!(config.game.world_height, 400.0);
        assert_eq!(config.game.food_targets.square, 12);
        assert_eq!(config.game.food_targets.triangle, 50);
        assert_eq!(config.game.food_targets.pentagon, 0);
        assert_eq!(config.game_capacity, 4);
        assert_eq!(config.client_origin.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert_err!(config_from(&[("TICK_RATE", "fast")]));
        assert_err!(config_from(&[("TICK_RATE", "0")]));
        assert_err!(config_from(&[("GAME_CAPACITY", "-1")]));
        assert_err!(config_from(&[("GAME_CAPACITY", "0")]));
        assert_err!(config_from(&[("WORLD_WIDTH", "-20")]));
        assert_err!(config_from(&[("MAX_TICK_DELTA", "NaN")]));
        assert_err!(config_from(&[("SERVER_ADDR", "not an address")]));
    }

    #[test]
    fn test_tick_rate_upper_bound() {
        let config = assert_ok!(config_from(&[("TICK_RATE", "1000")]));
        assert_eq!(config.tick_rate, MAX_TICK_RATE);

        assert_err!(config_from(&[("TICK_RATE", "1001")]));
        assert_err!(config_from(&[("TICK_RATE", "2000000")]));
    }
}
