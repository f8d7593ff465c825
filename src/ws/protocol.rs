//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::player::{PlayerInputs, StatKind};
use crate::game::{GameId, GameState, PlayerId, PlayerState, ProjectileState, WorldBounds};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join a specific game, or let matchmaking pick one
    JoinGame {
        #[serde(default)]
        game_id: Option<GameId>,
    },

    /// Latest input state, overwrites the previous one
    PlayerInput {
        #[serde(default)]
        inputs: PlayerInputs,
        /// Facing angle in radians
        rotation: f32,
    },

    /// Fire once when the cooldown allows
    Shoot,

    /// Spend an upgrade point
    Upgrade { stat: StatKind },
}

impl ClientMsg {
    /// Shape checks that serde cannot express
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMsg::PlayerInput { rotation, .. } if !rotation.is_finite() => {
                Err(ProtocolError::InvalidRotation)
            }
            _ => Ok(()),
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Confirmation of a join, sent to the joiner only
    GameJoined {
        game_id: GameId,
        player: PlayerState,
        world_bounds: WorldBounds,
    },

    /// A player entered the game
    PlayerJoined { player: PlayerState },

    /// A player left the game
    PlayerLeft { id: PlayerId },

    /// Full snapshot, sent every tick
    GameState { state: GameState },

    /// A projectile was fired this tick
    ProjectileCreated { projectile: ProjectileState },

    /// Upgrade accepted, sent to the upgrader
    PlayerUpdated { player: PlayerState },

    /// The requested game does not exist
    GameNotFound { game_id: GameId },

    /// Error message
    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Rotation must be a finite number")]
    InvalidRotation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_join_game_id_is_optional() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"join_game"}"#).unwrap();
        assert_eq!(msg, ClientMsg::JoinGame { game_id: None });

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"join_game","game_id":"A7Q2"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::JoinGame {
                game_id: Some("A7Q2".to_string())
            }
        );
    }

    #[test]
    fn test_parse_player_input() {
        let raw = json!({
            "type": "player_input",
            "inputs": {"up": true, "left": true},
            "rotation": 1.5
        });
        let msg: ClientMsg = serde_json::from_value(raw).unwrap();

        match msg {
            ClientMsg::PlayerInput { inputs, rotation } => {
                assert!(inputs.up && inputs.left);
                assert!(!inputs.down && !inputs.right && !inputs.shoot);
                assert_eq!(rotation, 1.5);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_shoot_and_upgrade() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"shoot"}"#).unwrap();
        assert_eq!(msg, ClientMsg::Shoot);

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"upgrade","stat":"fire_rate"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::Upgrade {
                stat: StatKind::FireRate
            }
        );
    }

    #[test]
    fn test_unknown_messages_are_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"upgrade","stat":"armor"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"player_input"}"#).is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_rotation() {
        let msg = ClientMsg::PlayerInput {
            inputs: PlayerInputs::default(),
            rotation: f32::INFINITY,
        };
        assert_eq!(msg.validate(), Err(ProtocolError::InvalidRotation));

        let msg = ClientMsg::PlayerInput {
            inputs: PlayerInputs::default(),
            rotation: f32::NAN,
        };
        assert!(msg.validate().is_err());
        assert!(ClientMsg::Shoot.validate().is_ok());
    }

    #[test]
    fn test_server_messages_are_tagged() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(ServerMsg::PlayerLeft { id }).unwrap();
        assert_eq!(json["type"], "player_left");
        assert_eq!(json["id"], id.to_string());

        let json = serde_json::to_value(ServerMsg::GameNotFound {
            game_id: "ZZZZ".to_string(),
        })
        .unwrap();
        assert_eq!(json, json!({"type": "game_not_found", "game_id": "ZZZZ"}));

        let json = serde_json::to_value(ServerMsg::error("not_in_game", "Join first")).unwrap();
        assert_eq!(json["code"], "not_in_game");
    }
}
