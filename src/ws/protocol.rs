//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bumped whenever a message shape changes incompatibly
pub const PROTOCOL_VERSION: u32 = 1;

pub type PlayerId = Uuid;
pub type CoinId = Uuid;

/// Player records keyed by id, as carried by `init` and `state_update`
pub type PlayerMap = BTreeMap<PlayerId, PlayerRecord>;

/// Directional intents held during one input sample
///
/// Directions are not exclusive: opposite keys cancel and diagonals add.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInput {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
}

impl MoveInput {
    /// True when at least one direction is held
    pub fn is_active(&self) -> bool {
        self.up || self.down || self.left || self.right
    }

    /// Unit-step direction as (dx, dy), screen coordinates (y grows down)
    pub fn direction(&self) -> (f32, f32) {
        let dx = self.right as i8 - self.left as i8;
        let dy = self.down as i8 - self.up as i8;
        (dx as f32, dy as f32)
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Movement intent for one input sample
    Move { input: MoveInput },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Handshake sent only to the joining client
    Init {
        self_id: PlayerId,
        players: PlayerMap,
        coins: Vec<CoinRecord>,
        map: MapBounds,
        version: u32,
    },

    /// A new player entered
    PlayerJoin { player: PlayerRecord },

    /// A player departed; receivers drop it from all local state
    PlayerLeave { id: PlayerId },

    /// A coin now exists
    CoinSpawn { coin: CoinRecord },

    /// Score credit and coin removal, as one event
    ScoreUpdate {
        player_id: PlayerId,
        score: u32,
        coin_id: CoinId,
    },

    /// Periodic snapshot; the only source of truth for positions
    StateUpdate {
        players: PlayerMap,
        /// Server wall-clock capture time in unix millis
        timestamp: u64,
    },
}

/// Player state as seen on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub score: u32,
    /// Cosmetic `#rrggbb` color
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinRecord {
    pub id: CoinId,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub width: f32,
    pub height: f32,
}

/// Protocol decoding/encoding failures
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ClientMsg {
    /// Decode a text frame; unknown types and bad payloads are rejected
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerMsg {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire name of the message, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMsg::Init { .. } => "init",
            ServerMsg::PlayerJoin { .. } => "player_join",
            ServerMsg::PlayerLeave { .. } => "player_leave",
            ServerMsg::CoinSpawn { .. } => "coin_spawn",
            ServerMsg::ScoreUpdate { .. } => "score_update",
            ServerMsg::StateUpdate { .. } => "state_update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn move_decodes_from_browser_shape() {
        let msg = ClientMsg::decode(
            r#"{"type":"move","input":{"up":true,"down":false,"left":false,"right":true}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMsg::Move {
                input: MoveInput {
                    up: true,
                    right: true,
                    ..MoveInput::default()
                }
            }
        );
    }

    #[test]
    fn missing_directions_default_to_released() {
        let msg = ClientMsg::decode(r#"{"type":"move","input":{"left":true}}"#).unwrap();
        let ClientMsg::Move { input } = msg;
        assert!(input.left && !input.right && !input.up && !input.down);
    }

    #[test]
    fn unknown_type_fails_closed() {
        assert!(ClientMsg::decode(r#"{"type":"teleport","x":1}"#).is_err());
        assert!(ClientMsg::decode(r#"{"input":{"up":true}}"#).is_err());
        assert!(ClientMsg::decode("not json").is_err());
    }

    #[test]
    fn score_update_uses_camel_case_fields() {
        let player_id = Uuid::new_v4();
        let coin_id = Uuid::new_v4();
        let msg = ServerMsg::ScoreUpdate {
            player_id,
            score: 3,
            coin_id,
        };
        let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "score_update",
                "playerId": player_id.to_string(),
                "score": 3,
                "coinId": coin_id.to_string(),
            })
        );
    }

    #[test]
    fn init_carries_self_id_and_version() {
        let self_id = Uuid::new_v4();
        let msg = ServerMsg::Init {
            self_id,
            players: PlayerMap::new(),
            coins: vec![],
            map: MapBounds {
                width: 800.0,
                height: 600.0,
            },
            version: PROTOCOL_VERSION,
        };
        let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "init");
        assert_eq!(value["selfId"], self_id.to_string());
        assert_eq!(value["version"], PROTOCOL_VERSION);
        assert_eq!(value["map"]["width"], 800.0);
    }

    #[test]
    fn state_update_players_are_keyed_by_id() {
        let id = Uuid::new_v4();
        let mut players = PlayerMap::new();
        players.insert(
            id,
            PlayerRecord {
                id,
                x: 1.5,
                y: 2.0,
                score: 0,
                color: "#ff0000".to_string(),
            },
        );
        let msg = ServerMsg::StateUpdate {
            players,
            timestamp: 1234,
        };
        let text = msg.encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["players"][id.to_string()]["x"], 1.5);
        assert_eq!(ServerMsg::decode(&text).unwrap(), msg);
    }

    #[test]
    fn direction_sums_and_cancels() {
        let diagonal = MoveInput {
            up: true,
            right: true,
            ..MoveInput::default()
        };
        assert_eq!(diagonal.direction(), (1.0, -1.0));

        let cancelled = MoveInput {
            left: true,
            right: true,
            ..MoveInput::default()
        };
        assert_eq!(cancelled.direction(), (0.0, 0.0));
        assert!(cancelled.is_active());
        assert!(!MoveInput::default().is_active());
    }
}
