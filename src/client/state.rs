//! Client-side mirror of the server world

use crate::config::Config;
use crate::ws::protocol::{CoinRecord, MapBounds, PlayerId, PlayerMap, PlayerRecord, ServerMsg};

use super::buffer::{Snapshot, SnapshotBuffer};
use super::interpolation::Interpolator;

/// Everything a client knows about the world, built from server messages
#[derive(Debug)]
pub struct ClientState {
    pub self_id: Option<PlayerId>,
    /// Latest known players; scores follow `score_update`, positions come from init/join
    pub players: PlayerMap,
    pub coins: Vec<CoinRecord>,
    pub map: Option<MapBounds>,
    buffer: SnapshotBuffer,
    interpolator: Interpolator,
}

impl ClientState {
    pub fn new(buffer_capacity: usize, interpolator: Interpolator) -> Self {
        Self {
            self_id: None,
            players: PlayerMap::new(),
            coins: Vec::new(),
            map: None,
            buffer: SnapshotBuffer::new(buffer_capacity),
            interpolator,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.snapshot_buffer_capacity,
            Interpolator::new(config.render_delay),
        )
    }

    /// Fold one server message into the mirror
    pub fn apply(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::Init {
                self_id,
                players,
                coins,
                map,
                ..
            } => {
                self.self_id = Some(self_id);
                self.players = players;
                self.coins = coins;
                self.map = Some(map);
                self.buffer.clear();
            }
            ServerMsg::PlayerJoin { player } => {
                self.players.insert(player.id, player);
            }
            ServerMsg::PlayerLeave { id } => {
                self.players.remove(&id);
            }
            ServerMsg::CoinSpawn { coin } => {
                self.coins.push(coin);
            }
            ServerMsg::ScoreUpdate {
                player_id,
                score,
                coin_id,
            } => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.score = score;
                }
                self.coins.retain(|c| c.id != coin_id);
            }
            ServerMsg::StateUpdate { players, timestamp } => {
                self.buffer.push(Snapshot { timestamp, players });
            }
        }
    }

    /// Players to draw at `now_ms`
    ///
    /// Interpolated positions when the buffer can supply them, the raw
    /// mirror otherwise. Players that have left are never drawn.
    pub fn render_view(&self, now_ms: u64) -> PlayerMap {
        match self.interpolator.interpolate(&self.buffer, now_ms) {
            Some(mut players) => {
                players.retain(|id, _| self.players.contains_key(id));
                players
            }
            None => self.players.clone(),
        }
    }

    /// `(id, score)` pairs, best first; ties broken by id
    pub fn scoreboard(&self) -> Vec<(PlayerId, u32)> {
        let mut rows: Vec<(PlayerId, u32)> =
            self.players.values().map(|p| (p.id, p.score)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        rows
    }

    pub fn buffer(&self) -> &SnapshotBuffer {
        &self.buffer
    }

    pub fn me(&self) -> Option<&PlayerRecord> {
        self.self_id.and_then(|id| self.players.get(&id))
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new(20, Interpolator::default())
    }
}
