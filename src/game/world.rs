//! Authoritative world model: players, coins and map bounds

use std::collections::HashMap;

use rand::Rng;
use uuid::Uuid;

use crate::config::WorldConfig;
use crate::ws::protocol::{CoinId, CoinRecord, MapBounds, PlayerId, PlayerMap, PlayerRecord};

/// Player state in the world (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub score: u32,
    /// Assigned at creation, never changes
    pub color: String,
}

impl Player {
    pub fn new(id: PlayerId, x: f32, y: f32, color: String) -> Self {
        Self {
            id,
            x,
            y,
            score: 0,
            color,
        }
    }

    pub fn to_record(&self) -> PlayerRecord {
        PlayerRecord {
            id: self.id,
            x: self.x,
            y: self.y,
            score: self.score,
            color: self.color.clone(),
        }
    }
}

/// A collectible; position is fixed for its whole life
#[derive(Debug, Clone, PartialEq)]
pub struct Coin {
    pub id: CoinId,
    pub x: f32,
    pub y: f32,
}

impl Coin {
    pub fn to_record(&self) -> CoinRecord {
        CoinRecord {
            id: self.id,
            x: self.x,
            y: self.y,
        }
    }
}

/// Canonical mutable state, owned by the session actor
#[derive(Debug, Clone)]
pub struct World {
    pub config: WorldConfig,
    pub players: HashMap<PlayerId, Player>,
    /// Live coins in spawn order
    pub coins: Vec<Coin>,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            players: HashMap::new(),
            coins: Vec::new(),
        }
    }

    pub fn bounds(&self) -> MapBounds {
        MapBounds {
            width: self.config.map_width,
            height: self.config.map_height,
        }
    }

    /// Largest legal top-left corner for a player
    pub fn player_max(&self) -> (f32, f32) {
        (
            self.config.map_width - self.config.player_size,
            self.config.map_height - self.config.player_size,
        )
    }

    /// Largest legal top-left corner for a coin
    pub fn coin_max(&self) -> (f32, f32) {
        (
            self.config.map_width - self.config.coin_size,
            self.config.map_height - self.config.coin_size,
        )
    }

    /// Create a player at a random in-bounds position with a random color
    pub fn spawn_player<R: Rng>(&mut self, rng: &mut R) -> &Player {
        let id = Uuid::new_v4();
        let (max_x, max_y) = self.player_max();
        let x = rng.gen_range(0.0..=max_x);
        let y = rng.gen_range(0.0..=max_y);
        let color = random_color(rng);

        self.players.entry(id).or_insert(Player::new(id, x, y, color))
    }

    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.remove(id)
    }

    pub fn contains_player(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    /// Copy of every player, keyed by id
    pub fn player_records(&self) -> PlayerMap {
        self.players
            .values()
            .map(|p| (p.id, p.to_record()))
            .collect()
    }

    pub fn coin_records(&self) -> Vec<CoinRecord> {
        self.coins.iter().map(Coin::to_record).collect()
    }
}

/// Random `#rrggbb` color
pub fn random_color<R: Rng>(rng: &mut R) -> String {
    format!("#{:06x}", rng.gen_range(0..=0xFF_FFFFu32))
}
