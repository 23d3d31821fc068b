//! Movement, coin pickup and coin spawning

use rand::Rng;
use uuid::Uuid;

use crate::ws::protocol::{CoinId, MoveInput, PlayerId};

use super::world::{Coin, World};

/// A coin credited to a player; removal and credit happen together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub player_id: PlayerId,
    /// Player's score after the credit
    pub score: u32,
    pub coin_id: CoinId,
}

/// Stateless rules applied to the world by the session actor
pub struct SimulationEngine;

impl SimulationEngine {
    /// Move a player by one input sample, clamp into bounds, then collect coins
    ///
    /// Inputs for players that are no longer in the world are dropped.
    pub fn apply_input(world: &mut World, player_id: PlayerId, input: MoveInput) -> Vec<Collection> {
        let speed = world.config.player_speed;
        let (max_x, max_y) = world.player_max();

        let Some(player) = world.players.get_mut(&player_id) else {
            return Vec::new();
        };

        let (dx, dy) = input.direction();
        player.x = (player.x + dx * speed).clamp(0.0, max_x);
        player.y = (player.y + dy * speed).clamp(0.0, max_y);

        Self::collect_coins(world, player_id)
    }

    /// Credit every coin overlapping the player, newest coin first
    pub fn collect_coins(world: &mut World, player_id: PlayerId) -> Vec<Collection> {
        let World {
            config,
            players,
            coins,
        } = world;

        let Some(player) = players.get_mut(&player_id) else {
            return Vec::new();
        };

        let mut collected = Vec::new();
        for i in (0..coins.len()).rev() {
            let coin = &coins[i];
            if !Self::overlaps(
                player.x,
                player.y,
                config.player_size,
                coin.x,
                coin.y,
                config.coin_size,
            ) {
                continue;
            }

            let coin = coins.remove(i);
            player.score += 1;
            collected.push(Collection {
                player_id,
                score: player.score,
                coin_id: coin.id,
            });
        }

        collected
    }

    /// Create one coin at a random integer position inside bounds
    pub fn spawn_coin<R: Rng>(world: &mut World, rng: &mut R) -> Coin {
        let (max_x, max_y) = world.coin_max();
        let coin = Coin {
            id: Uuid::new_v4(),
            x: (rng.gen::<f32>() * max_x).floor(),
            y: (rng.gen::<f32>() * max_y).floor(),
        };
        world.coins.push(coin.clone());
        coin
    }

    /// Axis-aligned overlap of two squares given by top-left corner and side
    ///
    /// Squares that only share an edge do not overlap.
    pub fn overlaps(ax: f32, ay: f32, a_size: f32, bx: f32, by: f32, b_size: f32) -> bool {
        ax < bx + b_size && ax + a_size > bx && ay < by + b_size && ay + a_size > by
    }
}
