//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::util::rate_limit::INBOUND_RATE_LIMIT;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (empty = any origin)
    pub client_origins: Vec<String>,

    /// Simulation and broadcast tunables
    pub world: WorldConfig,

    /// Artificial one-way delay applied to every inbound and outbound message
    pub latency: Duration,
    /// Depth of each client's outbound queue before sends are dropped
    pub outbound_queue: usize,
    /// Inbound messages allowed per connection per second
    pub inbound_rate_limit: u32,

    /// Client-side interpolation delay
    pub render_delay: Duration,
    /// Client-side snapshot buffer capacity
    pub snapshot_buffer_capacity: usize,
}

/// Tunables owned by the world simulation
#[derive(Clone, Debug, PartialEq)]
pub struct WorldConfig {
    pub map_width: f32,
    pub map_height: f32,
    /// Side length of a player's square footprint
    pub player_size: f32,
    /// Side length of a coin's square footprint
    pub coin_size: f32,
    /// Distance moved per accepted move input
    pub player_speed: f32,
    /// Snapshot broadcasts per second
    pub tick_rate: u32,
    pub coin_spawn_interval: Duration,
    /// Fixed RNG seed for reproducible spawns; random when unset
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            map_width: 800.0,
            map_height: 600.0,
            player_size: 20.0,
            coin_size: 10.0,
            player_speed: 5.0,
            tick_rate: 20,
            coin_spawn_interval: Duration::from_millis(3000),
            seed: None,
        }
    }
}

impl WorldConfig {
    /// Reject configurations that would break the bounds invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.map_width > 0.0 && self.map_height > 0.0) {
            return Err(ConfigError::Invalid("map dimensions must be positive"));
        }
        if !(self.player_size > 0.0 && self.coin_size > 0.0) {
            return Err(ConfigError::Invalid("entity sizes must be positive"));
        }
        if self.player_size > self.map_width.min(self.map_height)
            || self.coin_size > self.map_width.min(self.map_height)
        {
            return Err(ConfigError::Invalid("entities must fit inside the map"));
        }
        if !(self.player_speed >= 0.0) {
            return Err(ConfigError::Invalid("player speed must not be negative"));
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick rate must be positive"));
        }
        if self.coin_spawn_interval.is_zero() {
            return Err(ConfigError::Invalid("coin spawn interval must be positive"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            client_origins: Vec::new(),
            world: WorldConfig::default(),
            latency: Duration::from_millis(200),
            outbound_queue: 256,
            inbound_rate_limit: INBOUND_RATE_LIMIT,
            render_delay: Duration::from_millis(100),
            snapshot_buffer_capacity: 20,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup; every key is optional
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        // PORT wins over SERVER_ADDR so hosted deployments can inject it
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| defaults.server_addr.to_string()),
        };

        let client_origins = lookup("CLIENT_ORIGIN")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let world = WorldConfig {
            map_width: parse_or(&lookup, "MAP_WIDTH", defaults.world.map_width)?,
            map_height: parse_or(&lookup, "MAP_HEIGHT", defaults.world.map_height)?,
            player_size: parse_or(&lookup, "PLAYER_SIZE", defaults.world.player_size)?,
            coin_size: parse_or(&lookup, "COIN_SIZE", defaults.world.coin_size)?,
            player_speed: parse_or(&lookup, "PLAYER_SPEED", defaults.world.player_speed)?,
            tick_rate: parse_or(&lookup, "TICK_RATE", defaults.world.tick_rate)?,
            coin_spawn_interval: Duration::from_millis(parse_or(
                &lookup,
                "COIN_SPAWN_INTERVAL_MS",
                defaults.world.coin_spawn_interval.as_millis() as u64,
            )?),
            seed: lookup("WORLD_SEED")
                .map(|raw| raw.parse().map_err(|_| ConfigError::Parse("WORLD_SEED")))
                .transpose()?,
        };
        world.validate()?;

        let snapshot_buffer_capacity = parse_or(
            &lookup,
            "SNAPSHOT_BUFFER_CAPACITY",
            defaults.snapshot_buffer_capacity,
        )?;
        if snapshot_buffer_capacity == 0 {
            return Err(ConfigError::Invalid("snapshot buffer capacity must be positive"));
        }

        let outbound_queue = parse_or(&lookup, "OUTBOUND_QUEUE", defaults.outbound_queue)?;
        if outbound_queue == 0 {
            return Err(ConfigError::Invalid("outbound queue must be positive"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            client_origins,
            world,
            latency: Duration::from_millis(parse_or(
                &lookup,
                "LATENCY_MS",
                defaults.latency.as_millis() as u64,
            )?),
            outbound_queue,
            inbound_rate_limit: parse_or(&lookup, "INBOUND_RATE_LIMIT", defaults.inbound_rate_limit)?,
            render_delay: Duration::from_millis(parse_or(
                &lookup,
                "RENDER_DELAY_MS",
                defaults.render_delay.as_millis() as u64,
            )?),
            snapshot_buffer_capacity,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Parse(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not parse environment variable: {0}")]
    Parse(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
