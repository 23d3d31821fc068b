//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameSession, WorldHandle};

/// Commands the world session can have queued before senders wait
const COMMAND_MAILBOX: usize = 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub world: WorldHandle,
}

impl AppState {
    /// Build state plus the session actor; the caller spawns `GameSession::run`
    pub fn new(config: Config) -> (Self, GameSession) {
        let (session, world) = GameSession::new(config.world.clone(), COMMAND_MAILBOX);

        let state = Self {
            config: Arc::new(config),
            world,
        };

        (state, session)
    }
}
