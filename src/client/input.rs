//! Movement input sampling

use crate::ws::protocol::{ClientMsg, MoveInput};

/// Move messages sent per second while a direction is held
pub const INPUT_RATE_HZ: u32 = 20;

/// Tracks held directions and decides what to send each sampling tick
#[derive(Debug, Default, Clone)]
pub struct InputSampler {
    held: MoveInput,
    connected: bool,
}

impl InputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_held(&mut self, held: MoveInput) {
        self.held = held;
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Message to send on this tick, if any
    ///
    /// Nothing is sent while disconnected or when no direction is held.
    pub fn sample(&self) -> Option<ClientMsg> {
        if !self.connected || !self.held.is_active() {
            return None;
        }
        Some(ClientMsg::Move { input: self.held })
    }
}
