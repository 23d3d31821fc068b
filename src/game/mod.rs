//! Authoritative game simulation

pub mod session;
pub mod simulation;
pub mod snapshot;
pub mod world;

pub use session::{GameSession, SessionError, SessionStats, WorldCommand, WorldHandle};
pub use simulation::{Collection, SimulationEngine};
pub use world::{Coin, Player, World};
