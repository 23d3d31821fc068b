//! Coin Arena - authoritative multiplayer coin-collecting game
//!
//! The server owns the world and streams full snapshots over WebSocket;
//! clients buffer those snapshots and render slightly in the past,
//! interpolating between the two that bracket the render time.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod net;
pub mod util;
pub mod ws;
