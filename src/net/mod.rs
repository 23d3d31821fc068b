//! Connection plumbing shared by the server and the client

pub mod delay;

pub use delay::{forward_into, DelayLine, DelayLineError};
