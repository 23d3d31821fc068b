//! Client-side state: snapshot buffering, interpolation and input sampling

pub mod buffer;
pub mod input;
pub mod interpolation;
pub mod state;

pub use buffer::{Snapshot, SnapshotBuffer};
pub use input::{InputSampler, INPUT_RATE_HZ};
pub use interpolation::Interpolator;
pub use state::ClientState;
