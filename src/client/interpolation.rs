//! Interpolation.
//!
//! The server sends discrete snapshots at a fixed rate. The client renders
//! slightly in the past, at `now - render_delay`, and blends the two
//! buffered snapshots that bracket that instant.

use std::time::Duration;

use crate::ws::protocol::PlayerMap;

use super::buffer::SnapshotBuffer;

#[derive(Debug, Clone, Copy)]
pub struct Interpolator {
    render_delay: Duration,
}

impl Interpolator {
    pub fn new(render_delay: Duration) -> Self {
        Self { render_delay }
    }

    /// Player positions at `now_ms - render_delay`
    ///
    /// Returns `None` when no buffered snapshot is old enough. When the
    /// render time is past the newest snapshot, that snapshot is returned
    /// as-is; there is no extrapolation.
    pub fn interpolate(&self, buffer: &SnapshotBuffer, now_ms: u64) -> Option<PlayerMap> {
        // A render time before the epoch predates every snapshot
        let render_time = now_ms.checked_sub(self.render_delay.as_millis() as u64)?;

        let (index, t1) = buffer
            .iter()
            .enumerate()
            .rev()
            .find(|(_, snap)| snap.timestamp <= render_time)?;

        let Some(t2) = buffer.get(index + 1) else {
            return Some(t1.players.clone());
        };

        // t2 is the first entry newer than render_time, so the span is non-zero
        let span = (t2.timestamp - t1.timestamp) as f64;
        let fraction = ((render_time - t1.timestamp) as f64 / span) as f32;

        let players = t1
            .players
            .iter()
            .filter_map(|(id, p1)| {
                let p2 = t2.players.get(id)?;
                let mut blended = p1.clone();
                blended.x = p1.x + (p2.x - p1.x) * fraction;
                blended.y = p1.y + (p2.y - p1.y) * fraction;
                Some((*id, blended))
            })
            .collect();

        Some(players)
    }
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
