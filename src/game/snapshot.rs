//! Snapshot building and fan-out to connected clients

use std::collections::HashMap;

use tracing::debug;

use crate::net::{DelayLine, DelayLineError};
use crate::util::time::unix_millis;
use crate::ws::protocol::{PlayerId, ServerMsg};

use super::world::World;

/// Builds `state_update` messages from the world
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    /// Timestamp of the previous snapshot, kept so timestamps never go backwards
    last_timestamp: u64,
    /// Snapshots built so far
    built: u64,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot stamped with the current wall-clock time
    pub fn build(&mut self, world: &World) -> ServerMsg {
        self.build_at(world, unix_millis())
    }

    /// Build a snapshot stamped at `now` (clamped to be non-decreasing)
    pub fn build_at(&mut self, world: &World, now: u64) -> ServerMsg {
        let timestamp = now.max(self.last_timestamp);
        self.last_timestamp = timestamp;
        self.built += 1;

        ServerMsg::StateUpdate {
            players: world.player_records(),
            timestamp,
        }
    }

    pub fn built(&self) -> u64 {
        self.built
    }
}

/// Outbound links to every connected client
///
/// A send that cannot be queued is dropped for that client only; the next
/// snapshot supersedes whatever was lost.
#[derive(Default)]
pub struct Broadcaster {
    clients: HashMap<PlayerId, DelayLine<ServerMsg>>,
    dropped: u64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: PlayerId, outbound: DelayLine<ServerMsg>) {
        self.clients.insert(id, outbound);
    }

    pub fn unregister(&mut self, id: &PlayerId) -> bool {
        self.clients.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Messages dropped because a client's queue was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Send to a single client
    pub fn send_to(&mut self, id: &PlayerId, msg: ServerMsg) -> bool {
        let Some(link) = self.clients.get(id) else {
            return false;
        };
        match link.schedule(msg) {
            Ok(()) => true,
            Err(e) => {
                self.record_drop(id, e);
                false
            }
        }
    }

    /// Send to every client
    pub fn broadcast(&mut self, msg: &ServerMsg) {
        self.broadcast_except(None, msg);
    }

    /// Send to every client other than `exclude`
    pub fn broadcast_except(&mut self, exclude: Option<&PlayerId>, msg: &ServerMsg) {
        let mut failed = Vec::new();
        for (id, link) in &self.clients {
            if Some(id) == exclude {
                continue;
            }
            if let Err(e) = link.schedule(msg.clone()) {
                failed.push((*id, e));
            }
        }
        for (id, e) in failed {
            self.record_drop(&id, e);
        }
    }

    fn record_drop(&mut self, id: &PlayerId, reason: DelayLineError) {
        self.dropped += 1;
        debug!(player_id = %id, reason = %reason, "Dropped outbound message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::net::forward_into;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[test]
    fn snapshot_copies_every_player() {
        let mut world = World::new(WorldConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let a = world.spawn_player(&mut rng).id;
        let b = world.spawn_player(&mut rng).id;

        let mut builder = SnapshotBuilder::new();
        match builder.build_at(&world, 1000) {
            ServerMsg::StateUpdate { players, timestamp } => {
                assert_eq!(timestamp, 1000);
                assert_eq!(players.len(), 2);
                assert_eq!(players[&a].x, world.players[&a].x);
                assert_eq!(players[&b].color, world.players[&b].color);
            }
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(builder.built(), 1);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let world = World::new(WorldConfig::default());
        let mut builder = SnapshotBuilder::new();

        let stamps: Vec<u64> = [500, 400, 600]
            .into_iter()
            .map(|now| match builder.build_at(&world, now) {
                ServerMsg::StateUpdate { timestamp, .. } => timestamp,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(stamps, vec![500, 500, 600]);
    }

    fn link(capacity: usize) -> (DelayLine<ServerMsg>, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(capacity);
        (DelayLine::spawn(Duration::ZERO, capacity, forward_into(tx)), rx)
    }

    #[tokio::test]
    async fn broadcast_skips_excluded_client() {
        let mut broadcaster = Broadcaster::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (link_a, mut rx_a) = link(8);
        let (link_b, mut rx_b) = link(8);
        broadcaster.register(a, link_a);
        broadcaster.register(b, link_b);

        let msg = ServerMsg::PlayerLeave { id: Uuid::new_v4() };
        broadcaster.broadcast_except(Some(&a), &msg);
        broadcaster.send_to(&a, msg.clone());

        assert_eq!(rx_b.recv().await, Some(msg.clone()));
        assert_eq!(rx_a.recv().await, Some(msg));
        assert_eq!(broadcaster.dropped(), 0);
    }

    #[tokio::test]
    async fn dead_client_does_not_block_the_rest() {
        let mut broadcaster = Broadcaster::new();
        let (dead, alive) = (Uuid::new_v4(), Uuid::new_v4());
        let (dead_link, dead_rx) = link(1);
        let (alive_link, mut alive_rx) = link(8);
        drop(dead_rx);
        broadcaster.register(dead, dead_link);
        broadcaster.register(alive, alive_link);

        for i in 0..5u64 {
            broadcaster.broadcast(&ServerMsg::StateUpdate {
                players: Default::default(),
                timestamp: i,
            });
            tokio::task::yield_now().await;
        }

        for i in 0..5u64 {
            match alive_rx.recv().await {
                Some(ServerMsg::StateUpdate { timestamp, .. }) => assert_eq!(timestamp, i),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(broadcaster.dropped() > 0);
    }

    #[test]
    fn send_to_unknown_client_is_false() {
        let mut broadcaster = Broadcaster::new();
        assert!(!broadcaster.send_to(&Uuid::new_v4(), ServerMsg::PlayerLeave { id: Uuid::new_v4() }));
        assert!(broadcaster.is_empty());
    }
}
