//! World session actor and its authoritative tick loop

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::WorldConfig;
use crate::net::DelayLine;
use crate::util::time::period_for_rate;
use crate::ws::protocol::{MoveInput, PlayerId, ServerMsg, PROTOCOL_VERSION};

use super::simulation::SimulationEngine;
use super::snapshot::{Broadcaster, SnapshotBuilder};
use super::world::World;

/// Commands accepted by the session actor, processed strictly in arrival order
pub enum WorldCommand {
    /// Create a player for a new connection and start sending to it
    Join {
        outbound: DelayLine<ServerMsg>,
        reply: oneshot::Sender<PlayerId>,
    },
    /// One movement sample from a connected player
    Input { player_id: PlayerId, input: MoveInput },
    /// Connection closed
    Leave { player_id: PlayerId },
}

/// Errors surfaced to connection handlers
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("world session has stopped")]
    Closed,
}

/// Counters published by the actor for the health endpoint
#[derive(Debug, Default)]
pub struct SessionStats {
    players: AtomicUsize,
    coins: AtomicUsize,
    snapshots: AtomicU64,
    dropped: AtomicU64,
}

impl SessionStats {
    pub fn players(&self) -> usize {
        self.players.load(Ordering::Relaxed)
    }

    pub fn coins(&self) -> usize {
        self.coins.load(Ordering::Relaxed)
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct WorldHandle {
    commands: mpsc::Sender<WorldCommand>,
    stats: Arc<SessionStats>,
}

impl WorldHandle {
    /// Register a connection; returns the new player's id
    pub async fn join(&self, outbound: DelayLine<ServerMsg>) -> Result<PlayerId, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(WorldCommand::Join { outbound, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<(), SessionError> {
        self.commands
            .send(WorldCommand::Leave { player_id })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Raw mailbox sender, used to feed delayed inputs
    pub fn commands(&self) -> mpsc::Sender<WorldCommand> {
        self.commands.clone()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

/// The authoritative world session
///
/// Owns the world outright. Inputs, joins, leaves, coin spawns and snapshot
/// broadcasts all run on this one task, so world mutation is serialized and
/// a contested coin goes to whichever input the mailbox delivered first.
pub struct GameSession {
    world: World,
    broadcaster: Broadcaster,
    snapshots: SnapshotBuilder,
    rng: ChaCha8Rng,
    commands: mpsc::Receiver<WorldCommand>,
    stats: Arc<SessionStats>,
}

impl GameSession {
    pub fn new(config: WorldConfig, mailbox: usize) -> (Self, WorldHandle) {
        let (tx, rx) = mpsc::channel(mailbox.max(1));
        let stats = Arc::new(SessionStats::default());

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let handle = WorldHandle {
            commands: tx,
            stats: stats.clone(),
        };

        let session = Self {
            world: World::new(config),
            broadcaster: Broadcaster::new(),
            snapshots: SnapshotBuilder::new(),
            rng,
            commands: rx,
            stats,
        };

        (session, handle)
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!(
            tick_rate = self.world.config.tick_rate,
            coin_spawn_ms = self.world.config.coin_spawn_interval.as_millis() as u64,
            "World session started"
        );

        let mut broadcast_interval = interval(period_for_rate(self.world.config.tick_rate));
        broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let spawn_every = self.world.config.coin_spawn_interval;
        let mut spawn_interval = interval_at(Instant::now() + spawn_every, spawn_every);
        spawn_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = broadcast_interval.tick() => self.broadcast_snapshot(),
                _ = spawn_interval.tick() => self.spawn_coin(),
            }
        }

        info!("World session stopped");
    }

    pub fn handle(&mut self, command: WorldCommand) {
        match command {
            WorldCommand::Join { outbound, reply } => {
                let player_id = self.handle_join(outbound);
                if reply.send(player_id).is_err() {
                    // Connection went away while joining
                    self.handle_leave(player_id);
                }
            }
            WorldCommand::Input { player_id, input } => self.handle_input(player_id, input),
            WorldCommand::Leave { player_id } => self.handle_leave(player_id),
        }
        self.publish_stats();
    }

    fn handle_join(&mut self, outbound: DelayLine<ServerMsg>) -> PlayerId {
        let player = self.world.spawn_player(&mut self.rng).to_record();
        let player_id = player.id;

        self.broadcaster.register(player_id, outbound);

        let init = ServerMsg::Init {
            self_id: player_id,
            players: self.world.player_records(),
            coins: self.world.coin_records(),
            map: self.world.bounds(),
            version: PROTOCOL_VERSION,
        };
        self.broadcaster.send_to(&player_id, init);
        self.broadcaster
            .broadcast_except(Some(&player_id), &ServerMsg::PlayerJoin { player: player.clone() });

        info!(
            player_id = %player_id,
            x = player.x,
            y = player.y,
            player_count = self.world.players.len(),
            clients = self.broadcaster.len(),
            "Player joined"
        );

        player_id
    }

    fn handle_input(&mut self, player_id: PlayerId, input: MoveInput) {
        if !self.world.contains_player(&player_id) {
            debug!(player_id = %player_id, "Discarding input for departed player");
            return;
        }

        for collection in SimulationEngine::apply_input(&mut self.world, player_id, input) {
            debug!(
                player_id = %collection.player_id,
                coin_id = %collection.coin_id,
                score = collection.score,
                "Coin collected"
            );
            self.broadcaster.broadcast(&ServerMsg::ScoreUpdate {
                player_id: collection.player_id,
                score: collection.score,
                coin_id: collection.coin_id,
            });
        }
    }

    fn handle_leave(&mut self, player_id: PlayerId) {
        self.broadcaster.unregister(&player_id);

        if let Some(player) = self.world.remove_player(&player_id) {
            self.broadcaster
                .broadcast(&ServerMsg::PlayerLeave { id: player_id });

            info!(
                player_id = %player_id,
                score = player.score,
                player_count = self.world.players.len(),
                clients = self.broadcaster.len(),
                "Player left"
            );
        }
    }

    fn broadcast_snapshot(&mut self) {
        if self.broadcaster.is_empty() {
            return;
        }

        let snapshot = self.snapshots.build(&self.world);
        self.broadcaster.broadcast(&snapshot);
        self.publish_stats();
    }

    fn spawn_coin(&mut self) {
        let coin = SimulationEngine::spawn_coin(&mut self.world, &mut self.rng);
        debug!(coin_id = %coin.id, x = coin.x, y = coin.y, live_coins = self.world.coins.len(), "Coin spawned");

        self.broadcaster.broadcast(&ServerMsg::CoinSpawn {
            coin: coin.to_record(),
        });
        self.publish_stats();
    }

    fn publish_stats(&self) {
        self.stats
            .players
            .store(self.world.players.len(), Ordering::Relaxed);
        self.stats
            .coins
            .store(self.world.coins.len(), Ordering::Relaxed);
        self.stats
            .snapshots
            .store(self.snapshots.built(), Ordering::Relaxed);
        self.stats
            .dropped
            .store(self.broadcaster.dropped(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::Coin;
    use crate::net::forward_into;
    use std::time::Duration;
    use uuid::Uuid;

    fn seeded_config() -> WorldConfig {
        WorldConfig {
            seed: Some(1234),
            ..WorldConfig::default()
        }
    }

    fn client_link() -> (DelayLine<ServerMsg>, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(64);
        (DelayLine::spawn(Duration::ZERO, 64, forward_into(tx)), rx)
    }

    fn join(session: &mut GameSession) -> (PlayerId, mpsc::Receiver<ServerMsg>) {
        let (link, rx) = client_link();
        (session.handle_join(link), rx)
    }

    async fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn join_sends_init_to_joiner_and_join_to_others() {
        let (mut session, _handle) = GameSession::new(seeded_config(), 16);
        let (first, mut first_rx) = join(&mut session);
        let _ = drain(&mut first_rx).await;

        let (second, mut second_rx) = join(&mut session);

        match drain(&mut second_rx).await.as_slice() {
            [ServerMsg::Init {
                self_id,
                players,
                map,
                version,
                ..
            }] => {
                assert_eq!(*self_id, second);
                assert!(players.contains_key(&first) && players.contains_key(&second));
                assert_eq!(map.width, 800.0);
                assert_eq!(*version, PROTOCOL_VERSION);
            }
            other => panic!("unexpected messages {:?}", other),
        }

        match drain(&mut first_rx).await.as_slice() {
            [ServerMsg::PlayerJoin { player }] => assert_eq!(player.id, second),
            other => panic!("unexpected messages {:?}", other),
        }
    }

    #[tokio::test]
    async fn collection_is_broadcast_to_everyone_once() {
        let (mut session, _handle) = GameSession::new(seeded_config(), 16);
        let (collector, mut collector_rx) = join(&mut session);
        let (_, mut other_rx) = join(&mut session);
        let _ = drain(&mut collector_rx).await;
        let _ = drain(&mut other_rx).await;

        let (x, y) = {
            let p = &session.world.players[&collector];
            (p.x, p.y)
        };
        let coin_id = Uuid::new_v4();
        session.world.coins.push(Coin { id: coin_id, x, y });

        session.handle(WorldCommand::Input {
            player_id: collector,
            input: MoveInput::default(),
        });
        session.handle(WorldCommand::Input {
            player_id: collector,
            input: MoveInput::default(),
        });

        let expected = ServerMsg::ScoreUpdate {
            player_id: collector,
            score: 1,
            coin_id,
        };
        assert_eq!(drain(&mut collector_rx).await, vec![expected.clone()]);
        assert_eq!(drain(&mut other_rx).await, vec![expected]);
        assert!(session.world.coins.is_empty());
    }

    #[tokio::test]
    async fn departed_player_disappears_from_world_and_updates() {
        let (mut session, handle) = GameSession::new(seeded_config(), 16);
        let (leaver, _leaver_rx) = join(&mut session);
        let (stayer, mut stayer_rx) = join(&mut session);
        let _ = drain(&mut stayer_rx).await;

        assert_eq!(session.broadcaster.len(), 2);
        session.handle(WorldCommand::Leave { player_id: leaver });
        assert!(!session.world.contains_player(&leaver));
        assert_eq!(session.broadcaster.len(), 1);
        assert_eq!(handle.stats().players(), 1);

        // In-flight input from the departed connection arrives late
        session.handle(WorldCommand::Input {
            player_id: leaver,
            input: MoveInput {
                right: true,
                ..MoveInput::default()
            },
        });
        session.broadcast_snapshot();

        let messages = drain(&mut stayer_rx).await;
        assert_eq!(messages[0], ServerMsg::PlayerLeave { id: leaver });
        match &messages[1..] {
            [ServerMsg::StateUpdate { players, .. }] => {
                assert!(!players.contains_key(&leaver));
                assert!(players.contains_key(&stayer));
            }
            other => panic!("unexpected messages {:?}", other),
        }
    }

    #[tokio::test]
    async fn leaving_twice_broadcasts_once() {
        let (mut session, _handle) = GameSession::new(seeded_config(), 16);
        let (leaver, _rx) = join(&mut session);
        let (_, mut stayer_rx) = join(&mut session);
        let _ = drain(&mut stayer_rx).await;

        session.handle(WorldCommand::Leave { player_id: leaver });
        session.handle(WorldCommand::Leave { player_id: leaver });

        assert_eq!(drain(&mut stayer_rx).await, vec![ServerMsg::PlayerLeave { id: leaver }]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_streams_snapshots_and_spawns_coins() {
        let config = WorldConfig {
            coin_spawn_interval: Duration::from_millis(300),
            ..seeded_config()
        };
        let (session, handle) = GameSession::new(config, 16);
        tokio::spawn(session.run());

        let (link, mut rx) = client_link();
        let me = handle.join(link).await.unwrap();

        let mut snapshots = Vec::new();
        let mut spawned = 0;
        let deadline = Instant::now() + Duration::from_millis(700);
        while Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
                Ok(Some(ServerMsg::StateUpdate { players, timestamp })) => {
                    assert!(players.contains_key(&me));
                    snapshots.push(timestamp);
                }
                Ok(Some(ServerMsg::CoinSpawn { .. })) => spawned += 1,
                Ok(Some(ServerMsg::Init { self_id, .. })) => assert_eq!(self_id, me),
                Ok(Some(other)) => panic!("unexpected {:?}", other),
                Ok(None) => break,
                Err(_) => {}
            }
        }

        assert!(snapshots.len() >= 10, "only {} snapshots", snapshots.len());
        assert!(snapshots.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(spawned, 2);
        assert_eq!(handle.stats().coins(), 2);

        handle.leave(me).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.stats().players(), 0);

        // Unregistering drops the outbound link, which closes the client side
        loop {
            match rx.recv().await {
                Some(ServerMsg::PlayerLeave { .. }) => panic!("leaver must not hear its own leave"),
                Some(_) => {}
                None => break,
            }
        }
    }
}
