//! Headless Coin Arena client
//!
//! Connects to a running server, wanders at random, keeps a local mirror of
//! the world and renders the interpolated view to the log.

use std::env;
use std::time::Duration;

use anyhow::Context;
use futures::{SinkExt, StreamExt};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use coin_arena::client::{ClientState, InputSampler, INPUT_RATE_HZ};
use coin_arena::config::Config;
use coin_arena::util::logging::init_tracing;
use coin_arena::util::time::{period_for_rate, unix_millis};
use coin_arena::ws::protocol::{MoveInput, ServerMsg};

const RENDER_RATE_HZ: u32 = 60;
const STEER_EVERY: Duration = Duration::from_millis(750);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config.log_level);

    let url = env::var("SERVER_URL")
        .unwrap_or_else(|_| format!("ws://127.0.0.1:{}/ws", config.server_addr.port()));

    let (socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    info!(url = %url, "Connected");

    let (mut ws_sink, mut ws_stream) = socket.split();

    let mut state = ClientState::from_config(&config);
    let mut sampler = InputSampler::new();
    sampler.set_connected(true);
    let mut rng = ChaCha8Rng::from_entropy();

    let mut input_tick = interval(period_for_rate(INPUT_RATE_HZ));
    let mut render_tick = interval(period_for_rate(RENDER_RATE_HZ));
    render_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut steer_tick = interval(STEER_EVERY);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            frame = ws_stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match ServerMsg::decode(&text) {
                    Ok(msg) => state.apply(msg),
                    Err(e) => warn!(error = %e, "Ignoring malformed server message"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Server closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    break;
                }
            },
            _ = steer_tick.tick() => sampler.set_held(random_walk(&mut rng)),
            _ = input_tick.tick() => {
                if let Some(msg) = sampler.sample() {
                    ws_sink
                        .send(Message::Text(msg.encode()?))
                        .await
                        .context("failed to send input")?;
                }
            }
            _ = render_tick.tick() => {
                let view = state.render_view(unix_millis());
                if let Some(me) = state.self_id.and_then(|id| view.get(&id)) {
                    debug!(
                        x = me.x,
                        y = me.y,
                        score = me.score,
                        visible = view.len(),
                        coins = state.coins.len(),
                        buffered = state.buffer().len(),
                        "Render"
                    );
                }
            }
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, disconnecting");
                let _ = ws_sink.close().await;
                break;
            }
        }
    }
    sampler.set_connected(false);

    for (rank, (id, score)) in state.scoreboard().into_iter().enumerate() {
        let marker = if Some(id) == state.self_id { " (me)" } else { "" };
        info!("#{} {}{}: {}", rank + 1, id, marker, score);
    }

    Ok(())
}

/// A fresh random heading; occasionally stands still
fn random_walk<R: Rng>(rng: &mut R) -> MoveInput {
    if rng.gen_bool(0.1) {
        return MoveInput::default();
    }
    let horizontal = rng.gen_range(-1i8..=1);
    let vertical = rng.gen_range(-1i8..=1);
    MoveInput {
        up: vertical < 0,
        down: vertical > 0,
        left: horizontal < 0,
        right: horizontal > 0,
    }
}
