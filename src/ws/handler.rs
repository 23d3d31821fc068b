//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::WorldCommand;
use crate::net::{forward_into, DelayLine};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, PlayerId, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sink, ws_stream) = socket.split();
    let latency = state.config.latency;
    let queue = state.config.outbound_queue;

    // Outbound: session -> delay line -> writer task -> socket
    let (out_tx, out_rx) = mpsc::channel::<ServerMsg>(queue);
    let outbound = DelayLine::spawn(latency, queue, forward_into(out_tx));

    let player_id = match state.world.join(outbound).await {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "Failed to join world");
            return;
        }
    };

    info!(player_id = %player_id, latency_ms = latency.as_millis() as u64, "New WebSocket connection");

    let writer_handle = tokio::spawn(write_loop(player_id, ws_sink, out_rx));

    // Inbound: socket -> delay line -> session mailbox
    let inbound = DelayLine::spawn(
        latency,
        queue,
        inbound_delivery(player_id, state.world.commands()),
    );
    let limiter = ConnectionRateLimiter::new(state.config.inbound_rate_limit);

    read_loop(player_id, ws_stream, &inbound, &limiter).await;

    // Leave skips the inbound delay; inputs still in flight become no-ops
    if let Err(e) = state.world.leave(player_id).await {
        debug!(player_id = %player_id, error = %e, "Leave not delivered");
    }

    writer_handle.abort();

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> inbound delay line
async fn read_loop(
    player_id: PlayerId,
    mut ws_stream: SplitStream<WebSocket>,
    inbound: &DelayLine<WorldCommand>,
    limiter: &ConnectionRateLimiter,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !limiter.check() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                match ClientMsg::decode(&text) {
                    Ok(ClientMsg::Move { input }) => {
                        let command = WorldCommand::Input { player_id, input };
                        if let Err(e) = inbound.schedule(command) {
                            debug!(player_id = %player_id, error = %e, "Dropped inbound input");
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Delivery from the inbound delay line into the shared session mailbox
///
/// A full mailbox drops the input; a closed one stops the line.
fn inbound_delivery(
    player_id: PlayerId,
    mailbox: mpsc::Sender<WorldCommand>,
) -> impl FnMut(WorldCommand) -> bool + Send + 'static {
    move |command| match mailbox.try_send(command) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            debug!(player_id = %player_id, "World mailbox full, dropping input");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Writer loop: delayed outbound messages -> WebSocket
async fn write_loop(
    player_id: PlayerId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<ServerMsg>,
) {
    while let Some(msg) = out_rx.recv().await {
        let text = match msg.encode() {
            Ok(text) => text,
            Err(e) => {
                error!(player_id = %player_id, kind = msg.kind(), error = %e, "Failed to encode message");
                continue;
            }
        };

        if let Err(e) = ws_sink.send(Message::Text(text)).await {
            debug!(player_id = %player_id, error = %e, "WebSocket send failed");
            break;
        }
    }

    let _ = ws_sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::MoveInput;
    use uuid::Uuid;

    fn input(player_id: PlayerId) -> WorldCommand {
        WorldCommand::Input {
            player_id,
            input: MoveInput::default(),
        }
    }

    #[test]
    fn full_mailbox_drops_input_and_keeps_the_line() {
        let player_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(1);
        let mut deliver = inbound_delivery(player_id, tx);

        assert!(deliver(input(player_id)));
        assert!(deliver(input(player_id)));

        assert!(matches!(rx.try_recv(), Ok(WorldCommand::Input { player_id: id, .. }) if id == player_id));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_mailbox_stops_the_line() {
        let player_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut deliver = inbound_delivery(player_id, tx);

        assert!(!deliver(input(player_id)));
    }
}
