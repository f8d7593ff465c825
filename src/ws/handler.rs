//! WebSocket upgrade handler and per-connection session

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{GameEntry, PlayerId, RegistryError};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// Work for the writer task
enum Outbound {
    /// Message for this connection only
    Direct(ServerMsg),
    /// Start forwarding a game's broadcast messages
    Subscribe(broadcast::Receiver<ServerMsg>),
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let player_id = Uuid::new_v4();
    debug!(player_id = %player_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, player_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: PlayerId, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);

    let writer_handle = tokio::spawn(write_loop(player_id, ws_sink, outbound_rx));

    let game = read_loop(player_id, &state, ws_stream, &outbound_tx).await;

    if let Some(entry) = game {
        leave_game(&state, player_id, &entry);
    }

    writer_handle.abort();
    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> game. Returns the game the player was in.
async fn read_loop(
    player_id: PlayerId,
    state: &AppState,
    mut ws_stream: SplitStream<WebSocket>,
    outbound_tx: &mpsc::Sender<Outbound>,
) -> Option<Arc<GameEntry>> {
    let rate_limiter = ConnectionRateLimiter::new();
    let mut game: Option<Arc<GameEntry>> = None;

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(player_id = %player_id, "Rate limited message");
                    continue;
                }

                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };
                if let Err(e) = client_msg.validate() {
                    warn!(player_id = %player_id, error = %e, "Rejected client message");
                    continue;
                }

                if !handle_client_msg(player_id, state, &mut game, client_msg, outbound_tx).await
                {
                    debug!(player_id = %player_id, "Outbound channel closed");
                    break;
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
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    game
}

/// Apply one client message. Returns false once the writer is gone.
async fn handle_client_msg(
    player_id: PlayerId,
    state: &AppState,
    game: &mut Option<Arc<GameEntry>>,
    msg: ClientMsg,
    outbound_tx: &mpsc::Sender<Outbound>,
) -> bool {
    let reply = |msg: ServerMsg| outbound_tx.send(Outbound::Direct(msg));

    match (msg, game.as_ref()) {
        (ClientMsg::JoinGame { .. }, Some(entry)) => {
            let message = format!("Already in game {}", entry.id);
            reply(ServerMsg::error("already_in_game", message)).await.is_ok()
        }
        (ClientMsg::JoinGame { game_id }, None) => {
            let outcome = match state.join_game(player_id, game_id.as_deref()) {
                Ok(outcome) => outcome,
                Err(RegistryError::GameNotFound(game_id)) => {
                    return reply(ServerMsg::GameNotFound { game_id }).await.is_ok();
                }
                Err(e) => {
                    error!(player_id = %player_id, error = %e, "Join failed");
                    return reply(ServerMsg::error("join_failed", e.to_string()))
                        .await
                        .is_ok();
                }
            };

            let mut direct = vec![ServerMsg::GameJoined {
                game_id: outcome.game_id.clone(),
                player: outcome.player.clone(),
                world_bounds: outcome.world_bounds,
            }];
            direct.extend(
                outcome
                    .existing_players
                    .into_iter()
                    .map(|player| ServerMsg::PlayerJoined { player }),
            );
            for msg in direct {
                if reply(msg).await.is_err() {
                    return false;
                }
            }
            if outbound_tx
                .send(Outbound::Subscribe(outcome.events))
                .await
                .is_err()
            {
                return false;
            }

            *game = Some(outcome.entry);
            true
        }
        (_, None) => reply(ServerMsg::error("not_in_game", "Join a game first"))
            .await
            .is_ok(),
        (ClientMsg::PlayerInput { inputs, rotation }, Some(entry)) => {
            entry.lock().set_input(&player_id, inputs, rotation);
            true
        }
        (ClientMsg::Shoot, Some(entry)) => {
            entry.lock().request_shoot(&player_id);
            true
        }
        (ClientMsg::Upgrade { stat }, Some(entry)) => {
            let updated = {
                let mut instance = entry.lock();
                if instance.upgrade_player(&player_id, stat) {
                    instance.player_state(&player_id)
                } else {
                    None
                }
            };
            match updated {
                Some(player) => reply(ServerMsg::PlayerUpdated { player }).await.is_ok(),
                None => {
                    debug!(player_id = %player_id, ?stat, "Upgrade refused");
                    true
                }
            }
        }
    }
}

/// Disconnect cleanup. Returns true when the game was torn down.
fn leave_game(state: &AppState, player_id: PlayerId, entry: &GameEntry) -> bool {
    match state.registry.leave(&entry.id, &player_id) {
        Some(departure) => {
            debug!(
                player_id = %player_id,
                game_id = %entry.id,
                torn_down = departure.torn_down,
                "Left game on disconnect"
            );
            departure.torn_down
        }
        None => false,
    }
}

/// Peers learn about a join through the broadcast; the joiner already has its state
fn is_own_join(msg: &ServerMsg, player_id: PlayerId) -> bool {
    matches!(msg, ServerMsg::PlayerJoined { player } if player.id == player_id)
}

/// Writer loop: direct replies and game broadcasts -> WebSocket
async fn write_loop(
    player_id: PlayerId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
) {
    let mut events: Option<broadcast::Receiver<ServerMsg>> = None;

    loop {
        let msg = tokio::select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(Outbound::Direct(msg)) => msg,
                Some(Outbound::Subscribe(rx)) => {
                    events = Some(rx);
                    continue;
                }
                None => break,
            },
            event = next_event(&mut events) => match event {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(player_id = %player_id, lagged_count = n, "Client lagged, skipping {} messages", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    events = None;
                    continue;
                }
            },
        };

        if is_own_join(&msg, player_id) {
            continue;
        }

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(player_id = %player_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<ServerMsg>>,
) -> Result<ServerMsg, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
