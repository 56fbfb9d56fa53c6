use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tag_shared::protocol::PlayerMessage;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::fanout::OutboundQueue;
use crate::game_loop::GameCommand;

/// Shared app state passed to each handler
#[derive(Clone)]
pub struct AppState {
    pub game_tx: mpsc::Sender<GameCommand>,
    pub queue_capacity: usize,
    pub max_message_bytes: usize,
}

impl AppState {
    pub fn new(game_tx: mpsc::Sender<GameCommand>, config: &ServerConfig) -> Self {
        Self {
            game_tx,
            queue_capacity: config.effective_queue_capacity(),
            max_message_bytes: config.max_message_bytes,
        }
    }
}

/// Why a session ended
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    #[error("outbound writer stopped")]
    WriterStopped,

    #[error("game loop is not running")]
    GameLoopClosed,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> impl IntoResponse {
    ws.max_message_size(app_state.max_message_bytes)
        .on_failed_upgrade(|error| tracing::warn!(%error, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (sink, stream) = socket.split();

    // Join the game
    let (outbound, outbound_rx) = OutboundQueue::new(app_state.queue_capacity);
    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .game_tx
        .send(GameCommand::PlayerJoin {
            outbound,
            response: resp_tx,
        })
        .await
        .is_err()
    {
        tracing::error!("Failed to send PlayerJoin command");
        return;
    }

    let my_id = match resp_rx.await {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!("Game loop refused the join");
            return;
        }
    };

    tracing::info!(player_id = my_id, "Player connected");

    let mut writer = tokio::spawn(write_loop(my_id, sink, outbound_rx));
    let result = read_loop(my_id, stream, &mut writer, &app_state.game_tx).await;
    writer.abort();

    match result {
        Ok(()) => tracing::info!(player_id = my_id, "Player closed connection"),
        Err(e) => tracing::info!(player_id = my_id, reason = %e, "Player dropped"),
    }

    // Cleanup on disconnect
    let _ = app_state
        .game_tx
        .send(GameCommand::PlayerLeave { id: my_id })
        .await;
}

/// Forward inbound messages to the game loop until the client goes away,
/// sends something unreadable, or the writer gives up.
async fn read_loop(
    my_id: u32,
    mut stream: SplitStream<WebSocket>,
    writer: &mut JoinHandle<Result<(), SessionError>>,
    game_tx: &mpsc::Sender<GameCommand>,
) -> Result<(), SessionError> {
    loop {
        let msg = tokio::select! {
            msg = stream.next() => msg,
            result = &mut *writer => {
                return match result {
                    Ok(Err(e)) => Err(e),
                    _ => Err(SessionError::WriterStopped),
                };
            }
        };

        let input: PlayerMessage = match msg {
            Some(Ok(Message::Text(text))) => serde_json::from_str(text.as_str())?,
            Some(Ok(Message::Binary(bytes))) => serde_json::from_slice(&bytes)?,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Err(e)) => return Err(e.into()),
        };

        game_tx
            .send(GameCommand::PlayerInput { id: my_id, msg: input })
            .await
            .map_err(|_| SessionError::GameLoopClosed)?;
    }
}

/// Sole writer for the connection: drains the outbound queue in order.
async fn write_loop(
    my_id: u32,
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: broadcast::Receiver<PlayerMessage>,
) -> Result<(), SessionError> {
    while let Some(msg) = next_outbound(my_id, &mut outbound_rx).await {
        let json = serde_json::to_string(&msg)?;
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            tracing::warn!(player_id = my_id, error = %e, "Failed to write snapshot");
            return Err(e.into());
        }
    }
    Ok(())
}

/// Next snapshot to write. Snapshots dropped while the connection fell
/// behind are skipped. `None` once the queue is closed and drained.
async fn next_outbound(
    my_id: u32,
    outbound_rx: &mut broadcast::Receiver<PlayerMessage>,
) -> Option<PlayerMessage> {
    loop {
        match outbound_rx.recv().await {
            Ok(msg) => return Some(msg),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(player_id = my_id, dropped = n, "Outbound queue full, dropped oldest snapshots");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writer_resumes_with_newest_after_falling_behind() {
        let (queue, mut rx) = OutboundQueue::new(4);
        for id in 0..10 {
            assert!(queue.push(PlayerMessage::disconnected(id)));
        }

        let mut written = Vec::new();
        for _ in 0..4 {
            written.push(next_outbound(7, &mut rx).await.unwrap().id);
        }
        assert_eq!(written, vec![6, 7, 8, 9]);

        // Keeps working once caught up
        queue.push(PlayerMessage::disconnected(10));
        assert_eq!(next_outbound(7, &mut rx).await.unwrap().id, 10);
    }

    #[tokio::test]
    async fn writer_drains_then_stops_when_queue_closes() {
        let (queue, mut rx) = OutboundQueue::new(4);
        queue.push(PlayerMessage::disconnected(1));
        drop(queue);
        assert_eq!(next_outbound(7, &mut rx).await.unwrap().id, 1);
        assert!(next_outbound(7, &mut rx).await.is_none());
    }

    #[tokio::test]
    async fn overflow_during_game_traffic_keeps_latest_snapshots() {
        use crate::config::ServerConfig;
        use crate::game_loop::GameLoop;

        let mut game = GameLoop::new(&ServerConfig {
            rng_seed: Some(3),
            ..Default::default()
        });
        let (slow_queue, mut slow_rx) = OutboundQueue::new(2);
        let slow = game.join(slow_queue).unwrap();
        let (fast_queue, _fast_rx) = OutboundQueue::new(2);
        let fast = game.join(fast_queue).unwrap();

        for step in 0..20 {
            let input = PlayerMessage {
                x: f64::from(step),
                ..Default::default()
            };
            game.apply_input(fast, &input);
        }

        let first = next_outbound(slow, &mut slow_rx).await.unwrap();
        let second = next_outbound(slow, &mut slow_rx).await.unwrap();
        assert_eq!((first.id, first.x), (fast, 18.0));
        assert_eq!((second.id, second.x), (fast, 19.0));
    }
}
