use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use tokio::sync::oneshot;

use crate::game_loop::GameCommand;
use crate::ws::AppState;

/// Serve the status page with the number of connected players.
pub async fn status_handler(State(app_state): State<AppState>) -> Result<Html<String>, StatusCode> {
    let (resp_tx, resp_rx) = oneshot::channel();
    app_state
        .game_tx
        .send(GameCommand::PlayerCount { response: resp_tx })
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    let count = resp_rx.await.map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(Html(render_status(count)))
}

fn render_status(count: usize) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
    <head>
        <meta charset="utf-8">
    </head>
    <body>
        Number of players online: {}.
    </body>
</html>
"#,
        count
    )
}
