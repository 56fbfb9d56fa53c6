use anyhow::Context;
use clap::Parser;
use tag_server::config::ServerArgs;
use tag_server::game_loop::{run_game_loop, GameCommand};
use tag_server::routes::build_router;
use tag_server::ws::AppState;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerArgs::parse().into_config();

    // Validate configuration before starting
    config.validate().context("invalid server configuration")?;

    tracing::info!(
        input_policy = ?config.input_policy,
        tick_rate_hz = config.tick_rate_hz,
        queue_capacity = config.effective_queue_capacity(),
        "Starting tag server"
    );

    let (game_tx, game_rx) = mpsc::channel::<GameCommand>(256);
    let app = build_router(AppState::new(game_tx, &config));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!("Tag server listening on {}", config.listen_addr);

    // Spawn game loop
    tokio::spawn(async move {
        run_game_loop(game_rx, config).await;
    });

    axum::serve(listener, app).await?;
    Ok(())
}
