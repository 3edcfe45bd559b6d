// Framework bootstrap for the snake server runtime.

use crate::domain::{GameState, Grid};
use crate::frameworks::config;
use crate::interface_adapters::net::{encode_snapshot, snapshot_fanout, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::game::{SimSettings, game_task};
use crate::use_cases::subscribers::SubscriberRegistry;

use axum::{Router, routing::get};
use std::io::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state()?;

    let app = Router::new().route("/ws", get(ws_handler)).with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Result<Arc<AppState>> {
    let grid = Grid::new(config::GRID_SIZE);
    let game = GameState::new(&grid, &mut rand::thread_rng());

    // Seed the latest-snapshot slot so viewers connecting before the first
    // tick still get a board.
    let initial = encode_snapshot(&game.snapshot())
        .map_err(|e| std::io::Error::other(format!("failed to encode initial snapshot: {e}")))?;

    let (steering_tx, steering_rx) = mpsc::channel(config::STEERING_CHANNEL_CAPACITY);
    let (snapshot_tx, snapshot_rx) = broadcast::channel(config::SNAPSHOT_BROADCAST_CAPACITY);
    let (snapshot_latest_tx, _snapshot_latest_rx) = watch::channel(initial);

    let subscribers = Arc::new(SubscriberRegistry::new());

    // Spawn the authoritative loop for the single shared game, then the
    // fan-out that turns its snapshots into wire bytes.
    tokio::spawn(game_task(
        game,
        grid,
        SimSettings {
            tick_interval: config::TICK_INTERVAL,
            game_over_cooldown: config::GAME_OVER_COOLDOWN,
            direction_debounce: config::DIRECTION_DEBOUNCE,
        },
        steering_rx,
        snapshot_tx,
    ));
    tokio::spawn(snapshot_fanout(
        snapshot_rx,
        subscribers.clone(),
        snapshot_latest_tx.clone(),
    ));

    Ok(Arc::new(AppState {
        steering_tx,
        subscribers,
        snapshot_latest_tx,
    }))
}
