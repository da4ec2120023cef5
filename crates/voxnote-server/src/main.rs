use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};
use voxnote_core::{
    AudioRecorder, ConfigStore, GroqProvider, HistoryStore, HotkeyDispatcher,
    ProcessingOrchestrator, SessionController,
};
use voxnote_server::ServerConfig;
use voxnote_server::http::{AppState, create_router};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let server_config = ServerConfig::from_env()?;
    info!("voxnote v{}", env!("CARGO_PKG_VERSION"));
    info!("data directory: {}", server_config.data_dir.display());

    let config = Arc::new(ConfigStore::new(&server_config.data_dir));
    let history = Arc::new(HistoryStore::new(&server_config.data_dir));
    let provider = Arc::new(GroqProvider::from_env());
    let orchestrator = Arc::new(ProcessingOrchestrator::new(
        provider,
        config.clone(),
        history.clone(),
    ));
    let session = Arc::new(SessionController::new(
        Arc::new(AudioRecorder::new()),
        orchestrator.clone(),
    ));

    // hotkey presses flow over one channel into the session controller,
    // keeping the OS shortcut thread decoupled from processing latency
    let mut dispatcher = HotkeyDispatcher::new();
    match server_config.hotkey.as_deref() {
        Some(combination) => {
            let (toggle_tx, mut toggle_rx) = mpsc::unbounded_channel();
            if dispatcher.bind(combination, toggle_tx) {
                let session = session.clone();
                tokio::spawn(async move {
                    while toggle_rx.recv().await.is_some() {
                        match session.toggle().await {
                            Ok(state) => info!(%state, "hotkey toggle"),
                            Err(err) => warn!("hotkey toggle failed: {err}"),
                        }
                    }
                });
            }
        }
        None => info!("hotkey disabled; HTTP control only"),
    }

    let state = AppState {
        config,
        history,
        orchestrator,
        session: session.clone(),
    };
    let router = create_router(state);

    let addr = server_config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // a capture still running at shutdown is dropped, not processed
    session.abort_active();
    dispatcher.unbind();
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
    }
}
