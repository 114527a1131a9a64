use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, MutexGuard},
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info};

use crate::{
    controller::{EngineSnapshot, SimulationController},
    driver::{Driver, SharedController},
    history::RainSample,
    systems::Alert,
};

#[derive(Clone)]
struct AppState {
    controller: SharedController,
    broadcaster: broadcast::Sender<EngineSnapshot>,
}

pub struct WebServerConfig {
    pub controller: SharedController,
    pub tick_period: Duration,
    pub host: String,
    pub port: u16,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        controller,
        tick_period,
        host,
        port,
    } = config;

    let (tx, _) = broadcast::channel::<EngineSnapshot>(256);
    let driver = Driver::spawn(controller.clone(), tick_period, tx.clone());

    let state = Arc::new(AppState {
        controller: controller.clone(),
        broadcaster: tx,
    });

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    info!(%addr, tick_ms = tick_period.as_millis() as u64, "virtual farm service listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    driver.stop();
    match controller.lock() {
        Ok(mut sim) => {
            sim.flush();
        }
        Err(_) => error!("controller lock poisoned; final state not flushed"),
    }
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/state", get(current_state))
        .route("/api/alerts", get(active_alerts))
        .route("/api/history", get(rain_history))
        .route("/api/events", get(stream_events))
        .route("/api/start", post(start))
        .route("/api/pause", post(pause))
        .route("/api/reset", post(reset))
        .route("/api/irrigate", post(irrigate))
        .route("/api/fertilize", post(fertilize))
        .route("/api/pests", post(control_pests))
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down virtual farm service");
}

fn lock(state: &AppState) -> Result<MutexGuard<'_, SimulationController>, StatusCode> {
    state.controller.lock().map_err(|_| {
        error!("controller lock poisoned");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

fn apply(
    state: &AppState,
    action: impl FnOnce(&mut SimulationController),
) -> Result<Json<EngineSnapshot>, StatusCode> {
    let mut sim = lock(state)?;
    action(&mut sim);
    Ok(Json(sim.snapshot()))
}

async fn current_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EngineSnapshot>, StatusCode> {
    Ok(Json(lock(&state)?.snapshot()))
}

async fn active_alerts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Alert>>, StatusCode> {
    Ok(Json(lock(&state)?.alerts()))
}

async fn rain_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RainSample>>, StatusCode> {
    Ok(Json(lock(&state)?.history()))
}

async fn start(State(state): State<Arc<AppState>>) -> Result<Json<EngineSnapshot>, StatusCode> {
    apply(&state, SimulationController::start)
}

async fn pause(State(state): State<Arc<AppState>>) -> Result<Json<EngineSnapshot>, StatusCode> {
    apply(&state, SimulationController::pause)
}

async fn reset(State(state): State<Arc<AppState>>) -> Result<Json<EngineSnapshot>, StatusCode> {
    apply(&state, SimulationController::reset)
}

async fn irrigate(State(state): State<Arc<AppState>>) -> Result<Json<EngineSnapshot>, StatusCode> {
    apply(&state, SimulationController::irrigate)
}

async fn fertilize(State(state): State<Arc<AppState>>) -> Result<Json<EngineSnapshot>, StatusCode> {
    apply(&state, SimulationController::fertilize)
}

async fn control_pests(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EngineSnapshot>, StatusCode> {
    apply(&state, SimulationController::control_pests)
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        let frame = msg.ok()?;
        let payload = serde_json::to_string(&frame).ok()?;
        Some(Ok(Event::default().data(payload)))
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
