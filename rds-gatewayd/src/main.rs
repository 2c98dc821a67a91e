mod config;
mod ingest;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use rds_core::{Decoder, Snapshot};
use rds_resolver::Resolver;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{watch, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use config::GatewayConfig;

// ─── Global startup time (for uptime reporting) ──────────────────────────────
static STARTUP_MS: AtomicU64 = AtomicU64::new(0);

#[derive(Clone)]
struct AppState {
    snapshot_rx: watch::Receiver<Option<Snapshot>>,
    resolver: Arc<Resolver>,
}

// ─── Health Endpoint ──────────────────────────────────────────────────────────
// GET /health → { status, version, uptimeSecs }
async fn health_check() -> Json<serde_json::Value> {
    let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
    let startup = STARTUP_MS.load(Ordering::Relaxed);
    let uptime_secs = if startup > 0 { (now_ms - startup) / 1000 } else { 0 };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": uptime_secs,
    }))
}

// ─── Snapshot Endpoint ────────────────────────────────────────────────────────
// GET /snapshot → the most recently published station snapshot, or 204 if
// the decoder has not yet produced one.
async fn snapshot_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.snapshot_rx.borrow().as_ref() {
        Some(snap) => Json(serde_json::to_value(snap).unwrap_or(json!({}))),
        None => Json(json!(null)),
    }
}

#[derive(Debug, Deserialize)]
struct ResolveQuery {
    lcds: String,
    cid: u16,
    tabcd: u16,
}

// ─── TMC Location Resolver Endpoint ───────────────────────────────────────────
// GET /resolve?lcds=1,2,3&cid=58&tabcd=1
async fn resolve_handler(State(state): State<AppState>, Query(q): Query<ResolveQuery>) -> Json<serde_json::Value> {
    let lcds: Vec<u32> = q
        .lcds
        .split(',')
        .filter_map(|s| s.trim().parse::<u32>().ok())
        .collect();

    match state.resolver.resolve(&lcds, q.cid, q.tabcd).await {
        Ok(resolved) => {
            let by_lcd: HashMap<String, _> = resolved.into_iter().map(|(lcd, loc)| (lcd.to_string(), loc)).collect();
            Json(serde_json::to_value(by_lcd).unwrap_or(json!({})))
        }
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

// ─── Snapshot Tick Task ───────────────────────────────────────────────────────
// Drives the decoder's publisher at a fixed cadence, standing in for the
// "any scheduler tick" driver spec §4.16 leaves unspecified.
async fn run_tick_loop(decoder: Arc<RwLock<Decoder>>, tx: watch::Sender<Option<Snapshot>>, interval_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    loop {
        interval.tick().await;
        let mut dec = decoder.write().await;
        if let Some(snap) = dec.tick() {
            drop(dec);
            let _ = tx.send(Some(snap));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let startup_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
    STARTUP_MS.store(startup_ms, Ordering::Relaxed);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "rds_gatewayd=info,rds_core=info".into()),
        )
        .init();

    let config = GatewayConfig::default();
    info!(
        mode = ?config.ingest_mode,
        udp_port = config.ingest_udp_port,
        http_port = config.http_port,
        "RDS gateway starting"
    );

    let decoder = Arc::new(RwLock::new(Decoder::new()));
    let resolver = Arc::new(Resolver::new(config.tmc_local_base_dir.clone()));
    let (snapshot_tx, snapshot_rx) = watch::channel(None);

    tokio::spawn(ingest::run_ingest(config.clone(), decoder.clone()));
    tokio::spawn(run_tick_loop(decoder.clone(), snapshot_tx, config.tick_interval_ms));

    let state = AppState { snapshot_rx, resolver };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/snapshot", get(snapshot_handler))
        .route("/resolve", get(resolve_handler))
        .layer(cors)
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    info!("RDS gateway status server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding status server to {addr}"))?;
    axum::serve(listener, app).await.context("status server exited")?;
    Ok(())
}
