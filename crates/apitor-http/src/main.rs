//! apitor demo server.
//!
//! Serves a small echo API instrumented with the default request metrics.
//! - Config: `apitor.yaml` (or the path in `APITOR_CONFIG`)
//! - Metrics: exposed on `monitor.metric_path`
//! - Health: `/healthz`

use std::net::SocketAddr;

use axum::{extract::State, routing::post, Router};
use tracing_subscriber::{fmt, EnvFilter};

use apitor_http::app_state::AppState;
use apitor_http::{config, router};

const ECHO_PAYLOAD: &str = "echo_payload_bytes";

async fn echo(State(app): State<AppState>, body: String) -> String {
    // Optional: only present when declared under `metrics:` in the config.
    if let Ok(m) = app.monitor().get_metric(ECHO_PAYLOAD) {
        if let Err(e) = m.observe(&["/v1/echo"], body.len() as f64) {
            tracing::warn!(error = %e, "echo payload metric failed");
        }
    }
    body
}

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("APITOR_CONFIG").unwrap_or_else(|_| "apitor.yaml".into());
    let cfg = config::load_from_file(&path).expect("config load failed");
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .expect("server.listen must be a valid SocketAddr");

    // Metric registration failures are fatal at startup.
    let state = AppState::new(cfg).expect("monitor setup failed");
    let api = Router::new()
        .route("/v1/echo", post(echo))
        .with_state(state.clone());
    let app = router::build_router(state, api);

    tracing::info!(%listen, "apitor starting");
    let listener = tokio::net::TcpListener::bind(listen).await.expect("failed to bind");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server failed");
}
