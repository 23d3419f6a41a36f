//! Axum router wiring.
//!
//! Adds the exposition and health routes to the service's own routes and
//! wraps everything in the metrics middleware.

use axum::{middleware, routing::get, Router};

use crate::{app_state::AppState, obs};

pub fn build_router(state: AppState, app: Router) -> Router {
    let metric_path = state.monitor().metric_path().to_string();
    let internal = Router::new()
        .route(&metric_path, get(obs::render_metrics))
        .route("/healthz", get(healthz))
        .with_state(state.clone());

    app.merge(internal)
        .layer(middleware::from_fn_with_state(state, obs::track_metrics))
}

async fn healthz() -> &'static str {
    "ok"
}
