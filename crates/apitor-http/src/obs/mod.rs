//! Request observation for axum.
//!
//! `track_metrics` feeds every request through the monitor's interceptor;
//! `render_metrics` serves the Prometheus text exposition.

pub mod metrics;
pub mod middleware;

pub use metrics::render_metrics;
pub use middleware::track_metrics;
