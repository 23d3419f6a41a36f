//! Per-request metrics middleware.
//!
//! Collects the request facts the interceptor needs, runs the inner
//! service, then records the metrics. A metric failure is logged and never
//! changes the response.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::HttpBody,
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use apitor_core::RequestFacts;

use crate::app_state::AppState;

/// Caller identity: first `X-Forwarded-For` hop, else the peer address.
pub fn caller_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Declared request body size; -1 when absent or unparsable.
pub fn request_bytes(headers: &HeaderMap) -> i64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(-1)
}

pub async fn track_metrics(State(app): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();

    // Route template when matched, to keep `uri` label cardinality bounded.
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let caller = caller_id(req.headers(), peer);
    let method = req.method().to_string();
    let request_bytes = request_bytes(req.headers());

    let res = next.run(req).await;

    let response_bytes = res
        .body()
        .size_hint()
        .exact()
        .map(|n| n as i64)
        .unwrap_or(0);

    let facts = RequestFacts {
        start,
        caller,
        method,
        path,
        status: res.status().as_u16(),
        request_bytes,
        response_bytes,
    };

    if let Err(e) = app.monitor().intercept(facts).await {
        tracing::warn!(
            code = e.code().as_str(),
            error = %e,
            "request metrics update failed"
        );
    }

    res
}
