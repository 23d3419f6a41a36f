//! Built-in request metrics and their label schemas.

use crate::error::Result;
use crate::metric::{Metric, MetricKind};

use super::Monitor;

pub const REQUEST_TOTAL: &str = "request_total";
pub const REQUEST_UV_TOTAL: &str = "request_uv_total";
pub const URI_REQUEST_TOTAL: &str = "uri_request_total";
pub const REQUEST_BODY_TOTAL: &str = "request_body_total";
pub const RESPONSE_BODY_TOTAL: &str = "response_body_total";
pub const REQUEST_DURATION: &str = "request_duration";
pub const SLOW_REQUEST_TOTAL: &str = "slow_request_total";

/// Per-request labels of the default metrics; metadata keys must not reuse them.
pub const BASE_LABELS: [&str; 3] = ["uri", "method", "code"];

/// Every default metric, in registration order.
pub const DEFAULT_METRICS: [&str; 7] = [
    REQUEST_TOTAL,
    REQUEST_UV_TOTAL,
    URI_REQUEST_TOTAL,
    REQUEST_BODY_TOTAL,
    RESPONSE_BODY_TOTAL,
    REQUEST_DURATION,
    SLOW_REQUEST_TOTAL,
];

impl Monitor {
    /// Register the seven request metrics.
    ///
    /// Stops at the first failure; metrics registered before it stay
    /// registered, so calling this again fails with `DuplicateName`.
    pub fn register_default_metrics(&mut self) -> Result<()> {
        let slow = format!(
            "the server handled slow requests counter, t={}.",
            self.slow_time
        );
        let defaults = [
            (MetricKind::Counter, REQUEST_TOTAL, "all the server received request num."),
            (MetricKind::Counter, REQUEST_UV_TOTAL, "all the server received ip num."),
            (
                MetricKind::Counter,
                URI_REQUEST_TOTAL,
                "all the server received request num with every uri.",
            ),
            (
                MetricKind::Counter,
                REQUEST_BODY_TOTAL,
                "the server received request body size, unit byte",
            ),
            (
                MetricKind::Counter,
                RESPONSE_BODY_TOTAL,
                "the server send response body size, unit byte",
            ),
            (
                MetricKind::Histogram,
                REQUEST_DURATION,
                "the time server took to handle the request.",
            ),
            (MetricKind::Counter, SLOW_REQUEST_TOTAL, slow.as_str()),
        ];

        for (kind, name, description) in defaults {
            let mut metric = Metric::new(kind, name)
                .description(description)
                .labels(self.metric_labels(name));
            if kind == MetricKind::Histogram {
                metric = metric.buckets(self.duration.clone());
            }
            self.add_metric(metric)?;
        }
        tracing::info!(count = DEFAULT_METRICS.len(), "default metrics registered");
        Ok(())
    }

    /// Label schema for a default metric: base labels, then metadata keys.
    pub fn metric_labels(&self, name: &str) -> Vec<String> {
        let base: &[&str] = match name {
            REQUEST_DURATION => &BASE_LABELS[..1],
            URI_REQUEST_TOTAL | SLOW_REQUEST_TOTAL => &BASE_LABELS,
            _ => &[],
        };
        base.iter()
            .map(|s| s.to_string())
            .chain(self.metadata_keys().map(str::to_string))
            .collect()
    }

    pub fn metadata_keys(&self) -> impl Iterator<Item = &str> {
        self.metadata.iter().map(|(k, _)| k.as_str())
    }

    pub fn metadata_values(&self) -> impl Iterator<Item = &str> {
        self.metadata.iter().map(|(_, v)| v.as_str())
    }

    /// `base` followed by the metadata values, matching [`Monitor::metric_labels`].
    pub fn label_values(&self, base: Vec<String>) -> Vec<String> {
        let mut values = base;
        values.extend(self.metadata_values().map(str::to_string));
        values
    }
}
