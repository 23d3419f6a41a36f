//! Monitor: the registry of named metrics.
//!
//! Lifecycle: build a `Monitor`, register metrics (`add_metric`,
//! `register_default_metrics`) and adjust settings through `&mut self`
//! methods, then wrap it in an `Arc` and share it with request handling.
//! Once shared, the metric map is only read, so no locking is needed.

pub mod defaults;
pub mod interceptor;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use prometheus::{Encoder, Registry, TextEncoder};

use crate::bloom::{BloomFilter, MembershipFilter};
use crate::error::{MonitorError, Result};
use crate::metric::{vec_builder, Metric, MetricKind, MetricVec, VecBuilder};

pub use interceptor::{InterceptorFn, RequestFacts};

pub const DEFAULT_METRIC_PATH: &str = "/debug/metrics";
pub const DEFAULT_SLOW_TIME: u64 = 5;
pub const DEFAULT_DURATION: [f64; 5] = [0.1, 0.3, 1.2, 5.0, 10.0];

/// Setup-time settings for a [`Monitor`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Path the exposition endpoint is served on; never measured itself.
    pub metric_path: String,
    /// Requests taking more than this many whole seconds count as slow.
    pub slow_time: u64,
    /// Bucket bounds (seconds) for the request duration histogram.
    pub duration: Vec<f64>,
    pub exclude_paths: Vec<String>,
    /// Extra label dimensions, in label order. Fixed for the monitor's lifetime.
    pub metadata: Vec<(String, String)>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            metric_path: DEFAULT_METRIC_PATH.to_string(),
            slow_time: DEFAULT_SLOW_TIME,
            duration: DEFAULT_DURATION.to_vec(),
            exclude_paths: Vec::new(),
            metadata: Vec::new(),
        }
    }
}

/// Catalog of metrics plus the settings the request interceptor needs.
pub struct Monitor {
    metric_path: String,
    slow_time: u64,
    duration: Vec<f64>,
    exclude_paths: BTreeSet<String>,
    metadata: Vec<(String, String)>,
    metrics: HashMap<String, Metric>,
    builders: HashMap<MetricKind, VecBuilder>,
    filter: Arc<dyn MembershipFilter>,
    registry: Registry,
    interceptors: Vec<InterceptorFn>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl Monitor {
    pub fn new(cfg: MonitorConfig) -> Self {
        Self {
            metric_path: cfg.metric_path,
            slow_time: cfg.slow_time,
            duration: cfg.duration,
            exclude_paths: cfg.exclude_paths.into_iter().collect(),
            metadata: cfg.metadata,
            metrics: HashMap::new(),
            builders: MetricKind::ALL
                .into_iter()
                .map(|k| (k, vec_builder(k)))
                .collect(),
            filter: Arc::new(BloomFilter::default()),
            registry: Registry::new(),
            interceptors: Vec::new(),
        }
    }

    /// Replace the caller membership filter.
    pub fn with_filter(mut self, filter: Arc<dyn MembershipFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn set_metric_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.metric_path = path.into();
        self
    }

    /// Paths that are never measured (e.g. `/ping`, `/healthz`).
    pub fn set_exclude_paths<I, S>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_slow_time(&mut self, seconds: u64) -> &mut Self {
        self.slow_time = seconds;
        self
    }

    /// Only affects the duration histogram if called before it is registered.
    pub fn set_duration(&mut self, buckets: Vec<f64>) -> &mut Self {
        self.duration = buckets;
        self
    }

    /// Restrict the kinds `add_metric` accepts.
    pub fn set_supported_kinds(&mut self, kinds: &[MetricKind]) -> &mut Self {
        self.builders = kinds.iter().map(|&k| (k, vec_builder(k))).collect();
        self
    }

    /// Register an extra per-request hook, run alongside the metric updates.
    pub fn add_interceptor<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&RequestFacts) -> Result<()> + Send + Sync + 'static,
    {
        self.interceptors.push(Arc::new(f));
        self
    }

    pub fn metric_path(&self) -> &str {
        &self.metric_path
    }

    pub fn slow_time(&self) -> u64 {
        self.slow_time
    }

    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// Backend registry, for callers that want to gather themselves.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        path == self.metric_path || self.exclude_paths.contains(path)
    }

    /// Bind `metric` to a backend vector and register it.
    pub fn add_metric(&mut self, mut metric: Metric) -> Result<()> {
        if metric.name().trim().is_empty() {
            return Err(MonitorError::EmptyName);
        }
        if self.metrics.contains_key(metric.name()) {
            return Err(MonitorError::DuplicateName(metric.name().to_string()));
        }
        let build = self
            .builders
            .get(&metric.kind())
            .ok_or(MonitorError::UnknownKind(metric.kind()))?;

        let exposed = metric.exposed_name().to_string();
        let vec = build(&metric, &exposed)?;
        self.registry.register(vec.boxed())?;
        metric.attach(exposed, vec);

        tracing::debug!(
            metric = %metric.name(),
            kind = %metric.kind(),
            labels = ?metric.label_names(),
            "metric registered"
        );
        self.metrics.insert(metric.name().to_string(), metric);
        Ok(())
    }

    pub fn get_metric(&self, name: &str) -> Result<&Metric> {
        self.metrics
            .get(name)
            .ok_or_else(|| MonitorError::NotFound(name.to_string()))
    }

    pub fn metric_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.metrics.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Prepend `prefix` to every registered metric's exposed name.
    ///
    /// Each renamed metric is re-registered with the backend under its new
    /// name and starts from zero. Lookups keep using the logical name.
    pub fn set_metric_prefix(&mut self, prefix: &str) -> Result<()> {
        if prefix.is_empty() {
            return Ok(());
        }
        self.rename_all(|exposed| format!("{prefix}{exposed}"))
    }

    /// Append `suffix` to every registered metric's exposed name.
    pub fn set_metric_suffix(&mut self, suffix: &str) -> Result<()> {
        if suffix.is_empty() {
            return Ok(());
        }
        self.rename_all(|exposed| format!("{exposed}{suffix}"))
    }

    // Two phases: every new collector is registered before any metric is
    // switched over, so a failure leaves all metrics under their old names.
    fn rename_all(&mut self, rename: impl Fn(&str) -> String) -> Result<()> {
        let mut names: Vec<String> = self.metrics.keys().cloned().collect();
        names.sort_unstable();

        let mut staged: Vec<(String, String, MetricVec)> = Vec::with_capacity(names.len());
        for name in names {
            let Some(metric) = self.metrics.get(&name) else {
                continue;
            };
            let exposed = rename(metric.exposed_name());
            let built = self
                .builders
                .get(&metric.kind())
                .ok_or(MonitorError::UnknownKind(metric.kind()))
                .and_then(|build| build(metric, &exposed))
                .and_then(|vec| {
                    self.registry.register(vec.boxed())?;
                    Ok(vec)
                });
            match built {
                Ok(vec) => staged.push((name, exposed, vec)),
                Err(e) => {
                    for (_, _, vec) in &staged {
                        if let Err(undo) = self.registry.unregister(vec.boxed()) {
                            tracing::warn!(error = %undo, "rollback of renamed metric failed");
                        }
                    }
                    return Err(e);
                }
            }
        }

        for (name, exposed, vec) in staged {
            let Some(metric) = self.metrics.get_mut(&name) else {
                continue;
            };
            if let Some(old) = metric.backing() {
                if let Err(e) = self.registry.unregister(old.boxed()) {
                    tracing::warn!(metric = %name, error = %e, "old collector not unregistered");
                }
            }
            tracing::debug!(metric = %name, %exposed, "metric renamed");
            metric.attach(exposed, vec);
        }
        Ok(())
    }

    /// Prometheus text exposition of every registered metric.
    pub fn gather_text(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| MonitorError::Internal(format!("exposition is not utf-8: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_is_rejected() {
        let mut m = Monitor::default();
        m.add_metric(Metric::new(MetricKind::Counter, "jobs_total")).unwrap();
        let err = m.add_metric(Metric::new(MetricKind::Gauge, "jobs_total")).unwrap_err();
        assert!(matches!(err, MonitorError::DuplicateName(ref n) if n == "jobs_total"));

        let first = m.get_metric("jobs_total").unwrap();
        assert_eq!(first.kind(), MetricKind::Counter);
        first.inc(&[]).unwrap();
        assert_eq!(first.value(&[]).unwrap(), 1.0);
    }

    #[test]
    fn empty_name_never_reaches_backend() {
        let mut m = Monitor::default();
        assert!(matches!(
            m.add_metric(Metric::new(MetricKind::Counter, "")),
            Err(MonitorError::EmptyName)
        ));
        assert!(matches!(
            m.add_metric(Metric::new(MetricKind::Counter, "  ")),
            Err(MonitorError::EmptyName)
        ));
        assert!(m.registry().gather().is_empty());
        assert!(m.metric_names().is_empty());
    }

    #[test]
    fn missing_metric_is_not_found() {
        let m = Monitor::default();
        assert!(matches!(m.get_metric("nope"), Err(MonitorError::NotFound(_))));
    }

    #[test]
    fn unsupported_kind_is_unknown() {
        let mut m = Monitor::default();
        m.set_supported_kinds(&[MetricKind::Counter]);
        let err = m
            .add_metric(Metric::new(MetricKind::Summary, "lat").objectives([(0.5, 0.05)]))
            .unwrap_err();
        assert!(matches!(err, MonitorError::UnknownKind(MetricKind::Summary)));
        assert!(m.add_metric(Metric::new(MetricKind::Counter, "ok_total")).is_ok());
    }

    #[test]
    fn backend_rejections_pass_through() {
        let mut m = Monitor::default();
        let err = m
            .add_metric(Metric::new(MetricKind::Counter, "bad-name"))
            .unwrap_err();
        assert!(matches!(err, MonitorError::Backend(_)));
        assert!(m.get_metric("bad-name").is_err());
    }

    #[test]
    fn prefix_and_suffix_rename_exposed_names() {
        let mut m = Monitor::default();
        m.add_metric(Metric::new(MetricKind::Counter, "hits_total").description("hits"))
            .unwrap();
        m.set_metric_prefix("svc_").unwrap();
        m.set_metric_suffix("_v2").unwrap();

        let metric = m.get_metric("hits_total").unwrap();
        assert_eq!(metric.exposed_name(), "svc_hits_total_v2");
        metric.inc(&[]).unwrap();

        let text = m.gather_text().unwrap();
        assert!(text.contains("svc_hits_total_v2 1"));
        assert!(!text.contains("\nhits_total "));
    }

    #[test]
    fn failed_rename_changes_nothing() {
        let mut m = Monitor::default();
        for name in ["a_total", "c_total", "x_c_total"] {
            m.add_metric(Metric::new(MetricKind::Counter, name)).unwrap();
            m.get_metric(name).unwrap().inc(&[]).unwrap();
        }

        // "a_total" renames fine, "c_total" collides with "x_c_total"
        let err = m.set_metric_prefix("x_").unwrap_err();
        assert!(matches!(err, MonitorError::Backend(_)));

        for name in ["a_total", "c_total", "x_c_total"] {
            let metric = m.get_metric(name).unwrap();
            assert_eq!(metric.exposed_name(), name);
            assert_eq!(metric.value(&[]).unwrap(), 1.0);
        }
        let text = m.gather_text().unwrap();
        assert!(!text.contains("x_a_total"));

        // the staged collector was rolled back, so its name is free again
        m.add_metric(Metric::new(MetricKind::Counter, "x_a_total")).unwrap();
    }

    #[test]
    fn setters_chain() {
        let mut m = Monitor::default();
        m.set_metric_path("/metrics")
            .set_slow_time(2)
            .set_exclude_paths(["/health"])
            .set_duration(vec![0.5, 1.0]);
        assert_eq!(m.metric_path(), "/metrics");
        assert_eq!(m.slow_time(), 2);
        assert!(m.is_excluded("/health"));
        assert!(m.is_excluded("/metrics"));
        assert!(!m.is_excluded("/items"));
    }

    #[test]
    fn summary_shows_up_in_exposition() {
        let mut m = Monitor::default();
        m.add_metric(
            Metric::new(MetricKind::Summary, "payload_bytes")
                .description("payload sizes")
                .labels(["route"])
                .objectives([(0.5, 0.05), (0.99, 0.001)]),
        )
        .unwrap();
        m.get_metric("payload_bytes").unwrap().observe(&["/up"], 42.0).unwrap();

        let text = m.gather_text().unwrap();
        assert!(text.contains("# TYPE payload_bytes summary"));
        assert!(text.contains("payload_bytes_count{route=\"/up\"} 1"));
        assert!(text.contains("quantile=\"0.5\""));
    }
}
