use serde::Deserialize;

use apitor_core::error::{MonitorError, Result};
use apitor_core::defaults::BASE_LABELS;
use apitor_core::monitor::{DEFAULT_DURATION, DEFAULT_METRIC_PATH, DEFAULT_SLOW_TIME};
use apitor_core::{Metric, MetricKind, MonitorConfig};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub monitor: MonitorSection,

    /// Custom metrics registered at startup.
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MonitorError::UnsupportedVersion);
        }
        self.monitor.validate()?;
        for m in &self.metrics {
            m.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorSection {
    #[serde(default = "default_metric_path")]
    pub metric_path: String,

    /// Whole seconds.
    #[serde(default = "default_slow_time")]
    pub slow_time: u64,

    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    #[serde(default)]
    pub exclude_paths: Vec<String>,

    /// Ordered: label order follows the list order.
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,

    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub suffix: String,

    #[serde(default = "default_true")]
    pub default_metrics: bool,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            metric_path: default_metric_path(),
            slow_time: default_slow_time(),
            duration_buckets: default_duration_buckets(),
            exclude_paths: Vec::new(),
            metadata: Vec::new(),
            prefix: String::new(),
            suffix: String::new(),
            default_metrics: true,
        }
    }
}

impl MonitorSection {
    pub fn validate(&self) -> Result<()> {
        if !self.metric_path.starts_with('/') {
            return Err(MonitorError::BadConfig(
                "monitor.metric_path must start with '/'".into(),
            ));
        }
        if self.duration_buckets.is_empty() {
            return Err(MonitorError::BadConfig(
                "monitor.duration_buckets must not be empty".into(),
            ));
        }
        if self.duration_buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MonitorError::BadConfig(
                "monitor.duration_buckets must be strictly increasing".into(),
            ));
        }
        for (i, entry) in self.metadata.iter().enumerate() {
            if entry.key.is_empty() {
                return Err(MonitorError::BadConfig(
                    "monitor.metadata keys must not be empty".into(),
                ));
            }
            if BASE_LABELS.contains(&entry.key.as_str()) {
                return Err(MonitorError::BadConfig(format!(
                    "monitor.metadata key '{}' clashes with a request label",
                    entry.key
                )));
            }
            if self.metadata[..i].iter().any(|e| e.key == entry.key) {
                return Err(MonitorError::BadConfig(format!(
                    "monitor.metadata key '{}' is repeated",
                    entry.key
                )));
            }
        }
        Ok(())
    }

    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            metric_path: self.metric_path.clone(),
            slow_time: self.slow_time,
            duration: self.duration_buckets.clone(),
            exclude_paths: self.exclude_paths.clone(),
            metadata: self
                .metadata
                .iter()
                .map(|e| (e.key.clone(), e.value.clone()))
                .collect(),
        }
    }
}

fn default_metric_path() -> String {
    DEFAULT_METRIC_PATH.into()
}
fn default_slow_time() -> u64 {
    DEFAULT_SLOW_TIME
}
fn default_duration_buckets() -> Vec<f64> {
    DEFAULT_DURATION.to_vec()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricConfig {
    /// `counter`, `gauge`, `histogram` or `summary`.
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub buckets: Vec<f64>,
    #[serde(default)]
    pub objectives: Vec<ObjectiveEntry>,
}

impl MetricConfig {
    pub fn validate(&self) -> Result<()> {
        let kind: MetricKind = self.kind.parse()?;
        if !self.buckets.is_empty() && kind != MetricKind::Histogram {
            return Err(MonitorError::BadConfig(format!(
                "metric '{}': buckets only apply to histograms",
                self.name
            )));
        }
        if self.buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MonitorError::BadConfig(format!(
                "metric '{}': buckets must be strictly increasing",
                self.name
            )));
        }
        if !self.objectives.is_empty() && kind != MetricKind::Summary {
            return Err(MonitorError::BadConfig(format!(
                "metric '{}': objectives only apply to summaries",
                self.name
            )));
        }
        Ok(())
    }

    pub fn to_metric(&self) -> Result<Metric> {
        Ok(Metric::parse(&self.kind, self.name.clone())?
            .description(self.description.clone())
            .labels(self.labels.iter().cloned())
            .buckets(self.buckets.clone())
            .objectives(self.objectives.iter().map(|o| (o.quantile, o.error))))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectiveEntry {
    pub quantile: f64,
    pub error: f64,
}
