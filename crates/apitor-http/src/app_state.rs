//! Shared application state: config plus the live monitor.
//!
//! All metric registration happens here, before the monitor is shared.
//! Startup errors are returned, not panicked on.

use std::sync::Arc;

use apitor_core::error::Result;
use apitor_core::Monitor;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: AppConfig,
    monitor: Arc<Monitor>,
}

impl AppState {
    /// Build the monitor described by `cfg` and register its metrics.
    pub fn new(cfg: AppConfig) -> Result<Self> {
        let mut monitor = Monitor::new(cfg.monitor.to_monitor_config());

        // 1) Built-in request metrics
        if cfg.monitor.default_metrics {
            monitor.register_default_metrics()?;
        }

        // 2) Custom metrics
        for m in &cfg.metrics {
            monitor.add_metric(m.to_metric()?)?;
        }

        // 3) Renames apply to everything registered so far
        monitor.set_metric_prefix(&cfg.monitor.prefix)?;
        monitor.set_metric_suffix(&cfg.monitor.suffix)?;

        tracing::info!(
            metrics = monitor.metric_names().len(),
            metric_path = %monitor.metric_path(),
            "monitor ready"
        );
        Ok(Self::with_monitor(cfg, Arc::new(monitor)))
    }

    /// Use an already built monitor (e.g. one with custom interceptors).
    pub fn with_monitor(cfg: AppConfig, monitor: Arc<Monitor>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { cfg, monitor }),
        }
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.inner.cfg
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.inner.monitor
    }
}
