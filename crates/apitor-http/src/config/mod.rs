//! Service config loader (strict parsing).

pub mod schema;

use std::fs;

use apitor_core::error::{MonitorError, Result};

pub use schema::{AppConfig, MetadataEntry, MetricConfig, MonitorSection, ServerSection};

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MonitorError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<AppConfig> {
    let cfg: AppConfig = serde_yaml::from_str(s)
        .map_err(|e| MonitorError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
