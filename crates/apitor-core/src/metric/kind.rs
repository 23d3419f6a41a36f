//! Metric kinds and the operations each kind admits.

use std::fmt;
use std::str::FromStr;

use crate::error::MonitorError;

/// The four metric kinds. Fixed for the lifetime of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Counter,
        MetricKind::Gauge,
        MetricKind::Histogram,
        MetricKind::Summary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
        }
    }

    /// Whether `op` is legal for this kind.
    pub fn allows(self, op: Operation) -> bool {
        match op {
            Operation::Set => self == MetricKind::Gauge,
            Operation::Inc | Operation::Add | Operation::Read => {
                matches!(self, MetricKind::Counter | MetricKind::Gauge)
            }
            Operation::Observe | Operation::ReadDistribution => {
                matches!(self, MetricKind::Histogram | MetricKind::Summary)
            }
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| MonitorError::InvalidKind(s.to_string()))
    }
}

/// Operations a caller may attempt on a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Set,
    Inc,
    Add,
    Observe,
    /// Read a counter/gauge value back.
    Read,
    /// Read histogram/summary totals back.
    ReadDistribution,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Set => "set",
            Operation::Inc => "inc",
            Operation::Add => "add",
            Operation::Observe => "observe",
            Operation::Read => "read",
            Operation::ReadDistribution => "read distribution",
        }
    }
}
