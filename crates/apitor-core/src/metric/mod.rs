//! Typed, labeled metrics.
//!
//! A [`Metric`] is declared with a builder, then handed to a
//! [`Monitor`](crate::Monitor) which binds it to a backend vector of the
//! matching kind. Builder methods consume the metric, and the monitor only
//! hands out shared references afterwards, so the label schema cannot change
//! once the metric is registered.
//!
//! Every update checks, in order: the operation is legal for the declared
//! kind (`WrongKind`), then the bound backend vector matches that kind
//! (`BackingMismatch`). Label arity is checked by the backend.

pub mod kind;
pub mod summary;

use prometheus::core::Collector;
use prometheus::proto;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts};

use crate::error::{MonitorError, Result};

pub use kind::{MetricKind, Operation};
pub use summary::SummaryVec;

/// Backend vector bound to a registered metric.
#[derive(Clone)]
pub enum MetricVec {
    Counter(CounterVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec),
    Summary(SummaryVec),
}

impl MetricVec {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricVec::Counter(_) => MetricKind::Counter,
            MetricVec::Gauge(_) => MetricKind::Gauge,
            MetricVec::Histogram(_) => MetricKind::Histogram,
            MetricVec::Summary(_) => MetricKind::Summary,
        }
    }

    /// Boxed handle for backend (un)registration.
    pub(crate) fn boxed(&self) -> Box<dyn Collector> {
        match self {
            MetricVec::Counter(v) => Box::new(v.clone()),
            MetricVec::Gauge(v) => Box::new(v.clone()),
            MetricVec::Histogram(v) => Box::new(v.clone()),
            MetricVec::Summary(v) => Box::new(v.clone()),
        }
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        match self {
            MetricVec::Counter(v) => v.collect(),
            MetricVec::Gauge(v) => v.collect(),
            MetricVec::Histogram(v) => v.collect(),
            MetricVec::Summary(v) => v.collect(),
        }
    }
}

/// Constructs the backend vector for a metric under the given exposed name.
pub type VecBuilder = fn(&Metric, &str) -> Result<MetricVec>;

/// Backend constructor for each kind.
pub fn vec_builder(kind: MetricKind) -> VecBuilder {
    match kind {
        MetricKind::Counter => build_counter,
        MetricKind::Gauge => build_gauge,
        MetricKind::Histogram => build_histogram,
        MetricKind::Summary => build_summary,
    }
}

fn build_counter(m: &Metric, exposed: &str) -> Result<MetricVec> {
    let vec = CounterVec::new(Opts::new(exposed, m.help()), &m.label_refs())?;
    Ok(MetricVec::Counter(vec))
}

fn build_gauge(m: &Metric, exposed: &str) -> Result<MetricVec> {
    let vec = GaugeVec::new(Opts::new(exposed, m.help()), &m.label_refs())?;
    Ok(MetricVec::Gauge(vec))
}

fn build_histogram(m: &Metric, exposed: &str) -> Result<MetricVec> {
    let mut opts = HistogramOpts::new(exposed, m.help());
    if !m.buckets.is_empty() {
        opts = opts.buckets(m.buckets.clone());
    }
    let vec = HistogramVec::new(opts, &m.label_refs())?;
    Ok(MetricVec::Histogram(vec))
}

fn build_summary(m: &Metric, exposed: &str) -> Result<MetricVec> {
    let vec = SummaryVec::new(exposed, &m.help(), &m.label_refs(), &m.objectives)?;
    Ok(MetricVec::Summary(vec))
}

/// A named, typed measurement. Names are unique within a monitor.
pub struct Metric {
    kind: MetricKind,
    name: String,
    exposed: String,
    description: String,
    labels: Vec<String>,
    buckets: Vec<f64>,
    objectives: Vec<(f64, f64)>,
    vec: Option<MetricVec>,
}

impl Metric {
    pub fn new(kind: MetricKind, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind,
            exposed: name.clone(),
            name,
            description: String::new(),
            labels: Vec::new(),
            buckets: Vec::new(),
            objectives: Vec::new(),
            vec: None,
        }
    }

    /// Like [`Metric::new`] but with the kind given by name (`"counter"`, ...).
    pub fn parse(kind: &str, name: impl Into<String>) -> Result<Self> {
        Ok(Self::new(kind.parse()?, name))
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Appends label names; order is the order label values must be given in.
    pub fn labels<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(names.into_iter().map(Into::into));
        self
    }

    /// Histogram bucket upper bounds.
    pub fn buckets(mut self, buckets: Vec<f64>) -> Self {
        self.buckets = buckets;
        self
    }

    /// Summary objectives as `(quantile, absolute error)` pairs.
    pub fn objectives<I>(mut self, objectives: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        self.objectives = objectives.into_iter().collect();
        self
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Logical name, used for lookups.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name as exposed to the backend (after any prefix/suffix).
    pub fn exposed_name(&self) -> &str {
        &self.exposed
    }

    pub fn description_text(&self) -> &str {
        &self.description
    }

    pub fn label_names(&self) -> &[String] {
        &self.labels
    }

    pub fn bucket_bounds(&self) -> &[f64] {
        &self.buckets
    }

    pub fn objective_pairs(&self) -> &[(f64, f64)] {
        &self.objectives
    }

    pub fn backing(&self) -> Option<&MetricVec> {
        self.vec.as_ref()
    }

    pub(crate) fn attach(&mut self, exposed: String, vec: MetricVec) {
        self.exposed = exposed;
        self.vec = Some(vec);
    }

    // The backend rejects empty help strings.
    fn help(&self) -> String {
        if self.description.is_empty() {
            self.name.clone()
        } else {
            self.description.clone()
        }
    }

    fn label_refs(&self) -> Vec<&str> {
        self.labels.iter().map(String::as_str).collect()
    }

    fn check(&self, op: Operation) -> Result<()> {
        if self.kind.allows(op) {
            Ok(())
        } else {
            Err(MonitorError::WrongKind {
                name: self.name.clone(),
                kind: self.kind,
                op: op.as_str(),
            })
        }
    }

    fn mismatch(&self) -> MonitorError {
        MonitorError::BackingMismatch(self.name.clone())
    }

    /// Sets a gauge series to `value`.
    pub fn set_value(&self, label_values: &[&str], value: f64) -> Result<()> {
        self.check(Operation::Set)?;
        match &self.vec {
            Some(MetricVec::Gauge(v)) => {
                v.get_metric_with_label_values(label_values)?.set(value);
                Ok(())
            }
            _ => Err(self.mismatch()),
        }
    }

    /// Increments a counter or gauge series by 1.
    pub fn inc(&self, label_values: &[&str]) -> Result<()> {
        self.check(Operation::Inc)?;
        match (self.kind, &self.vec) {
            (MetricKind::Counter, Some(MetricVec::Counter(v))) => {
                v.get_metric_with_label_values(label_values)?.inc();
                Ok(())
            }
            (MetricKind::Gauge, Some(MetricVec::Gauge(v))) => {
                v.get_metric_with_label_values(label_values)?.inc();
                Ok(())
            }
            _ => Err(self.mismatch()),
        }
    }

    /// Adds `value` to a counter or gauge series.
    ///
    /// Counters must only receive non-negative values; that is the caller's
    /// responsibility.
    pub fn add(&self, label_values: &[&str], value: f64) -> Result<()> {
        self.check(Operation::Add)?;
        match (self.kind, &self.vec) {
            (MetricKind::Counter, Some(MetricVec::Counter(v))) => {
                v.get_metric_with_label_values(label_values)?.inc_by(value);
                Ok(())
            }
            (MetricKind::Gauge, Some(MetricVec::Gauge(v))) => {
                v.get_metric_with_label_values(label_values)?.add(value);
                Ok(())
            }
            _ => Err(self.mismatch()),
        }
    }

    /// Records `value` into a histogram or summary series.
    pub fn observe(&self, label_values: &[&str], value: f64) -> Result<()> {
        self.check(Operation::Observe)?;
        match (self.kind, &self.vec) {
            (MetricKind::Histogram, Some(MetricVec::Histogram(v))) => {
                v.get_metric_with_label_values(label_values)?.observe(value);
                Ok(())
            }
            (MetricKind::Summary, Some(MetricVec::Summary(v))) => {
                v.observe(label_values, value)?;
                Ok(())
            }
            _ => Err(self.mismatch()),
        }
    }

    /// Current value of a counter or gauge series; 0 if never touched.
    pub fn value(&self, label_values: &[&str]) -> Result<f64> {
        self.check(Operation::Read)?;
        let series = self.find_series(label_values)?;
        Ok(match (self.kind, series) {
            (_, None) => 0.0,
            (MetricKind::Counter, Some(m)) => m.get_counter().get_value(),
            (_, Some(m)) => m.get_gauge().get_value(),
        })
    }

    /// Number of observations recorded in a histogram or summary series.
    pub fn sample_count(&self, label_values: &[&str]) -> Result<u64> {
        self.check(Operation::ReadDistribution)?;
        let series = self.find_series(label_values)?;
        Ok(match (self.kind, series) {
            (_, None) => 0,
            (MetricKind::Histogram, Some(m)) => m.get_histogram().get_sample_count(),
            (_, Some(m)) => m.get_summary().get_sample_count(),
        })
    }

    /// Sum of observations recorded in a histogram or summary series.
    pub fn sample_sum(&self, label_values: &[&str]) -> Result<f64> {
        self.check(Operation::ReadDistribution)?;
        let series = self.find_series(label_values)?;
        Ok(match (self.kind, series) {
            (_, None) => 0.0,
            (MetricKind::Histogram, Some(m)) => m.get_histogram().get_sample_sum(),
            (_, Some(m)) => m.get_summary().get_sample_sum(),
        })
    }

    /// Number of live series.
    pub fn series_count(&self) -> usize {
        self.vec
            .as_ref()
            .map(|v| v.collect().iter().map(|mf| mf.get_metric().len()).sum())
            .unwrap_or(0)
    }

    // Reads go through collect() so that they never create a series.
    fn find_series(&self, label_values: &[&str]) -> Result<Option<proto::Metric>> {
        let vec = match &self.vec {
            Some(v) if v.kind() == self.kind => v,
            _ => return Err(self.mismatch()),
        };
        if label_values.len() != self.labels.len() {
            return Err(prometheus::Error::InconsistentCardinality {
                expect: self.labels.len(),
                got: label_values.len(),
            }
            .into());
        }

        let mut want: Vec<(&str, &str)> = self
            .labels
            .iter()
            .map(String::as_str)
            .zip(label_values.iter().copied())
            .collect();
        want.sort_unstable();

        let families = vec.collect();
        let found = families
            .iter()
            .flat_map(|mf| mf.get_metric().iter())
            .find(|m| {
                let mut have: Vec<(&str, &str)> = m
                    .get_label()
                    .iter()
                    .map(|lp| (lp.get_name(), lp.get_value()))
                    .collect();
                have.sort_unstable();
                have == want
            })
            .cloned();
        Ok(found)
    }
}
