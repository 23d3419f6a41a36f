//! Summary vector collector.
//!
//! The `prometheus` crate ships counters, gauges and histograms but no
//! summaries, so this module provides one as a `Collector`. Series are keyed
//! by their label values in a `DashMap`. Each series keeps count, sum and a
//! bounded window of the most recent observations; quantiles are computed
//! from that window at collection time.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, MetricFamily, MetricType};

/// Observations retained per series for quantile estimation.
pub const MAX_SAMPLES: usize = 500;

#[derive(Default)]
struct SummaryState {
    count: u64,
    sum: f64,
    window: VecDeque<f64>,
}

impl SummaryState {
    fn record(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        if self.window.len() == MAX_SAMPLES {
            self.window.pop_front();
        }
        self.window.push_back(v);
    }

    /// Nearest-rank quantile over the window. NaN when empty.
    fn quantile(sorted: &[f64], q: f64) -> f64 {
        if sorted.is_empty() {
            return f64::NAN;
        }
        let rank = (q * sorted.len() as f64).ceil() as usize;
        sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
    }
}

struct SummaryVecCore {
    desc: Desc,
    label_names: Vec<String>,
    objectives: Vec<(f64, f64)>,
    children: DashMap<Vec<String>, Mutex<SummaryState>>,
}

/// Summary with dynamic labels. Cheap to clone; clones share series.
#[derive(Clone)]
pub struct SummaryVec {
    core: Arc<SummaryVecCore>,
}

impl SummaryVec {
    /// `objectives` maps quantile to allowed absolute error.
    pub fn new(
        name: &str,
        help: &str,
        label_names: &[&str],
        objectives: &[(f64, f64)],
    ) -> prometheus::Result<Self> {
        for &(q, err) in objectives {
            if !(0.0..=1.0).contains(&q) || !(0.0..1.0).contains(&err) {
                return Err(prometheus::Error::Msg(format!(
                    "invalid summary objective {q}:{err} for {name}"
                )));
            }
        }
        let label_names: Vec<String> = label_names.iter().map(|l| l.to_string()).collect();
        let desc = Desc::new(
            name.to_string(),
            help.to_string(),
            label_names.clone(),
            HashMap::new(),
        )?;

        let mut objectives = objectives.to_vec();
        objectives.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(Self {
            core: Arc::new(SummaryVecCore {
                desc,
                label_names,
                objectives,
                children: DashMap::new(),
            }),
        })
    }

    /// Record `v` into the series selected by `label_values`.
    pub fn observe(&self, label_values: &[&str], v: f64) -> prometheus::Result<()> {
        let expect = self.core.label_names.len();
        if label_values.len() != expect {
            return Err(prometheus::Error::InconsistentCardinality {
                expect,
                got: label_values.len(),
            });
        }
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        let series = self
            .core
            .children
            .entry(key)
            .or_insert_with(Mutex::default);
        series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(v);
        Ok(())
    }

    fn series(&self, label_values: &[String], state: &SummaryState) -> proto::Metric {
        let mut pairs: Vec<proto::LabelPair> = self
            .core
            .label_names
            .iter()
            .zip(label_values)
            .map(|(name, value)| {
                let mut lp = proto::LabelPair::default();
                lp.set_name(name.clone());
                lp.set_value(value.clone());
                lp
            })
            .collect();
        pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));

        let mut sorted: Vec<f64> = state.window.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut summary = proto::Summary::default();
        summary.set_sample_count(state.count);
        summary.set_sample_sum(state.sum);
        for &(q, _) in &self.core.objectives {
            let mut quantile = proto::Quantile::default();
            quantile.set_quantile(q);
            quantile.set_value(SummaryState::quantile(&sorted, q));
            summary.mut_quantile().push(quantile);
        }

        let mut m = proto::Metric::default();
        for lp in pairs {
            m.mut_label().push(lp);
        }
        m.set_summary(summary);
        m
    }
}

impl Collector for SummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.core.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut mf = MetricFamily::default();
        mf.set_name(self.core.desc.fq_name.clone());
        mf.set_help(self.core.desc.help.clone());
        mf.set_field_type(MetricType::SUMMARY);

        for r in self.core.children.iter() {
            let state = r.value().lock().unwrap_or_else(PoisonError::into_inner);
            mf.mut_metric().push(self.series(r.key(), &state));
        }
        vec![mf]
    }
}
