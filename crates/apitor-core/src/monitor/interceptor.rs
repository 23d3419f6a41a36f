//! Per-request metric updates.
//!
//! `Monitor::intercept` turns the facts about one finished request into a
//! set of independent update tasks, runs them on a fresh
//! [`ParallelAction`], and reports the first failure.

use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::parallel::ParallelAction;

use super::defaults::{
    REQUEST_BODY_TOTAL, REQUEST_DURATION, REQUEST_TOTAL, REQUEST_UV_TOTAL, RESPONSE_BODY_TOTAL,
    SLOW_REQUEST_TOTAL, URI_REQUEST_TOTAL,
};
use super::Monitor;

/// User hook run for every measured request.
pub type InterceptorFn = Arc<dyn Fn(&RequestFacts) -> Result<()> + Send + Sync>;

/// What the serving framework knows about a finished request.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    pub start: Instant,
    /// Caller identity, usually the client IP.
    pub caller: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    /// Negative when unknown.
    pub request_bytes: i64,
    pub response_bytes: i64,
}

/// Mutation applied by an update task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Update {
    Inc,
    Add(f64),
    Set(f64),
    Observe(f64),
}

/// One metric mutation: target, label values, operation.
#[derive(Debug, Clone)]
pub struct UpdateTask {
    pub metric: &'static str,
    pub label_values: Vec<String>,
    pub update: Update,
}

impl UpdateTask {
    fn new(metric: &'static str, label_values: Vec<String>, update: Update) -> Self {
        Self {
            metric,
            label_values,
            update,
        }
    }

    pub fn run(&self, monitor: &Monitor) -> Result<()> {
        let metric = monitor.get_metric(self.metric)?;
        let values: Vec<&str> = self.label_values.iter().map(String::as_str).collect();
        match self.update {
            Update::Inc => metric.inc(&values),
            Update::Add(v) => metric.add(&values, v),
            Update::Set(v) => metric.set_value(&values, v),
            Update::Observe(v) => metric.observe(&values, v),
        }
    }
}

impl Monitor {
    /// Record the default metrics for one finished request.
    ///
    /// Excluded paths and the exposition path are skipped. All updates run
    /// to completion, even if this future is dropped early; only the first
    /// failure is returned. Must be called from within a tokio runtime.
    pub async fn intercept(self: &Arc<Self>, facts: RequestFacts) -> Result<()> {
        if self.is_excluded(&facts.path) {
            return Ok(());
        }

        let mut p = ParallelAction::new();
        let code = facts.status.to_string();
        let uri_labels = vec![facts.path.clone(), facts.method.clone(), code];

        self.submit(
            &mut p,
            UpdateTask::new(REQUEST_TOTAL, self.label_values(Vec::new()), Update::Inc),
        );

        if !self.filter.contains(&facts.caller) {
            let monitor = Arc::clone(self);
            let caller = facts.caller.clone();
            let task =
                UpdateTask::new(REQUEST_UV_TOTAL, self.label_values(Vec::new()), Update::Inc);
            p.add(move || {
                monitor.filter.add(&caller);
                task.run(&monitor)
            });
        }

        self.submit(
            &mut p,
            UpdateTask::new(URI_REQUEST_TOTAL, self.label_values(uri_labels.clone()), Update::Inc),
        );

        if facts.request_bytes >= 0 {
            self.submit(
                &mut p,
                UpdateTask::new(
                    REQUEST_BODY_TOTAL,
                    self.label_values(Vec::new()),
                    Update::Add(facts.request_bytes as f64),
                ),
            );
        }

        let latency = facts.start.elapsed();
        if latency.as_secs() > self.slow_time {
            self.submit(
                &mut p,
                UpdateTask::new(SLOW_REQUEST_TOTAL, self.label_values(uri_labels), Update::Inc),
            );
        }

        self.submit(
            &mut p,
            UpdateTask::new(
                REQUEST_DURATION,
                self.label_values(vec![facts.path.clone()]),
                Update::Observe(latency.as_secs_f64()),
            ),
        );

        if facts.response_bytes > 0 {
            self.submit(
                &mut p,
                UpdateTask::new(
                    RESPONSE_BODY_TOTAL,
                    self.label_values(Vec::new()),
                    Update::Add(facts.response_bytes as f64),
                ),
            );
        }

        if !self.interceptors.is_empty() {
            let facts = Arc::new(facts);
            for hook in &self.interceptors {
                let hook = Arc::clone(hook);
                let facts = Arc::clone(&facts);
                p.add(move || hook(&facts));
            }
        }

        p.wait().await
    }

    fn submit(self: &Arc<Self>, p: &mut ParallelAction, task: UpdateTask) {
        let monitor = Arc::clone(self);
        p.add(move || task.run(&monitor));
    }
}
