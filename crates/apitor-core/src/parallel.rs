//! Per-request fan-out/fan-in of metric updates.
//!
//! Each submitted task runs as its own tokio task. A failing task never
//! cancels its siblings; failures are appended to a shared list under a
//! mutex and reported after every task has finished. Dropping the engine
//! before it is joined detaches the outstanding tasks; they still run.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;

use crate::error::{MonitorError, Result};

/// Runs independent update tasks concurrently and joins on all of them.
///
/// `wait`/`wait_all` consume the instance: one engine per request.
#[derive(Default)]
pub struct ParallelAction {
    tasks: JoinSet<()>,
    errors: Arc<Mutex<Vec<MonitorError>>>,
}

impl ParallelAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch `task`. Must be called from within a tokio runtime.
    pub fn add<F>(&mut self, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let errors = Arc::clone(&self.errors);
        self.tasks.spawn(async move {
            set_error(&errors, task().err());
        });
    }

    /// Tasks not yet joined.
    pub fn outstanding(&self) -> usize {
        self.tasks.len()
    }

    /// Block until every task is done, then return the first recorded
    /// failure (in completion order), if any.
    pub async fn wait(self) -> Result<()> {
        match self.wait_all().await.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Block until every task is done and return every recorded failure.
    pub async fn wait_all(mut self) -> Vec<MonitorError> {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                set_error(&self.errors, Some(MonitorError::TaskFailed(e.to_string())));
            }
        }
        let mut errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *errors)
    }
}

impl Drop for ParallelAction {
    // A bare JoinSet aborts unfinished tasks on drop.
    fn drop(&mut self) {
        self.tasks.detach_all();
    }
}

fn set_error(errors: &Mutex<Vec<MonitorError>>, err: Option<MonitorError>) {
    let Some(err) = err else { return };
    errors
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(err);
}
