//! apitor core: typed request metrics on top of the `prometheus` crate.
//!
//! This crate defines the metric abstraction, the monitor (registry) with its
//! default request metrics, the per-request interceptor and the concurrent
//! update engine. It carries no HTTP dependencies, so any serving framework
//! can drive it, but request interception spawns tokio tasks and must run
//! inside a tokio runtime.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Metric failures surface as `MonitorError`/`Result` so a broken metric
//! never takes the serving process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bloom;
pub mod error;
pub mod metric;
pub mod monitor;
pub mod parallel;

/// Shared result type.
pub use error::{ErrorCode, MonitorError, Result};
pub use bloom::{BloomFilter, MembershipFilter};
pub use metric::{Metric, MetricKind, MetricVec};
pub use monitor::defaults;
pub use monitor::interceptor::{Update, UpdateTask};
pub use monitor::{Monitor, MonitorConfig, RequestFacts};
pub use parallel::ParallelAction;
