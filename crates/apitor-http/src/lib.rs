//! apitor HTTP integration.
//!
//! This crate wires the metrics core into an axum service: strict YAML
//! config, shared state holding the monitor, the metrics middleware and the
//! exposition route. It is consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod router;
