//! Top-level facade crate for apitor.
//!
//! Re-exports the metrics core and the HTTP integration so users can depend on a single crate.

pub mod core {
    pub use apitor_core::*;
}

pub mod http {
    pub use apitor_http::*;
}
