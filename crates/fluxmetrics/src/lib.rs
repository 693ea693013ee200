//! Top-level facade crate for the Flux custom metrics API server.
//!
//! Re-exports the core registry/protocol types and the API server library so
//! users can depend on a single crate.

pub mod core {
    pub use fluxmetrics_core::*;
}

pub mod apiserver {
    pub use fluxmetrics_apiserver::*;
}
