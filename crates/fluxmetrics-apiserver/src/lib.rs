//! Flux custom metrics API server library entry.
//!
//! Wires the metric registry, the scheduler client, the custom metrics
//! plugin loader and the discovery cache into an axum router. Used by the
//! binary (`main.rs`) and by integration tests.

pub mod api;
pub mod app_state;
pub mod cli;
pub mod config;
pub mod obs;
pub mod ops;
pub mod plugin;
pub mod router;
pub mod scheduler;
pub mod transport;
pub mod upstream;
