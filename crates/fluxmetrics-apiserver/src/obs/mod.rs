//! Lightweight in-process metrics about the API server itself.
//!
//! Stored as atomics and rendered in Prometheus text format by the
//! `/metrics` handler, which is only mounted in verbose mode.

pub mod metrics;
