//! Custom metric plugins.
//!
//! A plugin is a shared library implementing the C ABI in `abi`. `loader`
//! opens it once at startup, validates what it exports and registers each
//! metric in the custom half of the registry. Rust code linked into the
//! binary can skip all of this and call `MetricRegistry::register_custom`.

pub mod abi;
pub mod loader;

pub use loader::{load, PluginMetric};
