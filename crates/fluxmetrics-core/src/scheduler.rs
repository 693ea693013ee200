//! Scheduler handle contract.
//!
//! The handle is the only data source for built-in metrics. It is built once
//! at startup and shared (`Arc<dyn SchedulerHandle>`) by every provider, so
//! tests can swap in a stub.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One side (free or up) of a resource listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSet {
    #[serde(default)]
    pub ncores: u64,
    #[serde(default)]
    pub nodelist: Vec<String>,
}

/// Snapshot of free/up resources as reported by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceListing {
    #[serde(default)]
    pub free: ResourceSet,
    #[serde(default)]
    pub up: ResourceSet,
}

/// A job entry from the job listing. Only the state is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub state: u32,
}

/// Job states. Values are the scheduler's state bit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    New = 1,
    Depend = 2,
    Priority = 4,
    Sched = 8,
    Run = 16,
    Cleanup = 32,
    Inactive = 64,
}

impl JobState {
    /// Every state, in lifecycle order.
    pub const ALL: [JobState; 7] = [
        JobState::New,
        JobState::Depend,
        JobState::Priority,
        JobState::Sched,
        JobState::Run,
        JobState::Cleanup,
        JobState::Inactive,
    ];

    pub fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| *s as u32 == bits)
    }

    /// Upper-case name, as the scheduler prints it.
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::New => "NEW",
            JobState::Depend => "DEPEND",
            JobState::Priority => "PRIORITY",
            JobState::Sched => "SCHED",
            JobState::Run => "RUN",
            JobState::Cleanup => "CLEANUP",
            JobState::Inactive => "INACTIVE",
        }
    }

    /// Name of the built-in queue counter for this state.
    pub fn metric_name(self) -> String {
        format!("job_queue_state_{}_count", self.as_str().to_ascii_lowercase())
    }
}

/// Query surface of the cluster scheduler.
pub trait SchedulerHandle: Send + Sync {
    /// Free and up cores/nodes.
    fn query_resource_listing(&self) -> Result<ResourceListing>;

    /// Every job known to the scheduler.
    fn query_job_listing(&self) -> Result<Vec<JobRecord>>;

    /// Translate a state bit flag into its name (`"UNKNOWN"` when not a state).
    fn state_to_name(&self, state: u32) -> String {
        JobState::from_bits(state)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn state_bits_round_trip_through_names() {
        assert_eq!(JobState::from_bits(16), Some(JobState::Run));
        assert_eq!(JobState::from_bits(3), None);
        assert_eq!(JobState::Priority.metric_name(), "job_queue_state_priority_count");
    }

    #[test]
    fn resource_listing_tolerates_missing_sides() {
        let listing: ResourceListing =
            serde_json::from_str(r#"{"up": {"ncores": 8, "nodelist": ["a", "b"]}}"#)
                .expect("parse");
        assert_eq!(listing.up.ncores, 8);
        assert_eq!(listing.free, ResourceSet::default());
    }
}
