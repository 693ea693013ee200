//! In-memory scheduler handle shared by integration tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use fluxmetrics_core::{
    JobRecord, JobState, MetricsError, ResourceListing, ResourceSet, Result, SchedulerHandle,
};

#[derive(Default)]
pub struct StubScheduler {
    pub listing: ResourceListing,
    pub jobs: Vec<JobRecord>,
    pub fail: bool,
    pub job_queries: AtomicUsize,
}

impl StubScheduler {
    pub fn with_nodes(up: &[&str], free: &[&str], up_cores: u64, free_cores: u64) -> Self {
        Self {
            listing: ResourceListing {
                up: ResourceSet {
                    ncores: up_cores,
                    nodelist: up.iter().map(|s| s.to_string()).collect(),
                },
                free: ResourceSet {
                    ncores: free_cores,
                    nodelist: free.iter().map(|s| s.to_string()).collect(),
                },
            },
            ..Default::default()
        }
    }

    pub fn with_jobs(mut self, state: JobState, count: usize) -> Self {
        self.jobs
            .extend(std::iter::repeat(JobRecord { state: state as u32 }).take(count));
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl SchedulerHandle for StubScheduler {
    fn query_resource_listing(&self) -> Result<ResourceListing> {
        if self.fail {
            return Err(MetricsError::Scheduler("broker unreachable".into()));
        }
        Ok(self.listing.clone())
    }

    fn query_job_listing(&self) -> Result<Vec<JobRecord>> {
        self.job_queries.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(MetricsError::Scheduler("broker unreachable".into()));
        }
        Ok(self.jobs.clone())
    }
}
