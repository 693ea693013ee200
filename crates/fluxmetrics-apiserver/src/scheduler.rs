//! Command-backed scheduler handle.
//!
//! Each query runs a configured command and parses its stdout as JSON. The
//! calls block, so providers are always run on the blocking thread pool.
//! A command that outlives its deadline is killed together with everything
//! it spawned (it runs in its own process group).

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Deserialize;

use fluxmetrics_core::error::{MetricsError, Result};
use fluxmetrics_core::{JobRecord, ResourceListing, SchedulerHandle};

use crate::config::SchedulerSection;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobListingDoc {
    Wrapped { jobs: Vec<JobRecord> },
    Bare(Vec<JobRecord>),
}

#[derive(Debug, Clone)]
pub struct CommandScheduler {
    resource_command: Vec<String>,
    jobs_command: Vec<String>,
    timeout: Duration,
}

impl CommandScheduler {
    pub fn new(resource_command: Vec<String>, jobs_command: Vec<String>, timeout: Duration) -> Result<Self> {
        if resource_command.is_empty() || jobs_command.is_empty() {
            return Err(MetricsError::Config("scheduler commands must not be empty".into()));
        }
        Ok(Self {
            resource_command,
            jobs_command,
            timeout,
        })
    }

    pub fn from_config(cfg: &SchedulerSection) -> Result<Self> {
        Self::new(
            cfg.resource_command.clone(),
            cfg.jobs_command.clone(),
            Duration::from_millis(cfg.timeout_ms),
        )
    }

    fn run(&self, argv: &[String]) -> Result<Vec<u8>> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| MetricsError::Scheduler("empty command".into()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let mut child = command
            .spawn()
            .map_err(|e| MetricsError::Scheduler(format!("spawn `{program}` failed: {e}")))?;

        // Pipes are drained concurrently so a chatty command cannot stall on a full pipe.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    kill_group(&mut child);
                    tracing::warn!(command = %argv.join(" "), timeout_ms = self.timeout.as_millis() as u64, "scheduler command killed");
                    return Err(MetricsError::Scheduler(format!(
                        "`{}` timed out after {} ms",
                        argv.join(" "),
                        self.timeout.as_millis()
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    kill_group(&mut child);
                    return Err(MetricsError::Scheduler(format!("wait on `{program}` failed: {e}")));
                }
            }
        };

        let stdout = collect(stdout);
        if !status.success() {
            let stderr = collect(stderr);
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(MetricsError::Scheduler(format!(
                "`{}` exited with {}: {}",
                argv.join(" "),
                status,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// SIGKILL the child's process group, then reap the child.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        let pgid = child.id() as libc::pid_t;
        if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
            let err = std::io::Error::last_os_error();
            tracing::debug!(pgid, error = %err, "process group kill failed");
            let _ = child.kill();
        }
    }
    #[cfg(not(unix))]
    let _ = child.kill();

    let _ = child.wait();
}

impl SchedulerHandle for CommandScheduler {
    fn query_resource_listing(&self) -> Result<ResourceListing> {
        let stdout = self.run(&self.resource_command)?;
        serde_json::from_slice(&stdout)
            .map_err(|e| MetricsError::Scheduler(format!("invalid resource listing: {e}")))
    }

    fn query_job_listing(&self) -> Result<Vec<JobRecord>> {
        let stdout = self.run(&self.jobs_command)?;
        let doc: JobListingDoc = serde_json::from_slice(&stdout)
            .map_err(|e| MetricsError::Scheduler(format!("invalid job listing: {e}")))?;
        Ok(match doc {
            JobListingDoc::Wrapped { jobs } => jobs,
            JobListingDoc::Bare(jobs) => jobs,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    fn scheduler(resource: Vec<String>, jobs: Vec<String>) -> CommandScheduler {
        CommandScheduler::new(resource, jobs, Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn parses_resource_listing_from_stdout() {
        let s = scheduler(
            sh(r#"echo '{"free": {"ncores": 2, "nodelist": ["n1"]}, "up": {"ncores": 8, "nodelist": ["n0", "n1"]}}'"#),
            sh("echo '[]'"),
        );
        let listing = s.query_resource_listing().unwrap();
        assert_eq!(listing.up.nodelist.len(), 2);
        assert_eq!(listing.free.ncores, 2);
    }

    #[test]
    fn accepts_wrapped_and_bare_job_listings() {
        let wrapped = scheduler(
            sh("echo '{}'"),
            sh(r#"echo '{"jobs": [{"id": 1, "state": 16}, {"id": 2, "state": 1}]}'"#),
        );
        assert_eq!(wrapped.query_job_listing().unwrap().len(), 2);

        let bare = scheduler(sh("echo '{}'"), sh(r#"echo '[{"state": 8}]'"#));
        assert_eq!(bare.query_job_listing().unwrap()[0].state, 8);
    }

    #[test]
    fn failing_command_is_a_scheduler_error() {
        let s = scheduler(sh("echo nope >&2; exit 3"), sh("echo not-json"));
        let err = s.query_resource_listing().unwrap_err();
        assert!(err.to_string().contains("nope"));
        assert!(matches!(s.query_job_listing().unwrap_err(), MetricsError::Scheduler(_)));
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandScheduler::new(vec![], sh("true"), Duration::from_secs(1)).is_err());
    }

    /// Running (not zombie) processes whose command line mentions `marker`.
    #[cfg(target_os = "linux")]
    fn live_processes(marker: &str) -> usize {
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().chars().all(|c| c.is_ascii_digit()))
            .filter(|e| {
                let cmdline = std::fs::read(e.path().join("cmdline")).unwrap_or_default();
                let cmdline = String::from_utf8_lossy(&cmdline).replace('\0', " ");
                let stat = std::fs::read_to_string(e.path().join("stat")).unwrap_or_default();
                let zombie = stat
                    .rsplit_once(')')
                    .map(|(_, rest)| rest.trim_start().starts_with('Z'))
                    .unwrap_or(true);
                cmdline.contains(marker) && !zombie
            })
            .count()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn hung_command_is_killed_with_its_children() {
        let marker = "sleep 7.613";
        let s = CommandScheduler::new(
            sh(&format!("{marker}; echo '{{}}'")),
            sh("echo '[]'"),
            Duration::from_millis(200),
        )
        .unwrap();

        let started = Instant::now();
        let err = s.query_resource_listing().unwrap_err();
        assert!(matches!(err, MetricsError::Scheduler(_)));
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));

        let deadline = Instant::now() + Duration::from_secs(2);
        while live_processes(marker) > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(live_processes(marker), 0);
    }
}
