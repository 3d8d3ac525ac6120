// SPDX-License-Identifier: MIT

//! Refresh-job poll loop
//!
//! Polls a job status endpoint on a fixed interval until the job reaches a
//! terminal state or the endpoint reports no job, then triggers a single
//! data refresh. There is no backoff and no retry.

use crate::api::{ClassifierError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    InProgress,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// One answer from the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobSnapshot {
    pub fn new(status: JobState) -> Self {
        Self {
            status,
            progress: None,
            message: None,
        }
    }
}

/// Where the poller reads job state from
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Current job, or `None` when no job is running
    async fn status(&self) -> Result<Option<JobSnapshot>>;
}

/// Reloads the data the finished job produced
#[async_trait]
pub trait DataRefresh: Send + Sync {
    async fn refresh(&self) -> Result<()>;
}

/// Why polling stopped
#[derive(Debug, Clone, PartialEq)]
pub enum PollFinish {
    Completed,
    Failed(Option<String>),
    NoJob,
    /// `max_duration` ran out while the job was still running
    TimedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub finish: PollFinish,
    pub polls: usize,
    /// Whether the data refresh ran
    pub refreshed: bool,
}

pub struct JobPoller {
    source: Arc<dyn JobStatusSource>,
    refresher: Arc<dyn DataRefresh>,
    interval: Duration,
    max_duration: Option<Duration>,
}

impl JobPoller {
    pub fn new(source: Arc<dyn JobStatusSource>, refresher: Arc<dyn DataRefresh>) -> Self {
        Self {
            source,
            refresher,
            interval: DEFAULT_POLL_INTERVAL,
            max_duration: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Give up after `max` without refreshing; unbounded by default
    pub fn with_max_duration(mut self, max: Duration) -> Self {
        self.max_duration = Some(max);
        self
    }

    /// Poll until the job finishes, then refresh once
    ///
    /// The first poll happens immediately. A failed poll or refresh ends the
    /// loop with that error. A zero interval is a configuration error.
    pub async fn run(&self) -> Result<PollOutcome> {
        if self.interval.is_zero() {
            return Err(ClassifierError::config("poll interval must be greater than 0"));
        }
        let started = Instant::now();
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0;

        let finish = loop {
            ticker.tick().await;

            if let Some(max) = self.max_duration {
                if started.elapsed() >= max {
                    log::warn!("Job still running after {:?}, giving up", max);
                    return Ok(PollOutcome {
                        finish: PollFinish::TimedOut,
                        polls,
                        refreshed: false,
                    });
                }
            }

            polls += 1;
            let snapshot = self.source.status().await.map_err(|e| {
                log::error!("Job status poll {} failed: {}", polls, e);
                e
            })?;

            match snapshot {
                None => break PollFinish::NoJob,
                Some(JobSnapshot {
                    status: JobState::Completed,
                    ..
                }) => break PollFinish::Completed,
                Some(JobSnapshot {
                    status: JobState::Failed,
                    message,
                    ..
                }) => break PollFinish::Failed(message),
                Some(snapshot) => {
                    log::debug!(
                        "Job {:?} (progress {:?}) after {} polls",
                        snapshot.status,
                        snapshot.progress,
                        polls
                    );
                }
            }
        };

        log::info!("Job finished with {:?} after {} polls, refreshing", finish, polls);
        self.refresher.refresh().await?;
        Ok(PollOutcome {
            finish,
            polls,
            refreshed: true,
        })
    }

    /// Run the loop on the runtime; dropping the handle stops it
    pub fn spawn(self) -> PollHandle {
        PollHandle {
            task: Some(tokio::spawn(async move { self.run().await })),
        }
    }
}

/// Owner of a spawned poll loop
pub struct PollHandle {
    task: Option<JoinHandle<Result<PollOutcome>>>,
}

impl PollHandle {
    /// Stop polling; no refresh is triggered
    pub fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            log::debug!("Poll loop aborted");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the loop to end
    pub async fn join(mut self) -> Result<PollOutcome> {
        let task = self
            .task
            .take()
            .ok_or_else(|| ClassifierError::Other("poll loop was aborted".to_string()))?;
        task.await
            .map_err(|e| ClassifierError::Other(format!("poll loop task failed: {}", e)))?
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
