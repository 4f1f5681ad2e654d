// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::context::{CancellationToken, JobContext};
use crate::error::{JobError, Result};
use crate::job::Job;
use crate::types::TriggerSource;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

const BASE_RETRY_DELAY_SECS: u64 = 1;
const MAX_RETRY_DELAY_SECS: u64 = 60;
const RETRY_FACTOR: f64 = 2.0;
const MAX_RETRIES: u32 = 3;

struct PeriodicJob {
	job: Arc<dyn Job>,
	interval: Duration,
}

/// Runs registered periodic jobs and delayed one-shot jobs.
///
/// Every task the scheduler spawns is tracked and observes the scheduler's
/// shutdown token, so [`JobScheduler::shutdown`] returns only once nothing
/// is running. Delayed jobs that have not fired yet at shutdown are dropped.
pub struct JobScheduler {
	jobs: HashMap<String, PeriodicJob>,
	shutdown_token: CancellationToken,
	tracker: TaskTracker,
}

impl JobScheduler {
	pub fn new() -> Self {
		Self {
			jobs: HashMap::new(),
			shutdown_token: CancellationToken::new(),
			tracker: TaskTracker::new(),
		}
	}

	pub fn register_periodic(&mut self, job: Arc<dyn Job>, interval: Duration) {
		let id = job.id().to_string();
		self.jobs.insert(id, PeriodicJob { job, interval });
	}

	#[instrument(skip(self))]
	pub fn start(&self) {
		let mut started = 0usize;

		for (job_id, registered) in &self.jobs {
			let interval = registered.interval;
			let job = Arc::clone(&registered.job);
			let token = self.shutdown_token.clone();
			let job_id = job_id.clone();

			self.tracker.spawn(async move {
				loop {
					tokio::select! {
						_ = tokio::time::sleep(interval) => {
							match run_job(&job, new_run_id(), TriggerSource::Schedule, &token).await {
								Ok(run_id) => debug!(job_id = %job_id, run_id = %run_id, "Periodic run finished"),
								Err(e) => debug!(job_id = %job_id, error = %e, "Periodic run gave up until next interval"),
							}
						}
						_ = token.cancelled() => {
							info!(job_id = %job_id, "Shutting down periodic job");
							break;
						}
					}
				}
			});
			started += 1;
		}

		info!(job_count = started, "Job scheduler started");
	}

	/// Runs `job` once after `delay`. Returns the run ID.
	#[instrument(skip(self, job), fields(job_id = %job.id()))]
	pub fn schedule_once(&self, job: Arc<dyn Job>, delay: Duration) -> String {
		let run_id = new_run_id();
		let token = self.shutdown_token.clone();
		let task_run_id = run_id.clone();

		self.tracker.spawn(async move {
			tokio::select! {
				_ = tokio::time::sleep(delay) => {
					if let Err(e) = run_job(&job, task_run_id.clone(), TriggerSource::Deferred, &token).await {
						debug!(job_id = %job.id(), run_id = %task_run_id, error = %e, "Deferred job not completed");
					}
				}
				_ = token.cancelled() => {
					warn!(job_id = %job.id(), run_id = %task_run_id, "Deferred job dropped at shutdown");
				}
			}
		});

		info!(run_id = %run_id, delay_secs = delay.as_secs(), "Deferred job scheduled");
		run_id
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		self.shutdown_token.cancel();
		self.tracker.close();
		self.tracker.wait().await;

		info!("Job scheduler shut down");
	}
}

impl Default for JobScheduler {
	fn default() -> Self {
		Self::new()
	}
}

fn new_run_id() -> String {
	uuid::Uuid::new_v4().to_string()
}

async fn run_job(
	job: &Arc<dyn Job>,
	run_id: String,
	triggered_by: TriggerSource,
	cancellation_token: &CancellationToken,
) -> Result<String> {
	let mut retry_count = 0u32;

	loop {
		let ctx = JobContext {
			run_id: run_id.clone(),
			triggered_by: if retry_count > 0 {
				TriggerSource::Retry
			} else {
				triggered_by
			},
			cancellation_token: cancellation_token.clone(),
		};

		match job.run(&ctx).await {
			Ok(output) => {
				info!(
					job_id = %job.id(),
					run_id = %run_id,
					triggered_by = %ctx.triggered_by,
					message = %output.message,
					"Job completed successfully"
				);
				return Ok(run_id);
			}
			Err(JobError::Cancelled) => {
				info!(job_id = %job.id(), run_id = %run_id, "Job cancelled");
				return Err(JobError::Cancelled);
			}
			Err(JobError::Failed { message, retryable }) => {
				if retryable && retry_count < MAX_RETRIES {
					retry_count += 1;
					let delay_secs = calculate_backoff_delay(retry_count);
					warn!(
						job_id = %job.id(),
						run_id = %run_id,
						retry_count,
						delay_secs,
						error = %message,
						"Job failed, retrying"
					);
					tokio::select! {
						_ = tokio::time::sleep(Duration::from_secs(delay_secs)) => continue,
						_ = cancellation_token.cancelled() => return Err(JobError::Cancelled),
					}
				}

				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed");
				return Err(JobError::Failed { message, retryable });
			}
			Err(e) => {
				warn!(job_id = %job.id(), run_id = %run_id, error = %e, "Job failed with error");
				return Err(e);
			}
		}
	}
}

pub(crate) fn calculate_backoff_delay(retry_count: u32) -> u64 {
	let delay = BASE_RETRY_DELAY_SECS as f64 * RETRY_FACTOR.powi(retry_count as i32 - 1);
	(delay as u64).min(MAX_RETRY_DELAY_SECS)
}
