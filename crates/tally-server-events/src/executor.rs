// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::future::Future;

use tokio_util::task::TaskTracker;
use tracing::debug;

/// Runs fire-and-forget work off the caller's path.
///
/// Submitted futures own their error handling: nothing is returned to the
/// submitter. [`BackgroundExecutor::drain`] waits for everything submitted
/// so far, which is how shutdown makes sure tracked events reach the buffer
/// before the final flush.
#[derive(Clone, Default)]
pub struct BackgroundExecutor {
	tracker: TaskTracker,
}

impl BackgroundExecutor {
	pub fn new() -> Self {
		Self {
			tracker: TaskTracker::new(),
		}
	}

	pub fn submit<F>(&self, task: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		self.tracker.spawn(task);
	}

	/// Number of submitted tasks still running.
	pub fn in_flight(&self) -> usize {
		self.tracker.len()
	}

	pub async fn drain(&self) {
		self.tracker.close();
		self.tracker.wait().await;
		debug!("background executor drained");
	}
}
