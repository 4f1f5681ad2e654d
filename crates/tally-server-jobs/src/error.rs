// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
	#[error("job failed: {message}")]
	Failed { message: String, retryable: bool },

	#[error("job cancelled")]
	Cancelled,
}

pub type Result<T> = std::result::Result<T, JobError>;
