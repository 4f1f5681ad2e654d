// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background job scheduler for Tally server.
//!
//! Runs periodic jobs (salt rotation) and delayed one-shot jobs (deferred
//! event deletion) with retry and cooperative cancellation.

pub mod context;
pub mod error;
pub mod job;
pub mod scheduler;
pub mod types;

pub use context::{CancellationToken, JobContext};
pub use error::{JobError, Result};
pub use job::Job;
pub use scheduler::JobScheduler;
pub use types::{JobOutput, TriggerSource};
