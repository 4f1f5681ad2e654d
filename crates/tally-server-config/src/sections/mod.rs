// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each has a resolved `*Config` and a partial
//! `*ConfigLayer` used while merging sources.

mod database;
mod events;
mod jobs;
mod logging;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use events::{EventsConfig, EventsConfigLayer};
pub use jobs::{JobsConfig, JobsConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
