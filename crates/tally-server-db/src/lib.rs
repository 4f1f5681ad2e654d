// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite storage for Tally: pool setup, schema migrations and the named
//! settings table.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod settings;
pub mod testing;

pub use error::{DbError, Result};
pub use migrations::run_migrations;
pub use pool::create_pool;
pub use settings::{Setting, SettingsRepository};
