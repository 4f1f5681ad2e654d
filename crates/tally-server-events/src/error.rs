// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the events server.

use thiserror::Error;

/// Errors that can occur in the events server.
#[derive(Debug, Error)]
pub enum EventsServerError {
	/// Database error
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	/// Settings or pool error
	#[error("db error: {0}")]
	Db(#[from] tally_server_db::DbError),

	/// Stored row could not be decoded
	#[error("invalid event data: {0}")]
	InvalidData(String),

	/// JSON serialization error
	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),

	/// Core error
	#[error("events core error: {0}")]
	Core(#[from] tally_events_core::EventsError),
}

/// Result type for events server operations.
pub type Result<T> = std::result::Result<T, EventsServerError>;
