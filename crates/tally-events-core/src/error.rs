// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the events system.

use thiserror::Error;

/// Errors that can occur in the events core.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventsError {
	/// Unknown event type name or storage code
	#[error("invalid event type: {0}")]
	InvalidEventType(String),

	/// Unknown browser name or storage code
	#[error("invalid browser: {0}")]
	InvalidBrowser(String),

	/// Unknown operating system name or storage code
	#[error("invalid operating system: {0}")]
	InvalidOperatingSystem(String),

	/// Anonymous ID could not be parsed
	#[error("invalid anonymous ID: {0}")]
	InvalidAnonymousId(String),

	/// Event failed validation and must not be buffered
	#[error("invalid event: {0}")]
	InvalidEvent(String),

	/// Bot fingerprint matcher could not be built
	#[error("invalid bot fingerprints: {0}")]
	BotFingerprints(String),
}

/// Result type for events core operations.
pub type Result<T> = std::result::Result<T, EventsError>;
