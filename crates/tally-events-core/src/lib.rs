// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Tally web analytics.
//!
//! This crate holds everything in the event pipeline that does not touch I/O:
//!
//! - [`Event`] and its typed [`EventData`] payload
//! - [`Browser`] / [`OperatingSystem`] dimensions and their storage codes
//! - [`AnonymousId`] fingerprinting from (website, IP, user-agent, salt)
//! - [`BotFilter`] user-agent classification
//! - [`cleanup_referrer`] normalization of referrer headers
//! - aggregate result types returned by the analytics read path

pub mod analytics;
pub mod dimensions;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod referrer;
pub mod useragent;

pub use analytics::{
	AnalyticsData, AnalyticsWindow, BrowserCounter, Counter, DailyVisits, OperatingSystemCounter,
	DIRECT_REFERRER_LABEL,
};
pub use dimensions::{Browser, OperatingSystem};
pub use error::{EventsError, Result};
pub use event::{clean_custom_event_name, Event, EventData, EventType, CUSTOM_EVENT_NAME_MAX_SIZE};
pub use fingerprint::{anonymous_id, AnonymousId};
pub use referrer::cleanup_referrer;
pub use useragent::{BotFilter, UserAgentClass, BOT_FINGERPRINTS, MAX_USER_AGENT_LENGTH};
