// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event types for the telemetry pipeline.
//!
//! An [`Event`] is immutable once built. Its type is derived from the
//! [`EventData`] variant so a payload can never disagree with its type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::dimensions::{Browser, OperatingSystem};
use crate::error::{EventsError, Result};
use crate::fingerprint::AnonymousId;

/// Custom event names longer than this are truncated.
pub const CUSTOM_EVENT_NAME_MAX_SIZE: usize = 42;

/// The fixed set of event types.
///
/// Discriminants are the storage codes and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
	PageView = 0,
	Custom = 1,
	SubscribedToNewsletter = 2,
	UnsubscribedFromNewsletter = 3,
	EmailSent = 4,
	OrderPlaced = 5,
	OrderCanceled = 6,
	OrderCompleted = 7,
}

impl EventType {
	pub const ALL: [EventType; 8] = [
		EventType::PageView,
		EventType::Custom,
		EventType::SubscribedToNewsletter,
		EventType::UnsubscribedFromNewsletter,
		EventType::EmailSent,
		EventType::OrderPlaced,
		EventType::OrderCanceled,
		EventType::OrderCompleted,
	];

	/// Integer code stored in the `events.type` column.
	#[must_use]
	pub fn code(self) -> i64 {
		self as i64
	}

	pub fn from_code(code: i64) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|t| t.code() == code)
			.ok_or_else(|| EventsError::InvalidEventType(code.to_string()))
	}
}

impl std::fmt::Display for EventType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			EventType::PageView => write!(f, "page_view"),
			EventType::Custom => write!(f, "custom"),
			EventType::SubscribedToNewsletter => write!(f, "subscribed_to_newsletter"),
			EventType::UnsubscribedFromNewsletter => write!(f, "unsubscribed_from_newsletter"),
			EventType::EmailSent => write!(f, "email_sent"),
			EventType::OrderPlaced => write!(f, "order_placed"),
			EventType::OrderCanceled => write!(f, "order_canceled"),
			EventType::OrderCompleted => write!(f, "order_completed"),
		}
	}
}

impl std::str::FromStr for EventType {
	type Err = EventsError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"page_view" => Ok(EventType::PageView),
			"custom" => Ok(EventType::Custom),
			"subscribed_to_newsletter" => Ok(EventType::SubscribedToNewsletter),
			"unsubscribed_from_newsletter" => Ok(EventType::UnsubscribedFromNewsletter),
			"email_sent" => Ok(EventType::EmailSent),
			"order_placed" => Ok(EventType::OrderPlaced),
			"order_canceled" => Ok(EventType::OrderCanceled),
			"order_completed" => Ok(EventType::OrderCompleted),
			_ => Err(EventsError::InvalidEventType(s.to_string())),
		}
	}
}

/// Type-tagged payload of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
	PageView,
	Custom { event_name: String },
	SubscribedToNewsletter,
	UnsubscribedFromNewsletter,
	EmailSent { from_address: String, to_address: String },
	OrderPlaced,
	OrderCanceled,
	OrderCompleted { total_amount: i64 },
}

impl EventData {
	#[must_use]
	pub fn event_type(&self) -> EventType {
		match self {
			EventData::PageView => EventType::PageView,
			EventData::Custom { .. } => EventType::Custom,
			EventData::SubscribedToNewsletter => EventType::SubscribedToNewsletter,
			EventData::UnsubscribedFromNewsletter => EventType::UnsubscribedFromNewsletter,
			EventData::EmailSent { .. } => EventType::EmailSent,
			EventData::OrderPlaced => EventType::OrderPlaced,
			EventData::OrderCanceled => EventType::OrderCanceled,
			EventData::OrderCompleted { .. } => EventType::OrderCompleted,
		}
	}

	/// JSON document stored in the `events.data` column.
	#[must_use]
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			EventData::Custom { event_name } => json!({ "event_name": event_name }),
			EventData::EmailSent {
				from_address,
				to_address,
			} => json!({ "from_address": from_address, "to_address": to_address }),
			EventData::OrderCompleted { total_amount } => json!({ "total_amount": total_amount }),
			EventData::PageView
			| EventData::SubscribedToNewsletter
			| EventData::UnsubscribedFromNewsletter
			| EventData::OrderPlaced
			| EventData::OrderCanceled => json!({}),
		}
	}
}

/// A single tracked occurrence, scoped to one website.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
	pub time: DateTime<Utc>,
	pub data: EventData,

	pub path: Option<String>,
	/// ISO country code
	pub country: Option<String>,
	pub browser: Option<Browser>,
	pub operating_system: Option<OperatingSystem>,
	/// Bare hostname, empty for direct traffic
	pub referrer: Option<String>,

	pub website_id: Uuid,
	/// Only set for page views
	pub anonymous_id: Option<AnonymousId>,
	pub order_id: Option<Uuid>,
	pub newsletter_id: Option<Uuid>,
}

impl Event {
	/// Creates an event occurring now with no optional dimensions set.
	#[must_use]
	pub fn new(website_id: Uuid, data: EventData) -> Self {
		Self {
			time: Utc::now(),
			data,
			path: None,
			country: None,
			browser: None,
			operating_system: None,
			referrer: None,
			website_id,
			anonymous_id: None,
			order_id: None,
			newsletter_id: None,
		}
	}

	#[must_use]
	pub fn event_type(&self) -> EventType {
		self.data.event_type()
	}

	/// Checks the invariants an event must hold before it may be buffered.
	pub fn validate(&self) -> Result<()> {
		if self.website_id.is_nil() {
			return Err(EventsError::InvalidEvent("website_id is empty".into()));
		}

		match &self.data {
			EventData::PageView => {
				if self.path.as_deref().map_or(true, str::is_empty) {
					return Err(EventsError::InvalidEvent("page view path is empty".into()));
				}
				if self.anonymous_id.is_none() {
					return Err(EventsError::InvalidEvent(
						"page view has no anonymous_id".into(),
					));
				}
			}
			EventData::Custom { event_name } if event_name.is_empty() => {
				return Err(EventsError::InvalidEvent("event_name is empty".into()));
			}
			EventData::EmailSent { from_address, .. } if from_address.is_empty() => {
				return Err(EventsError::InvalidEvent("from_address is empty".into()));
			}
			EventData::EmailSent { to_address, .. } if to_address.is_empty() => {
				return Err(EventsError::InvalidEvent("to_address is empty".into()));
			}
			_ => {}
		}

		Ok(())
	}
}

/// Truncates a custom event name to [`CUSTOM_EVENT_NAME_MAX_SIZE`] bytes,
/// appending `...` when something was cut.
#[must_use]
pub fn clean_custom_event_name(event_name: &str) -> String {
	if event_name.len() <= CUSTOM_EVENT_NAME_MAX_SIZE {
		return event_name.to_string();
	}

	let mut end = CUSTOM_EVENT_NAME_MAX_SIZE;
	while !event_name.is_char_boundary(end) {
		end -= 1;
	}
	format!("{}...", &event_name[..end])
}
