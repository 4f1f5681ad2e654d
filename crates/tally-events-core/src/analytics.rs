// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Aggregate types returned by the analytics read path.

use chrono::{DateTime, Duration, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::dimensions::{Browser, OperatingSystem};

/// Label shown instead of an empty referrer.
pub const DIRECT_REFERRER_LABEL: &str = "(direct)";

/// A label with the number of visitors seen for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
	pub label: String,
	pub count: i64,
}

impl Counter {
	pub fn new(label: impl Into<String>, count: i64) -> Self {
		Self {
			label: label.into(),
			count,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCounter {
	#[serde(rename = "label")]
	pub browser: Browser,
	pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSystemCounter {
	#[serde(rename = "label")]
	pub operating_system: OperatingSystem,
	pub count: i64,
}

/// Page views and visitors for one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyVisits {
	/// UTC midnight
	pub day: DateTime<Utc>,
	pub page_views: i64,
	pub visitors: i64,
}

/// Bounds of an analytics query, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalyticsWindow {
	pub from: DateTime<Utc>,
	pub to: DateTime<Utc>,
}

impl AnalyticsWindow {
	/// The last `days` UTC days, today included.
	///
	/// `from` is midnight `days - 1` days ago and `to` is the last millisecond
	/// of today, so the window always covers exactly `days` calendar days.
	#[must_use]
	pub fn trailing_days(now: DateTime<Utc>, days: u32) -> Self {
		let days = i64::from(days.max(1));
		let today = now.date_naive();
		let from = (today - Duration::days(days - 1))
			.and_time(NaiveTime::MIN)
			.and_utc();
		let to = (today + Duration::days(1)).and_time(NaiveTime::MIN).and_utc()
			- Duration::milliseconds(1);
		Self { from, to }
	}

	/// Number of calendar days covered.
	#[must_use]
	pub fn days(&self) -> i64 {
		(self.to.date_naive() - self.from.date_naive()).num_days() + 1
	}
}

/// Everything the website dashboard shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsData {
	pub total_page_views: i64,
	/// Per day, labelled with the RFC 3339 UTC midnight
	pub page_views: Vec<Counter>,
	pub total_visitors: i64,
	pub visitors: Vec<Counter>,
	pub pages: Vec<Counter>,
	pub referrers: Vec<Counter>,
	pub countries: Vec<Counter>,
	pub browsers: Vec<BrowserCounter>,
	pub oses: Vec<OperatingSystemCounter>,
	pub new_subscribers: i64,
}

impl AnalyticsData {
	/// Splits the daily series into the page view and visitor series and
	/// their totals.
	pub fn set_daily(&mut self, daily: &[DailyVisits]) {
		self.page_views = Vec::with_capacity(daily.len());
		self.visitors = Vec::with_capacity(daily.len());
		self.total_page_views = 0;
		self.total_visitors = 0;

		for entry in daily {
			let label = entry.day.to_rfc3339_opts(SecondsFormat::Secs, true);
			self.total_page_views += entry.page_views;
			self.total_visitors += entry.visitors;
			self.page_views.push(Counter::new(label.clone(), entry.page_views));
			self.visitors.push(Counter::new(label, entry.visitors));
		}
	}

	/// Rewrites the empty referrer label to [`DIRECT_REFERRER_LABEL`].
	///
	/// Only the first empty label is rewritten; there can be at most one.
	pub fn set_referrers(&mut self, mut referrers: Vec<Counter>) {
		if let Some(direct) = referrers.iter_mut().find(|c| c.label.is_empty()) {
			direct.label = DIRECT_REFERRER_LABEL.to_string();
		}
		self.referrers = referrers;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn test_trailing_days_covers_whole_days() {
		let now = Utc.with_ymd_and_hms(2025, 3, 15, 17, 42, 3).unwrap();
		let window = AnalyticsWindow::trailing_days(now, 30);

		assert_eq!(window.from, Utc.with_ymd_and_hms(2025, 2, 14, 0, 0, 0).unwrap());
		assert_eq!(
			window.to,
			Utc.with_ymd_and_hms(2025, 3, 16, 0, 0, 0).unwrap() - Duration::milliseconds(1)
		);
		assert_eq!(window.days(), 30);
	}

	#[test]
	fn test_trailing_single_day() {
		let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
		let window = AnalyticsWindow::trailing_days(now, 1);
		assert_eq!(window.from, now);
		assert_eq!(window.days(), 1);
	}

	#[test]
	fn test_set_daily_totals() {
		let day = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
		let daily = vec![
			DailyVisits {
				day,
				page_views: 10,
				visitors: 4,
			},
			DailyVisits {
				day: day + Duration::days(1),
				page_views: 0,
				visitors: 0,
			},
		];

		let mut data = AnalyticsData::default();
		data.set_daily(&daily);

		assert_eq!(data.total_page_views, 10);
		assert_eq!(data.total_visitors, 4);
		assert_eq!(data.page_views[0].label, "2025-03-01T00:00:00Z");
		assert_eq!(data.visitors[1], Counter::new("2025-03-02T00:00:00Z", 0));
	}

	#[test]
	fn test_dimension_counters_serialize_as_labels() {
		let counter = BrowserCounter {
			browser: Browser::SamsungInternet,
			count: 3,
		};
		assert_eq!(
			serde_json::to_value(&counter).unwrap(),
			serde_json::json!({ "label": "Samsung Internet", "count": 3 })
		);
	}

	#[test]
	fn test_empty_referrer_becomes_direct() {
		let mut data = AnalyticsData::default();
		data.set_referrers(vec![
			Counter::new("news.ycombinator.com", 12),
			Counter::new("", 7),
		]);
		assert_eq!(data.referrers[1].label, DIRECT_REFERRER_LABEL);
		assert_eq!(data.referrers[0].label, "news.ycombinator.com");
	}
}
