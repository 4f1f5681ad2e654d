// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event pipeline configuration: buffering, flushing, salt refresh and the
//! analytics read path.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub struct EventsConfig {
	/// Events held in memory at most; further events are dropped.
	pub buffer_capacity: usize,
	pub buffer_initial_capacity: usize,
	pub flush_interval_ms: u64,
	pub shutdown_flush_interval_ms: u64,
	/// How long shutdown waits for the buffer to drain.
	pub shutdown_drain_timeout_ms: u64,
	/// Rows per INSERT statement.
	pub write_chunk_size: usize,
	pub salt_refresh_interval_secs: u64,
	pub analytics_cache_ttl_secs: u64,
	pub analytics_query_concurrency: usize,
	pub analytics_top_limit: i64,
	pub analytics_window_days: u32,
}

impl Default for EventsConfig {
	fn default() -> Self {
		Self {
			buffer_capacity: 5_000_000,
			buffer_initial_capacity: 50_000,
			flush_interval_ms: 50,
			shutdown_flush_interval_ms: 20,
			shutdown_drain_timeout_ms: 10_000,
			write_chunk_size: 25_000,
			salt_refresh_interval_secs: 10,
			analytics_cache_ttl_secs: 120,
			analytics_query_concurrency: 3,
			analytics_top_limit: 10,
			analytics_window_days: 30,
		}
	}
}

impl EventsConfig {
	pub fn flush_interval(&self) -> Duration {
		Duration::from_millis(self.flush_interval_ms)
	}

	pub fn shutdown_flush_interval(&self) -> Duration {
		Duration::from_millis(self.shutdown_flush_interval_ms)
	}

	pub fn shutdown_drain_timeout(&self) -> Duration {
		Duration::from_millis(self.shutdown_drain_timeout_ms)
	}

	pub fn salt_refresh_interval(&self) -> Duration {
		Duration::from_secs(self.salt_refresh_interval_secs)
	}

	pub fn analytics_cache_ttl(&self) -> Duration {
		Duration::from_secs(self.analytics_cache_ttl_secs)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		let positive = [
			("events.buffer_capacity", self.buffer_capacity as u64),
			("events.write_chunk_size", self.write_chunk_size as u64),
			("events.flush_interval_ms", self.flush_interval_ms),
			("events.shutdown_flush_interval_ms", self.shutdown_flush_interval_ms),
			("events.salt_refresh_interval_secs", self.salt_refresh_interval_secs),
			(
				"events.analytics_query_concurrency",
				self.analytics_query_concurrency as u64,
			),
			("events.analytics_window_days", u64::from(self.analytics_window_days)),
		];

		for (key, value) in positive {
			if value == 0 {
				return Err(ConfigError::Validation(format!("{key} must be greater than 0")));
			}
		}

		if self.buffer_initial_capacity > self.buffer_capacity {
			return Err(ConfigError::Validation(
				"events.buffer_initial_capacity must not exceed events.buffer_capacity".to_string(),
			));
		}

		Ok(())
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EventsConfigLayer {
	#[serde(default)]
	pub buffer_capacity: Option<usize>,
	#[serde(default)]
	pub buffer_initial_capacity: Option<usize>,
	#[serde(default)]
	pub flush_interval_ms: Option<u64>,
	#[serde(default)]
	pub shutdown_flush_interval_ms: Option<u64>,
	#[serde(default)]
	pub shutdown_drain_timeout_ms: Option<u64>,
	#[serde(default)]
	pub write_chunk_size: Option<usize>,
	#[serde(default)]
	pub salt_refresh_interval_secs: Option<u64>,
	#[serde(default)]
	pub analytics_cache_ttl_secs: Option<u64>,
	#[serde(default)]
	pub analytics_query_concurrency: Option<usize>,
	#[serde(default)]
	pub analytics_top_limit: Option<i64>,
	#[serde(default)]
	pub analytics_window_days: Option<u32>,
}

impl EventsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.buffer_capacity.is_some() {
			self.buffer_capacity = other.buffer_capacity;
		}
		if other.buffer_initial_capacity.is_some() {
			self.buffer_initial_capacity = other.buffer_initial_capacity;
		}
		if other.flush_interval_ms.is_some() {
			self.flush_interval_ms = other.flush_interval_ms;
		}
		if other.shutdown_flush_interval_ms.is_some() {
			self.shutdown_flush_interval_ms = other.shutdown_flush_interval_ms;
		}
		if other.shutdown_drain_timeout_ms.is_some() {
			self.shutdown_drain_timeout_ms = other.shutdown_drain_timeout_ms;
		}
		if other.write_chunk_size.is_some() {
			self.write_chunk_size = other.write_chunk_size;
		}
		if other.salt_refresh_interval_secs.is_some() {
			self.salt_refresh_interval_secs = other.salt_refresh_interval_secs;
		}
		if other.analytics_cache_ttl_secs.is_some() {
			self.analytics_cache_ttl_secs = other.analytics_cache_ttl_secs;
		}
		if other.analytics_query_concurrency.is_some() {
			self.analytics_query_concurrency = other.analytics_query_concurrency;
		}
		if other.analytics_top_limit.is_some() {
			self.analytics_top_limit = other.analytics_top_limit;
		}
		if other.analytics_window_days.is_some() {
			self.analytics_window_days = other.analytics_window_days;
		}
	}

	pub fn finalize(self) -> EventsConfig {
		let d = EventsConfig::default();
		EventsConfig {
			buffer_capacity: self.buffer_capacity.unwrap_or(d.buffer_capacity),
			buffer_initial_capacity: self
				.buffer_initial_capacity
				.unwrap_or(d.buffer_initial_capacity),
			flush_interval_ms: self.flush_interval_ms.unwrap_or(d.flush_interval_ms),
			shutdown_flush_interval_ms: self
				.shutdown_flush_interval_ms
				.unwrap_or(d.shutdown_flush_interval_ms),
			shutdown_drain_timeout_ms: self
				.shutdown_drain_timeout_ms
				.unwrap_or(d.shutdown_drain_timeout_ms),
			write_chunk_size: self.write_chunk_size.unwrap_or(d.write_chunk_size),
			salt_refresh_interval_secs: self
				.salt_refresh_interval_secs
				.unwrap_or(d.salt_refresh_interval_secs),
			analytics_cache_ttl_secs: self
				.analytics_cache_ttl_secs
				.unwrap_or(d.analytics_cache_ttl_secs),
			analytics_query_concurrency: self
				.analytics_query_concurrency
				.unwrap_or(d.analytics_query_concurrency),
			analytics_top_limit: self.analytics_top_limit.unwrap_or(d.analytics_top_limit),
			analytics_window_days: self
				.analytics_window_days
				.unwrap_or(d.analytics_window_days),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_defaults_are_valid() {
		let config = EventsConfigLayer::default().finalize();
		assert_eq!(config, EventsConfig::default());
		config.validate().unwrap();
	}

	#[test]
	fn test_zero_chunk_size_is_rejected() {
		let config = EventsConfig {
			write_chunk_size: 0,
			..Default::default()
		};
		let err = config.validate().unwrap_err();
		assert!(err.to_string().contains("events.write_chunk_size"));
	}

	#[test]
	fn test_initial_capacity_above_capacity_is_rejected() {
		let config = EventsConfig {
			buffer_capacity: 10,
			buffer_initial_capacity: 11,
			..Default::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_durations() {
		let config = EventsConfig::default();
		assert_eq!(config.flush_interval(), Duration::from_millis(50));
		assert_eq!(config.shutdown_drain_timeout(), Duration::from_secs(10));
		assert_eq!(config.analytics_cache_ttl(), Duration::from_secs(120));
	}

	proptest! {
		#[test]
		fn merge_prefers_set_values(
			base in proptest::option::of(1usize..1_000_000),
			overlay in proptest::option::of(1usize..1_000_000),
		) {
			let mut layer = EventsConfigLayer {
				buffer_capacity: base,
				..Default::default()
			};
			layer.merge(EventsConfigLayer {
				buffer_capacity: overlay,
				..Default::default()
			});
			prop_assert_eq!(layer.buffer_capacity, overlay.or(base));
		}
	}
}
