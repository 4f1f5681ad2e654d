// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Jobs configuration section.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct JobsConfigLayer {
	#[serde(default)]
	pub salt_rotation_interval_secs: Option<u64>,
	#[serde(default)]
	pub deletion_delay_secs: Option<u64>,
}

impl JobsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.salt_rotation_interval_secs.is_some() {
			self.salt_rotation_interval_secs = other.salt_rotation_interval_secs;
		}
		if other.deletion_delay_secs.is_some() {
			self.deletion_delay_secs = other.deletion_delay_secs;
		}
	}

	pub fn finalize(self) -> JobsConfig {
		let defaults = JobsConfig::default();
		JobsConfig {
			salt_rotation_interval_secs: self
				.salt_rotation_interval_secs
				.unwrap_or(defaults.salt_rotation_interval_secs),
			deletion_delay_secs: self
				.deletion_delay_secs
				.unwrap_or(defaults.deletion_delay_secs),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobsConfig {
	pub salt_rotation_interval_secs: u64,
	/// Delay between a website or organization being deleted and its
	/// events being removed.
	pub deletion_delay_secs: u64,
}

impl JobsConfig {
	pub fn salt_rotation_interval(&self) -> Duration {
		Duration::from_secs(self.salt_rotation_interval_secs)
	}

	pub fn deletion_delay(&self) -> Duration {
		Duration::from_secs(self.deletion_delay_secs)
	}
}

impl Default for JobsConfig {
	fn default() -> Self {
		Self {
			salt_rotation_interval_secs: 86400, // 24 hours
			deletion_delay_secs: 600,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layer_finalize_defaults() {
		let config = JobsConfigLayer::default().finalize();
		assert_eq!(config, JobsConfig::default());
		assert_eq!(config.deletion_delay(), Duration::from_secs(600));
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = JobsConfigLayer {
			salt_rotation_interval_secs: Some(3600),
			deletion_delay_secs: Some(60),
		};
		base.merge(JobsConfigLayer {
			salt_rotation_interval_secs: None,
			deletion_delay_secs: Some(5),
		});
		assert_eq!(base.salt_rotation_interval_secs, Some(3600));
		assert_eq!(base.deletion_delay_secs, Some(5));
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let layer: JobsConfigLayer = toml::from_str("deletion_delay_secs = 30").unwrap();
		assert_eq!(layer.deletion_delay_secs, Some(30));
		assert!(layer.salt_rotation_interval_secs.is_none());
	}
}
