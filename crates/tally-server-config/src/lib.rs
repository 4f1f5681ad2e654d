// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for Tally server.
//!
//! Configuration is layered from built-in defaults, an optional TOML file
//! and `TALLY_SERVER_*` environment variables, in increasing precedence.
//!
//! # Usage
//!
//! ```ignore
//! use tally_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Buffering up to {} events", config.events.buffer_capacity);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, DEFAULT_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub events: EventsConfig,
	pub jobs: JobsConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`TALLY_SERVER_*`)
/// 2. Config file (`/etc/tally/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolve a merged layer, filling defaults and validating the result.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let events = layer.events.unwrap_or_default().finalize();
	let jobs = layer.jobs.unwrap_or_default().finalize();

	validate_config(&events, &jobs)?;

	info!(
		database = %database.url,
		buffer_capacity = events.buffer_capacity,
		flush_interval_ms = events.flush_interval_ms,
		salt_rotation_interval_secs = jobs.salt_rotation_interval_secs,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		logging,
		events,
		jobs,
	})
}

fn validate_config(events: &EventsConfig, jobs: &JobsConfig) -> Result<(), ConfigError> {
	events.validate()?;

	if jobs.salt_rotation_interval_secs == 0 {
		return Err(ConfigError::Validation(
			"jobs.salt_rotation_interval_secs must be greater than 0".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_finalize_empty_layer_uses_defaults() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.database.url, "sqlite:./tally.db");
		assert_eq!(config.events, EventsConfig::default());
		assert_eq!(config.jobs, JobsConfig::default());
	}

	#[test]
	fn test_zero_rotation_interval_is_rejected() {
		let layer = ServerConfigLayer {
			jobs: Some(JobsConfigLayer {
				salt_rotation_interval_secs: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_file_overrides_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[events]
buffer_capacity = 1000
buffer_initial_capacity = 100
analytics_window_days = 7

[jobs]
deletion_delay_secs = 60
"#
		)
		.unwrap();

		let mut merged = DefaultsSource.load().unwrap();
		merged.merge(TomlSource::new(file.path()).load().unwrap());
		let config = finalize(merged).unwrap();

		assert_eq!(config.events.buffer_capacity, 1000);
		assert_eq!(config.events.analytics_window_days, 7);
		assert_eq!(config.events.write_chunk_size, 25_000);
		assert_eq!(config.jobs.deletion_delay_secs, 60);
	}
}
