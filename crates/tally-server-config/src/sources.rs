// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and environment
//! variables.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, EventsConfigLayer, JobsConfigLayer, LogFormat, LoggingConfigLayer,
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/tally/server.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(DEFAULT_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: TALLY_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()?),
			logging: Some(load_logging_from_env()?),
			events: Some(load_events_from_env()?),
			jobs: Some(load_jobs_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {} value '{v}'", std::any::type_name::<T>()),
		}),
		None => Ok(None),
	}
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("TALLY_SERVER_DATABASE_URL"),
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("TALLY_SERVER_LOGGING_FORMAT") {
		Some(v) => Some(LogFormat::from_str(&v).map_err(|message| ConfigError::InvalidValue {
			key: "TALLY_SERVER_LOGGING_FORMAT".to_string(),
			message,
		})?),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("TALLY_SERVER_LOGGING_LEVEL"),
		format,
	})
}

fn load_events_from_env() -> Result<EventsConfigLayer, ConfigError> {
	Ok(EventsConfigLayer {
		buffer_capacity: env_parse("TALLY_SERVER_EVENTS_BUFFER_CAPACITY")?,
		buffer_initial_capacity: env_parse("TALLY_SERVER_EVENTS_BUFFER_INITIAL_CAPACITY")?,
		flush_interval_ms: env_parse("TALLY_SERVER_EVENTS_FLUSH_INTERVAL_MS")?,
		shutdown_flush_interval_ms: env_parse("TALLY_SERVER_EVENTS_SHUTDOWN_FLUSH_INTERVAL_MS")?,
		shutdown_drain_timeout_ms: env_parse("TALLY_SERVER_EVENTS_SHUTDOWN_DRAIN_TIMEOUT_MS")?,
		write_chunk_size: env_parse("TALLY_SERVER_EVENTS_WRITE_CHUNK_SIZE")?,
		salt_refresh_interval_secs: env_parse("TALLY_SERVER_EVENTS_SALT_REFRESH_INTERVAL_SECS")?,
		analytics_cache_ttl_secs: env_parse("TALLY_SERVER_EVENTS_ANALYTICS_CACHE_TTL_SECS")?,
		analytics_query_concurrency: env_parse(
			"TALLY_SERVER_EVENTS_ANALYTICS_QUERY_CONCURRENCY",
		)?,
		analytics_top_limit: env_parse("TALLY_SERVER_EVENTS_ANALYTICS_TOP_LIMIT")?,
		analytics_window_days: env_parse("TALLY_SERVER_EVENTS_ANALYTICS_WINDOW_DAYS")?,
	})
}

fn load_jobs_from_env() -> Result<JobsConfigLayer, ConfigError> {
	Ok(JobsConfigLayer {
		salt_rotation_interval_secs: env_parse("TALLY_SERVER_JOBS_SALT_ROTATION_INTERVAL_SECS")?,
		deletion_delay_secs: env_parse("TALLY_SERVER_JOBS_DELETION_DELAY_SECS")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.database.is_none());
		assert!(layer.events.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/server.toml").load().unwrap();
		assert!(layer.events.is_none());
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[events\nbuffer_capacity = ").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_env_parse_rejects_garbage() {
		std::env::set_var("TALLY_SERVER_TEST_ENV_PARSE_GARBAGE", "lots");
		let err = env_parse::<u64>("TALLY_SERVER_TEST_ENV_PARSE_GARBAGE").unwrap_err();
		assert!(err.to_string().contains("TALLY_SERVER_TEST_ENV_PARSE_GARBAGE"));
	}

	#[test]
	fn test_env_parse_ignores_empty_values() {
		std::env::set_var("TALLY_SERVER_TEST_ENV_PARSE_EMPTY", "");
		assert_eq!(
			env_parse::<u64>("TALLY_SERVER_TEST_ENV_PARSE_EMPTY").unwrap(),
			None
		);
	}
}
