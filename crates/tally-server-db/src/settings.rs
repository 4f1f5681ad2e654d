// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Named settings: one JSON value per key.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::{DbError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Setting<T> {
	pub key: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub value: T,
}

#[derive(sqlx::FromRow)]
struct SettingRow {
	key: String,
	created_at: String,
	updated_at: String,
	value: String,
}

fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("invalid {field}: {e}")))
}

#[derive(Clone)]
pub struct SettingsRepository {
	pool: SqlitePool,
}

impl SettingsRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Returns `DbError::NotFound` when the key was never set.
	#[instrument(skip(self))]
	pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Setting<T>> {
		let row = sqlx::query_as::<_, SettingRow>(
			r#"
			SELECT key, created_at, updated_at, value
			FROM settings
			WHERE key = ?
			"#,
		)
		.bind(key)
		.fetch_optional(&self.pool)
		.await?
		.ok_or_else(|| DbError::NotFound(format!("setting {key}")))?;

		Ok(Setting {
			created_at: parse_time("created_at", &row.created_at)?,
			updated_at: parse_time("updated_at", &row.updated_at)?,
			value: serde_json::from_str(&row.value)?,
			key: row.key,
		})
	}

	/// Creates or replaces the value stored under `key`.
	#[instrument(skip(self, value))]
	pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
		let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
		let value = serde_json::to_string(value)?;

		sqlx::query(
			r#"
			INSERT INTO settings (key, created_at, updated_at, value)
			VALUES (?, ?, ?, ?)
			ON CONFLICT(key) DO UPDATE SET
				updated_at = excluded.updated_at,
				value = excluded.value
			"#,
		)
		.bind(key)
		.bind(&now)
		.bind(&now)
		.bind(value)
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}
