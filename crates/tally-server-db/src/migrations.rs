// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::SqlitePool;

use crate::error::Result;

const MIGRATIONS: &[(&str, &str)] = &[
	(
		"001_create_events",
		include_str!("../migrations/001_create_events.sql"),
	),
	(
		"002_create_settings",
		include_str!("../migrations/002_create_settings.sql"),
	),
	(
		"003_create_websites",
		include_str!("../migrations/003_create_websites.sql"),
	),
];

/// Run all database migrations.
///
/// Migrations are idempotent - safe to run multiple times.
///
/// # Errors
/// Returns `DbError::Sqlx` if a statement fails.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	for (name, sql) in MIGRATIONS {
		for stmt in sql.split(';').filter(|s| !s.trim().is_empty()) {
			sqlx::query(stmt).execute(pool).await?;
		}
		tracing::debug!(migration = %name, "migration applied");
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	#[tokio::test]
	async fn test_migrations_are_idempotent() {
		let pool = create_test_pool().await;
		run_migrations(&pool).await.unwrap();
		run_migrations(&pool).await.unwrap();

		let tables: Vec<(String,)> = sqlx::query_as(
			"SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
		)
		.fetch_all(&pool)
		.await
		.unwrap();
		let names: Vec<_> = tables.into_iter().map(|(n,)| n).collect();
		assert_eq!(names, vec!["events", "settings", "websites"]);
	}
}
