// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

/// In-memory pool with the schema applied.
///
/// Every connection to `:memory:` opens its own database, so the pool is
/// pinned to a single connection that never expires.
pub async fn create_test_pool() -> SqlitePool {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect("sqlite::memory:")
		.await
		.unwrap();
	crate::run_migrations(&pool).await.unwrap();
	pool
}

pub async fn insert_website(pool: &SqlitePool, website_id: Uuid, organization_id: Uuid) {
	sqlx::query("INSERT INTO websites (id, organization_id) VALUES (?, ?)")
		.bind(website_id.to_string())
		.bind(organization_id.to_string())
		.execute(pool)
		.await
		.unwrap();
}
