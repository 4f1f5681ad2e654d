// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bulk persistence of event batches.

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, instrument};

use tally_events_core::Event;

use crate::error::Result;

pub const DEFAULT_CHUNK_SIZE: usize = 25_000;

/// SQLite's default ceiling on bound parameters per statement.
const SQLITE_MAX_VARIABLES: usize = 32_766;

const EVENT_COLUMNS: usize = 12;

/// Rows bound into one multi-row `INSERT`.
pub const ROWS_PER_STATEMENT: usize = SQLITE_MAX_VARIABLES / EVENT_COLUMNS;

const INSERT_PREFIX: &str = "INSERT INTO events (time, type, data, website_id, anonymous_id, order_id, newsletter_id, path, country, browser, operating_system, referrer) ";

/// Persists a batch of events atomically.
#[async_trait]
pub trait EventWriter: Send + Sync {
	async fn write_batch(&self, events: &[Event]) -> Result<()>;
}

/// An event in its storage encoding, one field per `events` column.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
	pub time: String,
	pub event_type: i64,
	pub data: String,
	pub website_id: String,
	pub anonymous_id: Option<String>,
	pub order_id: Option<String>,
	pub newsletter_id: Option<String>,
	pub path: Option<String>,
	pub country: Option<String>,
	pub browser: Option<i64>,
	pub operating_system: Option<i64>,
	pub referrer: Option<String>,
}

impl From<&Event> for EventRow {
	fn from(event: &Event) -> Self {
		Self {
			time: event.time.to_rfc3339_opts(SecondsFormat::Millis, true),
			event_type: event.event_type().code(),
			data: event.data.to_json().to_string(),
			website_id: event.website_id.to_string(),
			anonymous_id: event.anonymous_id.map(|id| id.to_string()),
			order_id: event.order_id.map(|id| id.to_string()),
			newsletter_id: event.newsletter_id.map(|id| id.to_string()),
			path: event.path.clone(),
			country: event.country.clone(),
			browser: event.browser.map(|b| b.code()),
			operating_system: event.operating_system.map(|os| os.code()),
			referrer: event.referrer.clone(),
		}
	}
}

fn insert_rows(events: &[Event]) -> QueryBuilder<'static, Sqlite> {
	let mut builder = QueryBuilder::new(INSERT_PREFIX);
	builder.push_values(events.iter().map(EventRow::from), |mut row, event| {
		row.push_bind(event.time)
			.push_bind(event.event_type)
			.push_bind(event.data)
			.push_bind(event.website_id)
			.push_bind(event.anonymous_id)
			.push_bind(event.order_id)
			.push_bind(event.newsletter_id)
			.push_bind(event.path)
			.push_bind(event.country)
			.push_bind(event.browser)
			.push_bind(event.operating_system)
			.push_bind(event.referrer);
	});
	builder
}

/// Writes batches in fixed-size chunks, all inside one transaction.
///
/// Each chunk is inserted with multi-row `VALUES` statements of at most
/// [`ROWS_PER_STATEMENT`] rows.
#[derive(Clone)]
pub struct SqliteEventWriter {
	pool: SqlitePool,
	chunk_size: usize,
}

impl SqliteEventWriter {
	pub fn new(pool: SqlitePool, chunk_size: usize) -> Self {
		Self {
			pool,
			chunk_size: chunk_size.max(1),
		}
	}
}

#[async_trait]
impl EventWriter for SqliteEventWriter {
	#[instrument(skip(self, events), fields(count = events.len()))]
	async fn write_batch(&self, events: &[Event]) -> Result<()> {
		if events.is_empty() {
			return Ok(());
		}

		let mut tx = self.pool.begin().await?;

		for chunk in events.chunks(self.chunk_size) {
			for rows in chunk.chunks(ROWS_PER_STATEMENT) {
				insert_rows(rows).build().execute(&mut *tx).await?;
			}
			debug!(rows = chunk.len(), "event chunk inserted");
		}

		tx.commit().await?;
		Ok(())
	}
}
