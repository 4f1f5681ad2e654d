// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository layer for event aggregates and bulk deletion.
//!
//! Distinct visitors are counted by grouping on (label, anonymous_id) and
//! then counting groups per label, never with `COUNT(DISTINCT ...)`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::instrument;
use uuid::Uuid;

use tally_events_core::{
	AnalyticsWindow, Browser, BrowserCounter, Counter, DailyVisits, EventType, OperatingSystem,
	OperatingSystemCounter,
};

use crate::error::{EventsServerError, Result};

/// Repository trait for event storage queries.
#[async_trait]
pub trait EventsRepository: Send + Sync {
	// Dashboard aggregates
	async fn page_views_and_visitors(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
	) -> Result<Vec<DailyVisits>>;
	async fn top_pages(&self, website_id: &Uuid, window: &AnalyticsWindow, limit: i64)
		-> Result<Vec<Counter>>;
	async fn top_countries(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
		limit: i64,
	) -> Result<Vec<Counter>>;
	async fn top_referrers(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
		limit: i64,
	) -> Result<Vec<Counter>>;
	async fn top_browsers(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
		limit: i64,
	) -> Result<Vec<BrowserCounter>>;
	async fn top_oses(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
		limit: i64,
	) -> Result<Vec<OperatingSystemCounter>>;
	async fn new_subscribers_count(&self, website_id: &Uuid, window: &AnalyticsWindow)
		-> Result<i64>;

	// Billing
	async fn count_events_for_organization(
		&self,
		event_type: EventType,
		organization_id: &Uuid,
		from: DateTime<Utc>,
		to: DateTime<Utc>,
	) -> Result<i64>;

	// Deletion
	async fn delete_website_events(&self, website_id: &Uuid) -> Result<u64>;
	async fn delete_organization_events(&self, organization_id: &Uuid) -> Result<u64>;
}

/// SQLite implementation of the events repository.
#[derive(Clone)]
pub struct SqliteEventsRepository {
	pool: SqlitePool,
}

impl SqliteEventsRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

// Database row structs for mapping
#[derive(sqlx::FromRow)]
struct DailyRow {
	day: String,
	page_views: i64,
	visitors: i64,
}

impl TryFrom<DailyRow> for DailyVisits {
	type Error = EventsServerError;

	fn try_from(row: DailyRow) -> Result<Self> {
		let day = NaiveDate::parse_from_str(&row.day, "%Y-%m-%d")
			.map_err(|e| EventsServerError::InvalidData(format!("invalid day: {e}")))?;
		Ok(DailyVisits {
			day: day.and_time(NaiveTime::MIN).and_utc(),
			page_views: row.page_views,
			visitors: row.visitors,
		})
	}
}

#[derive(sqlx::FromRow)]
struct LabelRow {
	label: String,
	count: i64,
}

#[derive(sqlx::FromRow)]
struct CodeRow {
	label: i64,
	count: i64,
}

/// Dimension columns that can be ranked. Column names are only ever taken
/// from here, never from input.
#[derive(Debug, Clone, Copy)]
enum Dimension {
	Path,
	Country,
	Referrer,
	Browser,
	OperatingSystem,
}

impl Dimension {
	fn label_expr(self) -> &'static str {
		match self {
			Dimension::Path => "COALESCE(path, '')",
			Dimension::Country => "COALESCE(country, '')",
			Dimension::Referrer => "COALESCE(referrer, '')",
			Dimension::Browser => "COALESCE(browser, 0)",
			Dimension::OperatingSystem => "COALESCE(operating_system, 0)",
		}
	}

	fn top_query(self) -> String {
		format!(
			r#"
			SELECT label, COUNT(anonymous_id) AS count
			FROM (
				SELECT {} AS label, anonymous_id
				FROM events
				WHERE website_id = ? AND type = ? AND time >= ? AND time <= ?
				GROUP BY label, anonymous_id
			)
			GROUP BY label
			ORDER BY count DESC, label
			LIMIT ?
			"#,
			self.label_expr()
		)
	}
}

fn timestamp(time: &DateTime<Utc>) -> String {
	time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// SQLite treats a negative LIMIT as unbounded.
fn sql_limit(limit: i64) -> i64 {
	if limit < 1 {
		-1
	} else {
		limit
	}
}

impl SqliteEventsRepository {
	async fn top_labels(
		&self,
		dimension: Dimension,
		website_id: &Uuid,
		window: &AnalyticsWindow,
		limit: i64,
	) -> Result<Vec<Counter>> {
		let rows = sqlx::query_as::<_, LabelRow>(&dimension.top_query())
			.bind(website_id.to_string())
			.bind(EventType::PageView.code())
			.bind(timestamp(&window.from))
			.bind(timestamp(&window.to))
			.bind(sql_limit(limit))
			.fetch_all(&self.pool)
			.await?;

		Ok(rows
			.into_iter()
			.map(|row| Counter::new(row.label, row.count))
			.collect())
	}

	async fn top_codes(
		&self,
		dimension: Dimension,
		website_id: &Uuid,
		window: &AnalyticsWindow,
		limit: i64,
	) -> Result<Vec<CodeRow>> {
		let rows = sqlx::query_as::<_, CodeRow>(&dimension.top_query())
			.bind(website_id.to_string())
			.bind(EventType::PageView.code())
			.bind(timestamp(&window.from))
			.bind(timestamp(&window.to))
			.bind(sql_limit(limit))
			.fetch_all(&self.pool)
			.await?;

		Ok(rows)
	}
}

#[async_trait]
impl EventsRepository for SqliteEventsRepository {
	#[instrument(skip(self, window), fields(website_id = %website_id))]
	async fn page_views_and_visitors(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
	) -> Result<Vec<DailyVisits>> {
		let rows = sqlx::query_as::<_, DailyRow>(
			r#"
			WITH RECURSIVE days(day) AS (
				SELECT ?1
				UNION ALL
				SELECT date(day, '+1 day') FROM days WHERE day < ?2
			)
			SELECT
				days.day AS day,
				COALESCE(SUM(visits.views), 0) AS page_views,
				COUNT(visits.anonymous_id) AS visitors
			FROM days
			LEFT JOIN (
				SELECT substr(time, 1, 10) AS day, anonymous_id, COUNT(*) AS views
				FROM events
				WHERE website_id = ?3 AND type = ?4 AND time >= ?5 AND time <= ?6
				GROUP BY substr(time, 1, 10), anonymous_id
			) AS visits ON visits.day = days.day
			GROUP BY days.day
			ORDER BY days.day
			"#,
		)
		.bind(window.from.date_naive().format("%Y-%m-%d").to_string())
		.bind(window.to.date_naive().format("%Y-%m-%d").to_string())
		.bind(website_id.to_string())
		.bind(EventType::PageView.code())
		.bind(timestamp(&window.from))
		.bind(timestamp(&window.to))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self, window), fields(website_id = %website_id))]
	async fn top_pages(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
		limit: i64,
	) -> Result<Vec<Counter>> {
		self
			.top_labels(Dimension::Path, website_id, window, limit)
			.await
	}

	#[instrument(skip(self, window), fields(website_id = %website_id))]
	async fn top_countries(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
		limit: i64,
	) -> Result<Vec<Counter>> {
		self
			.top_labels(Dimension::Country, website_id, window, limit)
			.await
	}

	#[instrument(skip(self, window), fields(website_id = %website_id))]
	async fn top_referrers(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
		limit: i64,
	) -> Result<Vec<Counter>> {
		self
			.top_labels(Dimension::Referrer, website_id, window, limit)
			.await
	}

	#[instrument(skip(self, window), fields(website_id = %website_id))]
	async fn top_browsers(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
		limit: i64,
	) -> Result<Vec<BrowserCounter>> {
		self
			.top_codes(Dimension::Browser, website_id, window, limit)
			.await?
			.into_iter()
			.map(|row| {
				Ok(BrowserCounter {
					browser: Browser::from_code(row.label)?,
					count: row.count,
				})
			})
			.collect()
	}

	#[instrument(skip(self, window), fields(website_id = %website_id))]
	async fn top_oses(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
		limit: i64,
	) -> Result<Vec<OperatingSystemCounter>> {
		self
			.top_codes(Dimension::OperatingSystem, website_id, window, limit)
			.await?
			.into_iter()
			.map(|row| {
				Ok(OperatingSystemCounter {
					operating_system: OperatingSystem::from_code(row.label)?,
					count: row.count,
				})
			})
			.collect()
	}

	#[instrument(skip(self, window), fields(website_id = %website_id))]
	async fn new_subscribers_count(
		&self,
		website_id: &Uuid,
		window: &AnalyticsWindow,
	) -> Result<i64> {
		let (count,): (i64,) = sqlx::query_as(
			r#"
			SELECT COUNT(*)
			FROM events
			WHERE website_id = ? AND type = ? AND time >= ? AND time <= ?
			"#,
		)
		.bind(website_id.to_string())
		.bind(EventType::SubscribedToNewsletter.code())
		.bind(timestamp(&window.from))
		.bind(timestamp(&window.to))
		.fetch_one(&self.pool)
		.await?;

		Ok(count)
	}

	#[instrument(skip(self), fields(organization_id = %organization_id, event_type = %event_type))]
	async fn count_events_for_organization(
		&self,
		event_type: EventType,
		organization_id: &Uuid,
		from: DateTime<Utc>,
		to: DateTime<Utc>,
	) -> Result<i64> {
		let (count,): (i64,) = sqlx::query_as(
			r#"
			SELECT COUNT(*)
			FROM events
			WHERE type = ? AND time >= ? AND time <= ?
				AND website_id IN (SELECT id FROM websites WHERE organization_id = ?)
			"#,
		)
		.bind(event_type.code())
		.bind(timestamp(&from))
		.bind(timestamp(&to))
		.bind(organization_id.to_string())
		.fetch_one(&self.pool)
		.await?;

		Ok(count)
	}

	#[instrument(skip(self), fields(website_id = %website_id))]
	async fn delete_website_events(&self, website_id: &Uuid) -> Result<u64> {
		let result = sqlx::query("DELETE FROM events WHERE website_id = ?")
			.bind(website_id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}

	#[instrument(skip(self), fields(organization_id = %organization_id))]
	async fn delete_organization_events(&self, organization_id: &Uuid) -> Result<u64> {
		let result = sqlx::query(
			r#"
			DELETE FROM events
			WHERE website_id IN (SELECT id FROM websites WHERE organization_id = ?)
			"#,
		)
		.bind(organization_id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::writer::{EventWriter, SqliteEventWriter, DEFAULT_CHUNK_SIZE};
	use chrono::{Duration, TimeZone};
	use tally_events_core::{AnonymousId, Event, EventData};
	use tally_server_db::testing::{create_test_pool, insert_website};

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 3, 30, 15, 0, 0).unwrap()
	}

	fn window() -> AnalyticsWindow {
		AnalyticsWindow::trailing_days(now(), 30)
	}

	fn visitor(n: u8) -> AnonymousId {
		AnonymousId::from_bytes([n; 16])
	}

	fn page_view(website_id: Uuid, time: DateTime<Utc>, path: &str, visitor_id: u8) -> Event {
		let mut event = Event::new(website_id, EventData::PageView);
		event.time = time;
		event.path = Some(path.to_string());
		event.anonymous_id = Some(visitor(visitor_id));
		event.referrer = Some(String::new());
		event.browser = Some(Browser::Chrome);
		event.operating_system = Some(OperatingSystem::Windows);
		event.country = Some("DE".into());
		event
	}

	async fn setup() -> (SqlitePool, SqliteEventsRepository, SqliteEventWriter) {
		let pool = create_test_pool().await;
		let repo = SqliteEventsRepository::new(pool.clone());
		let writer = SqliteEventWriter::new(pool.clone(), DEFAULT_CHUNK_SIZE);
		(pool, repo, writer)
	}

	#[tokio::test]
	async fn test_daily_series_is_gap_filled() {
		let (_pool, repo, writer) = setup().await;
		let website_id = Uuid::new_v4();
		let window = window();
		let empty_days = [0i64, 3, 10, 17, 29];

		let mut events = Vec::new();
		for day in 0..30i64 {
			if empty_days.contains(&day) {
				continue;
			}
			let time = window.from + Duration::days(day) + Duration::hours(9);
			events.push(page_view(website_id, time, "/", 1));
			events.push(page_view(website_id, time, "/about", 1));
			events.push(page_view(website_id, time, "/", 2));
		}
		writer.write_batch(&events).await.unwrap();

		let daily = repo.page_views_and_visitors(&website_id, &window).await.unwrap();
		assert_eq!(daily.len(), 30);
		for (i, entry) in daily.iter().enumerate() {
			assert_eq!(entry.day, window.from + Duration::days(i as i64));
			if empty_days.contains(&(i as i64)) {
				assert_eq!(entry.page_views, 0);
				assert_eq!(entry.visitors, 0);
			} else {
				assert_eq!(entry.page_views, 3);
				assert_eq!(entry.visitors, 2);
			}
		}
	}

	#[tokio::test]
	async fn test_daily_series_ignores_other_websites_and_types() {
		let (_pool, repo, writer) = setup().await;
		let website_id = Uuid::new_v4();
		let time = now() - Duration::hours(1);

		let mut order = Event::new(website_id, EventData::OrderPlaced);
		order.time = time;
		writer
			.write_batch(&[page_view(Uuid::new_v4(), time, "/", 1), order])
			.await
			.unwrap();

		let daily = repo.page_views_and_visitors(&website_id, &window()).await.unwrap();
		assert_eq!(daily.len(), 30);
		assert!(daily.iter().all(|d| d.page_views == 0 && d.visitors == 0));
	}

	#[tokio::test]
	async fn test_top_pages_counts_visitors_not_views() {
		let (_pool, repo, writer) = setup().await;
		let website_id = Uuid::new_v4();
		let time = now() - Duration::hours(2);

		let mut events = Vec::new();
		// one visitor reloading /pricing ten times
		for _ in 0..10 {
			events.push(page_view(website_id, time, "/pricing", 1));
		}
		for v in 2..5 {
			events.push(page_view(website_id, time, "/", v));
		}
		writer.write_batch(&events).await.unwrap();

		let pages = repo.top_pages(&website_id, &window(), 10).await.unwrap();
		assert_eq!(pages, vec![Counter::new("/", 3), Counter::new("/pricing", 1)]);

		let limited = repo.top_pages(&website_id, &window(), 1).await.unwrap();
		assert_eq!(limited, vec![Counter::new("/", 3)]);

		let unlimited = repo.top_pages(&website_id, &window(), 0).await.unwrap();
		assert_eq!(unlimited.len(), 2);
	}

	#[tokio::test]
	async fn test_top_dimensions() {
		let (_pool, repo, writer) = setup().await;
		let website_id = Uuid::new_v4();
		let time = now() - Duration::hours(2);

		let mut firefox = page_view(website_id, time, "/", 9);
		firefox.browser = Some(Browser::Firefox);
		firefox.operating_system = None;
		firefox.referrer = Some("news.ycombinator.com".into());
		firefox.country = None;

		writer
			.write_batch(&[
				page_view(website_id, time, "/", 1),
				page_view(website_id, time, "/", 2),
				firefox,
			])
			.await
			.unwrap();

		let browsers = repo.top_browsers(&website_id, &window(), 10).await.unwrap();
		assert_eq!(
			browsers,
			vec![
				BrowserCounter {
					browser: Browser::Chrome,
					count: 2
				},
				BrowserCounter {
					browser: Browser::Firefox,
					count: 1
				},
			]
		);

		let oses = repo.top_oses(&website_id, &window(), 10).await.unwrap();
		assert_eq!(oses[0].operating_system, OperatingSystem::Windows);
		assert_eq!(oses[1].operating_system, OperatingSystem::Other);

		let referrers = repo.top_referrers(&website_id, &window(), 10).await.unwrap();
		assert_eq!(
			referrers,
			vec![Counter::new("", 2), Counter::new("news.ycombinator.com", 1)]
		);

		let countries = repo.top_countries(&website_id, &window(), 10).await.unwrap();
		assert_eq!(countries, vec![Counter::new("DE", 2), Counter::new("", 1)]);
	}

	#[tokio::test]
	async fn test_window_bounds_are_respected() {
		let (_pool, repo, writer) = setup().await;
		let website_id = Uuid::new_v4();
		let window = window();

		writer
			.write_batch(&[
				page_view(website_id, window.from - Duration::milliseconds(1), "/old", 1),
				page_view(website_id, window.from, "/first", 1),
				page_view(website_id, window.to, "/last", 1),
				page_view(website_id, window.to + Duration::milliseconds(1), "/future", 1),
			])
			.await
			.unwrap();

		let mut pages = repo.top_pages(&website_id, &window, 10).await.unwrap();
		pages.sort_by(|a, b| a.label.cmp(&b.label));
		assert_eq!(pages, vec![Counter::new("/first", 1), Counter::new("/last", 1)]);
	}

	#[tokio::test]
	async fn test_new_subscribers_count() {
		let (_pool, repo, writer) = setup().await;
		let website_id = Uuid::new_v4();

		let mut events = Vec::new();
		for _ in 0..4 {
			let mut event = Event::new(website_id, EventData::SubscribedToNewsletter);
			event.time = now() - Duration::days(1);
			events.push(event);
		}
		let mut unsubscribed = Event::new(website_id, EventData::UnsubscribedFromNewsletter);
		unsubscribed.time = now() - Duration::days(1);
		events.push(unsubscribed);
		writer.write_batch(&events).await.unwrap();

		let count = repo.new_subscribers_count(&website_id, &window()).await.unwrap();
		assert_eq!(count, 4);
	}

	#[tokio::test]
	async fn test_organization_count_and_deletion() {
		let (pool, repo, writer) = setup().await;
		let organization_id = Uuid::new_v4();
		let site_a = Uuid::new_v4();
		let site_b = Uuid::new_v4();
		let other_site = Uuid::new_v4();
		insert_website(&pool, site_a, organization_id).await;
		insert_website(&pool, site_b, organization_id).await;
		insert_website(&pool, other_site, Uuid::new_v4()).await;

		let email = |website_id| {
			let mut event = Event::new(
				website_id,
				EventData::EmailSent {
					from_address: "a@example.com".into(),
					to_address: "b@example.com".into(),
				},
			);
			event.time = now();
			event
		};
		writer
			.write_batch(&[email(site_a), email(site_b), email(site_b), email(other_site)])
			.await
			.unwrap();

		let count = repo
			.count_events_for_organization(
				EventType::EmailSent,
				&organization_id,
				now() - Duration::days(1),
				now() + Duration::days(1),
			)
			.await
			.unwrap();
		assert_eq!(count, 3);

		assert_eq!(repo.delete_website_events(&site_a).await.unwrap(), 1);
		assert_eq!(
			repo.delete_organization_events(&organization_id).await.unwrap(),
			2
		);

		let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(remaining, 1);
	}
}
