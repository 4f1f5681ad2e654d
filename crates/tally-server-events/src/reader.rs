// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dashboard analytics: concurrent, cached aggregate queries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use moka::future::Cache;
use tracing::{debug, instrument};
use uuid::Uuid;

use tally_events_core::{
	AnalyticsData, AnalyticsWindow, BrowserCounter, Counter, DailyVisits, OperatingSystemCounter,
};

use crate::error::Result;
use crate::repository::EventsRepository;

const MAX_CACHED_AGGREGATES: u64 = 100_000;

#[derive(Debug, Clone)]
pub struct ReaderConfig {
	pub cache_ttl: Duration,
	/// Aggregate queries allowed in flight per request.
	pub query_concurrency: usize,
	pub top_limit: i64,
	pub window_days: u32,
}

impl Default for ReaderConfig {
	fn default() -> Self {
		Self {
			cache_ttl: Duration::from_secs(120),
			query_concurrency: 3,
			top_limit: 10,
			window_days: 30,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AggregateKind {
	Daily,
	Pages,
	Countries,
	Referrers,
	Browsers,
	OperatingSystems,
	NewSubscribers,
}

impl AggregateKind {
	const ALL: [AggregateKind; 7] = [
		AggregateKind::Daily,
		AggregateKind::Pages,
		AggregateKind::Countries,
		AggregateKind::Referrers,
		AggregateKind::Browsers,
		AggregateKind::OperatingSystems,
		AggregateKind::NewSubscribers,
	];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
	kind: AggregateKind,
	website_id: Uuid,
	from: DateTime<Utc>,
	to: DateTime<Utc>,
	limit: i64,
}

#[derive(Debug, Clone)]
enum Aggregate {
	Daily(Arc<Vec<DailyVisits>>),
	Pages(Arc<Vec<Counter>>),
	Countries(Arc<Vec<Counter>>),
	Referrers(Arc<Vec<Counter>>),
	Browsers(Arc<Vec<BrowserCounter>>),
	OperatingSystems(Arc<Vec<OperatingSystemCounter>>),
	NewSubscribers(i64),
}

/// Computes [`AnalyticsData`] for a website.
///
/// The seven aggregates run concurrently, at most `query_concurrency` at a
/// time. The first failing query aborts the others and fails the request.
/// Every aggregate is cached on its own for `cache_ttl`.
#[derive(Clone)]
pub struct AnalyticsReader {
	repository: Arc<dyn EventsRepository>,
	cache: Cache<CacheKey, Aggregate>,
	config: ReaderConfig,
}

impl AnalyticsReader {
	pub fn new(repository: Arc<dyn EventsRepository>, config: ReaderConfig) -> Self {
		let cache = Cache::builder()
			.max_capacity(MAX_CACHED_AGGREGATES)
			.time_to_live(config.cache_ttl)
			.build();
		Self {
			repository,
			cache,
			config,
		}
	}

	/// Analytics over the trailing window ending today.
	pub async fn get_analytics_data(&self, website_id: Uuid) -> Result<AnalyticsData> {
		let window = AnalyticsWindow::trailing_days(Utc::now(), self.config.window_days);
		self.get_analytics_data_for(website_id, window).await
	}

	#[instrument(skip(self), fields(website_id = %website_id))]
	pub async fn get_analytics_data_for(
		&self,
		website_id: Uuid,
		window: AnalyticsWindow,
	) -> Result<AnalyticsData> {
		let limit = self.config.top_limit;
		let aggregates: Vec<Aggregate> = stream::iter(
			AggregateKind::ALL
				.into_iter()
				.map(|kind| self.aggregate(kind, website_id, window, limit)),
		)
		.buffer_unordered(self.config.query_concurrency.max(1))
		.try_collect()
		.await?;

		let mut data = AnalyticsData::default();
		for aggregate in aggregates {
			match aggregate {
				Aggregate::Daily(daily) => data.set_daily(&daily),
				Aggregate::Pages(pages) => data.pages = pages.to_vec(),
				Aggregate::Countries(countries) => data.countries = countries.to_vec(),
				Aggregate::Referrers(referrers) => data.set_referrers(referrers.to_vec()),
				Aggregate::Browsers(browsers) => data.browsers = browsers.to_vec(),
				Aggregate::OperatingSystems(oses) => data.oses = oses.to_vec(),
				Aggregate::NewSubscribers(count) => data.new_subscribers = count,
			}
		}

		Ok(data)
	}

	async fn aggregate(
		&self,
		kind: AggregateKind,
		website_id: Uuid,
		window: AnalyticsWindow,
		limit: i64,
	) -> Result<Aggregate> {
		let key = CacheKey {
			kind,
			website_id,
			from: window.from,
			to: window.to,
			limit,
		};
		if let Some(cached) = self.cache.get(&key).await {
			return Ok(cached);
		}

		let repo = &self.repository;
		let aggregate = match kind {
			AggregateKind::Daily => {
				Aggregate::Daily(Arc::new(repo.page_views_and_visitors(&website_id, &window).await?))
			}
			AggregateKind::Pages => {
				Aggregate::Pages(Arc::new(repo.top_pages(&website_id, &window, limit).await?))
			}
			AggregateKind::Countries => {
				Aggregate::Countries(Arc::new(repo.top_countries(&website_id, &window, limit).await?))
			}
			AggregateKind::Referrers => {
				Aggregate::Referrers(Arc::new(repo.top_referrers(&website_id, &window, limit).await?))
			}
			AggregateKind::Browsers => {
				Aggregate::Browsers(Arc::new(repo.top_browsers(&website_id, &window, limit).await?))
			}
			AggregateKind::OperatingSystems => Aggregate::OperatingSystems(Arc::new(
				repo.top_oses(&website_id, &window, limit).await?,
			)),
			AggregateKind::NewSubscribers => {
				Aggregate::NewSubscribers(repo.new_subscribers_count(&website_id, &window).await?)
			}
		};

		debug!(?kind, "aggregate computed");
		self.cache.insert(key, aggregate.clone()).await;
		Ok(aggregate)
	}
}
