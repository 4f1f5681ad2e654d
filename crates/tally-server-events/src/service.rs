// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Entry points used by the rest of the server.
//!
//! Every `track_*` call returns at once. The event is built, validated and
//! buffered on the [`BackgroundExecutor`]; failures are logged there and
//! never reach the caller.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use tally_events_core::{
	anonymous_id, clean_custom_event_name, cleanup_referrer, AnalyticsData, BotFilter, Event,
	EventData, EventType,
};
use tally_server_jobs::JobScheduler;

use crate::buffer::EventBuffer;
use crate::error::Result;
use crate::executor::BackgroundExecutor;
use crate::flush::{FlushConfig, FlushLoop};
use crate::jobs::{DeleteOrganizationEventsJob, DeleteWebsiteEventsJob};
use crate::reader::{AnalyticsReader, ReaderConfig};
use crate::repository::{EventsRepository, SqliteEventsRepository};
use crate::salt::SaltStore;
use crate::writer::{EventWriter, SqliteEventWriter, DEFAULT_CHUNK_SIZE};

#[derive(Debug, Clone)]
pub struct EventsServiceConfig {
	pub buffer_capacity: usize,
	pub buffer_initial_capacity: usize,
	pub write_chunk_size: usize,
	pub flush: FlushConfig,
	pub reader: ReaderConfig,
	/// Grace period before a deleted website's events are removed.
	pub deletion_delay: Duration,
}

impl Default for EventsServiceConfig {
	fn default() -> Self {
		Self {
			buffer_capacity: 5_000_000,
			buffer_initial_capacity: 50_000,
			write_chunk_size: DEFAULT_CHUNK_SIZE,
			flush: FlushConfig::default(),
			reader: ReaderConfig::default(),
			deletion_delay: Duration::from_secs(600),
		}
	}
}

#[derive(Debug, Clone)]
pub struct TrackPageViewInput {
	pub website_id: Uuid,
	/// Used to tell internal navigation from real referrers.
	pub website_primary_domain: String,
	pub path: String,
	pub ip_address: IpAddr,
	pub user_agent: String,
	pub header_referrer: String,
	/// Value of the `ref` query parameter, if any.
	pub query_parameter_ref: String,
	pub country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrackEmailSentInput {
	pub website_id: Uuid,
	pub from_address: String,
	pub to_address: String,
	pub newsletter_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct TrackNewsletterInput {
	pub website_id: Uuid,
	pub newsletter_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct TrackOrderPlacedInput {
	pub website_id: Uuid,
	pub order_id: Uuid,
	pub user_agent: String,
	pub country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrackOrderCompletedInput {
	pub website_id: Uuid,
	pub order_id: Uuid,
	pub total_amount: i64,
}

#[derive(Debug, Clone)]
pub struct TrackOrderCanceledInput {
	pub website_id: Uuid,
	pub order_id: Uuid,
	pub country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrackCustomEventInput {
	pub website_id: Uuid,
	pub event_name: String,
}

/// The events subsystem as seen by producers and dashboards.
#[derive(Clone)]
pub struct EventsService {
	buffer: Arc<EventBuffer>,
	writer: Arc<dyn EventWriter>,
	repository: Arc<dyn EventsRepository>,
	reader: AnalyticsReader,
	salt: Arc<SaltStore>,
	bot_filter: Arc<BotFilter>,
	executor: BackgroundExecutor,
	scheduler: Arc<JobScheduler>,
	config: EventsServiceConfig,
}

impl EventsService {
	/// Builds the service on top of SQLite.
	pub fn new(
		pool: SqlitePool,
		salt: Arc<SaltStore>,
		scheduler: Arc<JobScheduler>,
		config: EventsServiceConfig,
	) -> Result<Self> {
		let repository = Arc::new(SqliteEventsRepository::new(pool.clone()));
		let writer = Arc::new(SqliteEventWriter::new(pool, config.write_chunk_size));
		Self::with_storage(repository, writer, salt, scheduler, config)
	}

	pub fn with_storage(
		repository: Arc<dyn EventsRepository>,
		writer: Arc<dyn EventWriter>,
		salt: Arc<SaltStore>,
		scheduler: Arc<JobScheduler>,
		config: EventsServiceConfig,
	) -> Result<Self> {
		let buffer = Arc::new(EventBuffer::new(
			config.buffer_capacity,
			config.buffer_initial_capacity,
		));
		let reader = AnalyticsReader::new(Arc::clone(&repository), config.reader.clone());

		Ok(Self {
			buffer,
			writer,
			repository,
			reader,
			salt,
			bot_filter: Arc::new(BotFilter::new()?),
			executor: BackgroundExecutor::new(),
			scheduler,
			config,
		})
	}

	/// The flush loop draining this service's buffer. Spawn it once.
	pub fn flush_loop(&self) -> FlushLoop {
		FlushLoop::new(
			Arc::clone(&self.buffer),
			Arc::clone(&self.writer),
			self.config.flush.clone(),
		)
	}

	/// Waits for every tracking call made so far to reach the buffer.
	pub async fn drain_tracking(&self) {
		self.executor.drain().await;
	}

	pub fn buffered_events(&self) -> usize {
		self.buffer.len()
	}

	pub fn track_page_view(&self, input: TrackPageViewInput) {
		let time = Utc::now();
		let service = self.clone();
		self.executor.submit(async move {
			if let Some(event) = service.page_view_event(input, time) {
				service.buffer_event(event);
			}
		});
	}

	pub fn track_email_sent(&self, input: TrackEmailSentInput) {
		let mut event = Event::new(
			input.website_id,
			EventData::EmailSent {
				from_address: input.from_address,
				to_address: input.to_address,
			},
		);
		event.newsletter_id = input.newsletter_id;
		self.submit(event);
	}

	pub fn track_subscribed_to_newsletter(&self, input: TrackNewsletterInput) {
		let mut event = Event::new(input.website_id, EventData::SubscribedToNewsletter);
		event.newsletter_id = input.newsletter_id;
		self.submit(event);
	}

	pub fn track_unsubscribed_from_newsletter(&self, input: TrackNewsletterInput) {
		let mut event = Event::new(input.website_id, EventData::UnsubscribedFromNewsletter);
		event.newsletter_id = input.newsletter_id;
		self.submit(event);
	}

	pub fn track_order_placed(&self, input: TrackOrderPlacedInput) {
		let time = Utc::now();
		let service = self.clone();
		self.executor.submit(async move {
			let class = service.bot_filter.classify(input.user_agent.trim());
			let mut event = Event::new(input.website_id, EventData::OrderPlaced);
			event.time = time;
			event.order_id = Some(input.order_id);
			event.country = input.country;
			event.browser = Some(class.browser);
			event.operating_system = Some(class.operating_system);
			service.buffer_event(event);
		});
	}

	pub fn track_order_completed(&self, input: TrackOrderCompletedInput) {
		let mut event = Event::new(
			input.website_id,
			EventData::OrderCompleted {
				total_amount: input.total_amount,
			},
		);
		event.order_id = Some(input.order_id);
		self.submit(event);
	}

	pub fn track_order_canceled(&self, input: TrackOrderCanceledInput) {
		let mut event = Event::new(input.website_id, EventData::OrderCanceled);
		event.order_id = Some(input.order_id);
		event.country = input.country;
		self.submit(event);
	}

	pub fn track_custom_event(&self, input: TrackCustomEventInput) {
		let event = Event::new(
			input.website_id,
			EventData::Custom {
				event_name: clean_custom_event_name(&input.event_name),
			},
		);
		self.submit(event);
	}

	pub async fn get_analytics_data(&self, website_id: Uuid) -> Result<AnalyticsData> {
		self.reader.get_analytics_data(website_id).await
	}

	#[instrument(skip(self), fields(organization_id = %organization_id))]
	pub async fn count_events_for_organization(
		&self,
		event_type: EventType,
		organization_id: Uuid,
		from: DateTime<Utc>,
		to: DateTime<Utc>,
	) -> Result<i64> {
		self.repository
			.count_events_for_organization(event_type, &organization_id, from, to)
			.await
	}

	pub async fn delete_for_website(&self, website_id: Uuid) -> Result<u64> {
		self.repository.delete_website_events(&website_id).await
	}

	pub async fn delete_for_organization(&self, organization_id: Uuid) -> Result<u64> {
		self.repository
			.delete_organization_events(&organization_id)
			.await
	}

	/// Deletes the website's events once the deletion delay has passed.
	/// Returns the run ID of the deferred job.
	pub fn schedule_deletion_of_website_data(&self, website_id: Uuid) -> String {
		let job = DeleteWebsiteEventsJob::new(Arc::clone(&self.repository), website_id);
		self.scheduler
			.schedule_once(Arc::new(job), self.config.deletion_delay)
	}

	pub fn schedule_deletion_of_organization_data(&self, organization_id: Uuid) -> String {
		let job = DeleteOrganizationEventsJob::new(Arc::clone(&self.repository), organization_id);
		self.scheduler
			.schedule_once(Arc::new(job), self.config.deletion_delay)
	}

	pub async fn rotate_salt(&self) -> Result<Arc<String>> {
		self.salt.rotate().await
	}

	/// Events built on the caller's path carry the call time already.
	fn submit(&self, event: Event) {
		let service = self.clone();
		self.executor.submit(async move {
			service.buffer_event(event);
		});
	}

	fn page_view_event(&self, input: TrackPageViewInput, time: DateTime<Utc>) -> Option<Event> {
		let path = input.path.trim();
		if path.is_empty() {
			error!(website_id = %input.website_id, "page view path is empty");
			return None;
		}

		let user_agent = input.user_agent.trim();
		let class = self.bot_filter.classify(user_agent);
		if class.is_bot {
			return None;
		}

		let salt = self.salt.current();
		let visitor = anonymous_id(&salt, &input.website_id, &input.ip_address, user_agent);
		let referrer = cleanup_referrer(
			&input.website_primary_domain,
			&input.header_referrer,
			&input.query_parameter_ref,
		);

		let mut event = Event::new(input.website_id, EventData::PageView);
		event.time = time;
		event.path = Some(path.to_string());
		event.anonymous_id = Some(visitor);
		event.referrer = Some(referrer);
		event.country = input.country;
		event.browser = Some(class.browser);
		event.operating_system = Some(class.operating_system);
		Some(event)
	}

	fn buffer_event(&self, event: Event) {
		if let Err(e) = event.validate() {
			error!(
				website_id = %event.website_id,
				event_type = %event.event_type(),
				error = %e,
				"dropping invalid event"
			);
			return;
		}

		if !self.buffer.push(event) {
			debug!("event buffer full, event dropped");
		}
	}
}
