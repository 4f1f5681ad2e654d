// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduled jobs owned by the events subsystem.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use tally_server_jobs::{Job, JobContext, JobError, JobOutput};

use crate::error::EventsServerError;
use crate::repository::EventsRepository;
use crate::salt::SaltStore;

fn retryable(e: EventsServerError) -> JobError {
	JobError::Failed {
		message: e.to_string(),
		retryable: true,
	}
}

/// Replaces the anonymous ID salt, ending every visitor identity.
pub struct RotateSaltJob {
	salt: Arc<SaltStore>,
}

impl RotateSaltJob {
	pub const ID: &'static str = "rotate-anonymous-id-salt";

	pub fn new(salt: Arc<SaltStore>) -> Self {
		Self { salt }
	}
}

#[async_trait]
impl Job for RotateSaltJob {
	fn id(&self) -> &str {
		Self::ID
	}

	fn name(&self) -> &str {
		"Rotate anonymous ID salt"
	}

	fn description(&self) -> &str {
		"Generate a new salt for visitor fingerprints"
	}

	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		self.salt.rotate().await.map_err(retryable)?;

		Ok(JobOutput {
			message: "Anonymous ID salt rotated".to_string(),
			metadata: None,
		})
	}
}

/// Deletes every event of one website.
pub struct DeleteWebsiteEventsJob {
	repository: Arc<dyn EventsRepository>,
	website_id: Uuid,
}

impl DeleteWebsiteEventsJob {
	pub const ID: &'static str = "delete-website-events";

	pub fn new(repository: Arc<dyn EventsRepository>, website_id: Uuid) -> Self {
		Self {
			repository,
			website_id,
		}
	}
}

#[async_trait]
impl Job for DeleteWebsiteEventsJob {
	fn id(&self) -> &str {
		Self::ID
	}

	fn name(&self) -> &str {
		"Delete website events"
	}

	fn description(&self) -> &str {
		"Remove the event history of a deleted website"
	}

	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let deleted = self
			.repository
			.delete_website_events(&self.website_id)
			.await
			.map_err(retryable)?;

		info!(website_id = %self.website_id, deleted, "Deleted website events");
		Ok(JobOutput {
			message: format!("Deleted {deleted} events"),
			metadata: Some(serde_json::json!({
				"website_id": self.website_id,
				"deleted": deleted,
			})),
		})
	}
}

/// Deletes every event of every website in an organization.
pub struct DeleteOrganizationEventsJob {
	repository: Arc<dyn EventsRepository>,
	organization_id: Uuid,
}

impl DeleteOrganizationEventsJob {
	pub const ID: &'static str = "delete-organization-events";

	pub fn new(repository: Arc<dyn EventsRepository>, organization_id: Uuid) -> Self {
		Self {
			repository,
			organization_id,
		}
	}
}

#[async_trait]
impl Job for DeleteOrganizationEventsJob {
	fn id(&self) -> &str {
		Self::ID
	}

	fn name(&self) -> &str {
		"Delete organization events"
	}

	fn description(&self) -> &str {
		"Remove the event history of a deleted organization"
	}

	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let deleted = self
			.repository
			.delete_organization_events(&self.organization_id)
			.await
			.map_err(retryable)?;

		info!(organization_id = %self.organization_id, deleted, "Deleted organization events");
		Ok(JobOutput {
			message: format!("Deleted {deleted} events"),
			metadata: Some(serde_json::json!({
				"organization_id": self.organization_id,
				"deleted": deleted,
			})),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::repository::SqliteEventsRepository;
	use crate::writer::{EventWriter, SqliteEventWriter, DEFAULT_CHUNK_SIZE};
	use tally_events_core::{Event, EventData};
	use tally_server_db::testing::{create_test_pool, insert_website};
	use tally_server_db::SettingsRepository;
	use tally_server_jobs::{CancellationToken, TriggerSource};

	fn ctx() -> JobContext {
		JobContext {
			run_id: Uuid::new_v4().to_string(),
			triggered_by: TriggerSource::Schedule,
			cancellation_token: CancellationToken::new(),
		}
	}

	async fn count(pool: &sqlx::SqlitePool) -> i64 {
		sqlx::query_scalar("SELECT COUNT(*) FROM events")
			.fetch_one(pool)
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn test_rotate_salt_job_changes_salt() {
		let settings = SettingsRepository::new(create_test_pool().await);
		let salt = Arc::new(SaltStore::load(settings).await.unwrap());
		let before = salt.current();

		let job = RotateSaltJob::new(Arc::clone(&salt));
		job.run(&ctx()).await.unwrap();

		assert_ne!(salt.current(), before);
	}

	#[tokio::test]
	async fn test_cancelled_job_does_nothing() {
		let settings = SettingsRepository::new(create_test_pool().await);
		let salt = Arc::new(SaltStore::load(settings).await.unwrap());
		let before = salt.current();

		let ctx = ctx();
		ctx.cancellation_token.cancel();
		let result = RotateSaltJob::new(Arc::clone(&salt)).run(&ctx).await;

		assert!(matches!(result, Err(JobError::Cancelled)));
		assert_eq!(salt.current(), before);
	}

	#[tokio::test]
	async fn test_delete_jobs_remove_events() {
		let pool = create_test_pool().await;
		let repository: Arc<dyn EventsRepository> =
			Arc::new(SqliteEventsRepository::new(pool.clone()));
		let writer = SqliteEventWriter::new(pool.clone(), DEFAULT_CHUNK_SIZE);

		let organization_id = Uuid::new_v4();
		let (site_a, site_b, site_c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
		insert_website(&pool, site_b, organization_id).await;
		insert_website(&pool, site_c, organization_id).await;

		let events: Vec<Event> = [site_a, site_b, site_c]
			.into_iter()
			.map(|site| Event::new(site, EventData::SubscribedToNewsletter))
			.collect();
		writer.write_batch(&events).await.unwrap();

		let output = DeleteWebsiteEventsJob::new(Arc::clone(&repository), site_a)
			.run(&ctx())
			.await
			.unwrap();
		assert_eq!(output.message, "Deleted 1 events");
		assert_eq!(count(&pool).await, 2);

		DeleteOrganizationEventsJob::new(repository, organization_id)
			.run(&ctx())
			.await
			.unwrap();
		assert_eq!(count(&pool).await, 0);
	}
}
