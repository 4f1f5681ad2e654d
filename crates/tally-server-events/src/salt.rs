// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The rotating anonymous ID salt.
//!
//! The salt lives in the `settings` table under [`ANONYMOUS_ID_SALT_KEY`].
//! Readers never touch the database: they load the cached value, which a
//! background task refreshes on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use tally_server_db::{DbError, SettingsRepository};

use crate::error::Result;

pub const ANONYMOUS_ID_SALT_KEY: &str = "anonymous_id_salt";

/// Salt size in bytes before encoding.
const SALT_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AnonymousIdSalt {
	salt: String,
}

fn generate_salt() -> String {
	let mut bytes = [0u8; SALT_BYTES];
	OsRng.fill_bytes(&mut bytes);
	URL_SAFE_NO_PAD.encode(bytes)
}

/// Read-through cache of the current salt.
pub struct SaltStore {
	settings: SettingsRepository,
	current: ArcSwap<String>,
}

impl SaltStore {
	/// Loads the persisted salt, creating one first if none exists yet.
	#[instrument(skip(settings))]
	pub async fn load(settings: SettingsRepository) -> Result<Self> {
		let salt = match settings.get::<AnonymousIdSalt>(ANONYMOUS_ID_SALT_KEY).await {
			Ok(setting) => setting.value.salt,
			Err(DbError::NotFound(_)) => {
				info!("no anonymous ID salt found, generating one");
				let salt = generate_salt();
				settings
					.set(ANONYMOUS_ID_SALT_KEY, &AnonymousIdSalt { salt: salt.clone() })
					.await?;
				salt
			}
			Err(e) => return Err(e.into()),
		};

		Ok(Self {
			settings,
			current: ArcSwap::from_pointee(salt),
		})
	}

	/// The cached salt. Never blocks.
	pub fn current(&self) -> Arc<String> {
		self.current.load_full()
	}

	/// Replaces the persisted salt with a new random one.
	///
	/// The cache is updated immediately in this process; other processes
	/// pick the new value up on their next refresh.
	#[instrument(skip(self))]
	pub async fn rotate(&self) -> Result<Arc<String>> {
		let salt = generate_salt();
		self
			.settings
			.set(ANONYMOUS_ID_SALT_KEY, &AnonymousIdSalt { salt: salt.clone() })
			.await?;

		let salt = Arc::new(salt);
		self.current.store(Arc::clone(&salt));
		info!("anonymous ID salt rotated");
		Ok(salt)
	}

	/// Re-reads the persisted salt and swaps the cache if it changed.
	/// Returns whether the cached value changed.
	#[instrument(skip(self))]
	pub async fn refresh(&self) -> Result<bool> {
		let setting = self
			.settings
			.get::<AnonymousIdSalt>(ANONYMOUS_ID_SALT_KEY)
			.await?;

		if *self.current.load_full() == setting.value.salt {
			return Ok(false);
		}

		self.current.store(Arc::new(setting.value.salt));
		debug!("anonymous ID salt refreshed");
		Ok(true)
	}

	/// Refreshes the cache every `interval` until `shutdown` is cancelled.
	/// Refresh failures keep the last known salt.
	pub fn spawn_refresher(
		self: Arc<Self>,
		interval: Duration,
		shutdown: CancellationToken,
	) -> JoinHandle<()> {
		tokio::spawn(async move {
			loop {
				tokio::select! {
					_ = tokio::time::sleep(interval) => {
						if let Err(e) = self.refresh().await {
							error!(error = %e, "failed to refresh anonymous ID salt");
						}
					}
					_ = shutdown.cancelled() => {
						debug!("salt refresher stopped");
						break;
					}
				}
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tally_server_db::testing::create_test_pool;

	async fn stored_salt(settings: &SettingsRepository) -> String {
		settings
			.get::<AnonymousIdSalt>(ANONYMOUS_ID_SALT_KEY)
			.await
			.unwrap()
			.value
			.salt
	}

	#[test]
	fn test_generated_salt_is_256_bits() {
		let salt = generate_salt();
		let decoded = URL_SAFE_NO_PAD.decode(&salt).unwrap();
		assert_eq!(decoded.len(), SALT_BYTES);
		assert_ne!(generate_salt(), salt);
	}

	#[tokio::test]
	async fn test_load_creates_salt_when_missing() {
		let settings = SettingsRepository::new(create_test_pool().await);
		let store = SaltStore::load(settings.clone()).await.unwrap();

		assert_eq!(*store.current(), stored_salt(&settings).await);
	}

	#[tokio::test]
	async fn test_load_reuses_existing_salt() {
		let settings = SettingsRepository::new(create_test_pool().await);
		let first = SaltStore::load(settings.clone()).await.unwrap();
		let second = SaltStore::load(settings).await.unwrap();

		assert_eq!(first.current(), second.current());
	}

	#[tokio::test]
	async fn test_rotate_persists_and_updates_cache() {
		let settings = SettingsRepository::new(create_test_pool().await);
		let store = SaltStore::load(settings.clone()).await.unwrap();
		let before = store.current();

		let rotated = store.rotate().await.unwrap();
		assert_ne!(rotated, before);
		assert_eq!(store.current(), rotated);
		assert_eq!(*rotated, stored_salt(&settings).await);
	}

	#[tokio::test]
	async fn test_refresh_picks_up_rotation_from_another_process() {
		let settings = SettingsRepository::new(create_test_pool().await);
		let reader = SaltStore::load(settings.clone()).await.unwrap();
		let rotator = SaltStore::load(settings).await.unwrap();

		assert!(!reader.refresh().await.unwrap());

		let rotated = rotator.rotate().await.unwrap();
		assert_ne!(reader.current(), rotated);

		assert!(reader.refresh().await.unwrap());
		assert_eq!(reader.current(), rotated);
	}

	#[tokio::test]
	async fn test_refresher_stops_on_shutdown() {
		let settings = SettingsRepository::new(create_test_pool().await);
		let store = Arc::new(SaltStore::load(settings).await.unwrap());
		let token = CancellationToken::new();

		let handle = store.spawn_refresher(Duration::from_millis(5), token.clone());
		tokio::time::sleep(Duration::from_millis(20)).await;
		token.cancel();

		tokio::time::timeout(Duration::from_secs(1), handle)
			.await
			.unwrap()
			.unwrap();
	}
}
