// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event pipeline for Tally server.
//!
//! Tracking calls push events into an in-memory [`EventBuffer`]. A
//! [`FlushLoop`] drains the buffer on a short interval and hands batches to
//! an [`EventWriter`]. Dashboards read aggregates through the cached
//! [`AnalyticsReader`]. Page views are fingerprinted with a salt kept by
//! the [`SaltStore`] and rotated by [`RotateSaltJob`].

pub mod buffer;
pub mod error;
pub mod executor;
pub mod flush;
pub mod jobs;
pub mod reader;
pub mod repository;
pub mod salt;
pub mod service;
pub mod writer;

pub use buffer::EventBuffer;
pub use error::{EventsServerError, Result};
pub use executor::BackgroundExecutor;
pub use flush::{persist_batch, FlushConfig, FlushLoop};
pub use jobs::{DeleteOrganizationEventsJob, DeleteWebsiteEventsJob, RotateSaltJob};
pub use reader::{AnalyticsReader, ReaderConfig};
pub use repository::{EventsRepository, SqliteEventsRepository};
pub use salt::{SaltStore, ANONYMOUS_ID_SALT_KEY};
pub use service::{
	EventsService, EventsServiceConfig, TrackCustomEventInput, TrackEmailSentInput,
	TrackNewsletterInput, TrackOrderCanceledInput, TrackOrderCompletedInput,
	TrackOrderPlacedInput, TrackPageViewInput,
};
pub use writer::{EventRow, EventWriter, SqliteEventWriter, DEFAULT_CHUNK_SIZE, ROWS_PER_STATEMENT};
