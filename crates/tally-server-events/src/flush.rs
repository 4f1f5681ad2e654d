// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background flush of the event buffer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tally_events_core::Event;

use crate::buffer::EventBuffer;
use crate::writer::EventWriter;

/// Timing of the flush loop.
#[derive(Debug, Clone)]
pub struct FlushConfig {
	/// Time between flushes while running.
	pub interval: Duration,
	/// Time between flushes once shutdown was requested.
	pub shutdown_interval: Duration,
	/// How long to keep draining after shutdown before giving up.
	pub drain_timeout: Duration,
}

impl Default for FlushConfig {
	fn default() -> Self {
		Self {
			interval: Duration::from_millis(50),
			shutdown_interval: Duration::from_millis(20),
			drain_timeout: Duration::from_secs(10),
		}
	}
}

/// Decrements the in-flight counter even if the write task panics.
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
	fn new(counter: &Arc<AtomicUsize>) -> Self {
		counter.fetch_add(1, Ordering::SeqCst);
		Self(Arc::clone(counter))
	}
}

impl Drop for InFlightGuard {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

/// Periodically drains the buffer and hands each batch to the writer.
///
/// Writes run on their own tasks so a slow database never delays the next
/// flush. A failed write puts the whole batch back into the buffer. With a
/// writer that is not atomic per batch this can duplicate rows that an
/// earlier chunk already committed.
///
/// After shutdown the loop flushes at the tighter interval and exits once
/// the buffer is empty with no write in flight, or when the drain timeout
/// expires.
#[derive(Clone)]
pub struct FlushLoop {
	buffer: Arc<EventBuffer>,
	writer: Arc<dyn EventWriter>,
	config: FlushConfig,
	in_flight: Arc<AtomicUsize>,
}

impl FlushLoop {
	pub fn new(buffer: Arc<EventBuffer>, writer: Arc<dyn EventWriter>, config: FlushConfig) -> Self {
		Self {
			buffer,
			writer,
			config,
			in_flight: Arc::new(AtomicUsize::new(0)),
		}
	}

	/// Number of batches currently being written.
	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::SeqCst)
	}

	/// Takes everything in the buffer and starts writing it. Returns the
	/// batch size.
	pub fn flush_once(&self) -> usize {
		let batch = self.buffer.flush();
		let count = batch.len();
		if count == 0 {
			return 0;
		}

		let guard = InFlightGuard::new(&self.in_flight);
		let buffer = Arc::clone(&self.buffer);
		let writer = Arc::clone(&self.writer);
		tokio::spawn(async move {
			persist_batch(writer.as_ref(), &buffer, batch).await;
			drop(guard);
		});

		count
	}

	fn is_drained(&self) -> bool {
		self.buffer.is_empty() && self.in_flight() == 0
	}

	pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
		tokio::spawn(async move {
			info!(
				interval_ms = self.config.interval.as_millis() as u64,
				"Starting event flush loop"
			);

			let mut drain_deadline: Option<Instant> = None;

			loop {
				match drain_deadline {
					None => {
						tokio::select! {
							_ = tokio::time::sleep(self.config.interval) => {}
							_ = shutdown.cancelled() => {
								info!(buffered = self.buffer.len(), "Shutdown requested, draining event buffer");
								drain_deadline = Some(Instant::now() + self.config.drain_timeout);
							}
						}
					}
					Some(_) => tokio::time::sleep(self.config.shutdown_interval).await,
				}

				self.flush_once();

				if let Some(deadline) = drain_deadline {
					if self.is_drained() {
						info!("Event buffer drained");
						break;
					}
					if Instant::now() >= deadline {
						warn!(
							buffered = self.buffer.len(),
							in_flight = self.in_flight(),
							"Gave up draining event buffer"
						);
						break;
					}
				}
			}

			info!("Event flush loop stopped");
		})
	}
}

/// Writes `batch`, returning it to `buffer` on failure.
pub async fn persist_batch(writer: &dyn EventWriter, buffer: &EventBuffer, batch: Vec<Event>) {
	let count = batch.len();
	match writer.write_batch(&batch).await {
		Ok(()) => debug!(count, "events persisted"),
		Err(e) => {
			error!(error = %e, count, "failed to persist events, re-buffering batch");
			let kept = buffer.push_many(batch);
			if kept < count {
				warn!(dropped = count - kept, "event buffer full, dropped events");
			}
		}
	}
}
