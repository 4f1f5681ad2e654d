// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded in-memory buffer between event producers and the flush loop.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tally_events_core::Event;

/// Unordered, bounded mailbox of events waiting to be persisted.
///
/// Pushes never block on I/O: when the buffer is full, events are dropped.
/// Every operation holds the single lock for the duration of a copy or a
/// swap, so [`EventBuffer::flush`] never observes a half-applied push.
#[derive(Debug)]
pub struct EventBuffer {
	events: Mutex<Vec<Event>>,
	capacity: usize,
	initial_capacity: usize,
}

impl EventBuffer {
	/// `initial_capacity` is the pre-allocation used after each flush and is
	/// clamped to `capacity`.
	pub fn new(capacity: usize, initial_capacity: usize) -> Self {
		let initial_capacity = initial_capacity.min(capacity);
		Self {
			events: Mutex::new(Vec::with_capacity(initial_capacity)),
			capacity,
			initial_capacity,
		}
	}

	fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
		// a panicking producer cannot leave the Vec half-written
		self.events.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Appends `event` unless the buffer is full. Returns whether it was kept.
	pub fn push(&self, event: Event) -> bool {
		let mut events = self.lock();
		if events.len() >= self.capacity {
			return false;
		}
		events.push(event);
		true
	}

	/// Appends as many of `batch` as fit and drops the rest. Returns the
	/// number accepted.
	pub fn push_many(&self, batch: Vec<Event>) -> usize {
		let mut events = self.lock();
		let free = self.capacity.saturating_sub(events.len());
		let accepted = batch.len().min(free);
		events.extend(batch.into_iter().take(accepted));
		accepted
	}

	/// Takes every buffered event, leaving a fresh pre-sized buffer behind.
	pub fn flush(&self) -> Vec<Event> {
		let mut events = self.lock();
		if events.is_empty() {
			return Vec::new();
		}
		std::mem::replace(&mut *events, Vec::with_capacity(self.initial_capacity))
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}
}
