// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{
	DatabaseConfigLayer, EventsConfigLayer, JobsConfigLayer, LoggingConfigLayer,
};

/// One configuration source's view of the server config. Every section is
/// optional so layers can be merged in precedence order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub events: Option<EventsConfigLayer>,
	#[serde(default)]
	pub jobs: Option<JobsConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(base), Some(other)) => merge(base, other),
		(None, Some(other)) => *base = Some(other),
		(_, None) => {}
	}
}

impl ServerConfigLayer {
	/// Overlays `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.events, other.events, EventsConfigLayer::merge);
		merge_section(&mut self.jobs, other.jobs, JobsConfigLayer::merge);
	}
}
