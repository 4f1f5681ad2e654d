// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pseudonymous visitor fingerprints.
//!
//! The anonymous ID is the first 128 bits of the BLAKE3 hash of the website
//! ID, the raw IP bytes, the user-agent and the current salt. Nothing in the
//! output can be reversed into the IP, and rotating the salt makes IDs from
//! different days unlinkable.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EventsError;

/// 128-bit pseudonymous visitor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnonymousId(pub Uuid);

impl AnonymousId {
	#[must_use]
	pub fn from_bytes(bytes: [u8; 16]) -> Self {
		Self(Uuid::from_bytes(bytes))
	}

	#[must_use]
	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl std::fmt::Display for AnonymousId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for AnonymousId {
	type Err = EventsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s)
			.map(Self)
			.map_err(|_| EventsError::InvalidAnonymousId(s.to_string()))
	}
}

/// Computes the anonymous ID of a visitor.
///
/// Runs on every page view, so it only feeds borrowed bytes into the hasher.
#[must_use]
pub fn anonymous_id(salt: &str, website_id: &Uuid, ip: &IpAddr, user_agent: &str) -> AnonymousId {
	let mut hasher = blake3::Hasher::new();
	hasher.update(website_id.as_bytes());
	match ip {
		IpAddr::V4(v4) => hasher.update(&v4.octets()),
		IpAddr::V6(v6) => hasher.update(&v6.octets()),
	};
	hasher.update(user_agent.as_bytes());
	hasher.update(salt.as_bytes());
	let hash = hasher.finalize();

	let mut id = [0u8; 16];
	id.copy_from_slice(&hash.as_bytes()[..16]);
	AnonymousId::from_bytes(id)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::collections::HashSet;
	use std::net::{Ipv4Addr, Ipv6Addr};

	const UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

	fn website() -> Uuid {
		Uuid::parse_str("0190f5a0-7b1c-7c3e-9a1b-2c3d4e5f6a7b").unwrap()
	}

	#[test]
	fn test_same_input_same_id() {
		let ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));
		let a = anonymous_id("salt", &website(), &ip, UA);
		let b = anonymous_id("salt", &website(), &ip, UA);
		assert_eq!(a, b);
	}

	#[test]
	fn test_each_input_changes_id() {
		let ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));
		let base = anonymous_id("salt", &website(), &ip, UA);

		let other_ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 8));
		assert_ne!(base, anonymous_id("salt", &website(), &other_ip, UA));
		assert_ne!(base, anonymous_id("salt", &Uuid::new_v4(), &ip, UA));
		assert_ne!(base, anonymous_id("salt", &website(), &ip, "curl/8.0"));
		assert_ne!(base, anonymous_id("pepper", &website(), &ip, UA));
	}

	#[test]
	fn test_ipv6_supported() {
		let ip = IpAddr::V6(Ipv6Addr::LOCALHOST);
		let a = anonymous_id("salt", &website(), &ip, UA);
		let b = anonymous_id("salt", &website(), &IpAddr::V4(Ipv4Addr::LOCALHOST), UA);
		assert_ne!(a, b);
	}

	#[test]
	fn test_no_collisions_across_sample() {
		let mut seen = HashSet::new();
		for i in 0..20_000u32 {
			let ip = IpAddr::V4(Ipv4Addr::from(i));
			assert!(seen.insert(anonymous_id("salt", &website(), &ip, UA)));
		}
	}

	#[test]
	fn test_display_roundtrip() {
		let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
		let id = anonymous_id("salt", &website(), &ip, UA);
		let parsed: AnonymousId = id.to_string().parse().unwrap();
		assert_eq!(id, parsed);
		assert!("not-an-id".parse::<AnonymousId>().is_err());
	}

	proptest! {
		#[test]
		fn prop_deterministic(salt in ".{0,64}", ip in any::<u32>(), ua in ".{0,256}") {
			let ip = IpAddr::V4(Ipv4Addr::from(ip));
			prop_assert_eq!(
				anonymous_id(&salt, &website(), &ip, &ua),
				anonymous_id(&salt, &website(), &ip, &ua)
			);
		}

		#[test]
		fn prop_salt_rotation_unlinks(salt_a in "[a-zA-Z0-9_-]{43}", salt_b in "[a-zA-Z0-9_-]{43}", ip in any::<u32>()) {
			prop_assume!(salt_a != salt_b);
			let ip = IpAddr::V4(Ipv4Addr::from(ip));
			prop_assert_ne!(
				anonymous_id(&salt_a, &website(), &ip, UA),
				anonymous_id(&salt_b, &website(), &ip, UA)
			);
		}
	}
}
