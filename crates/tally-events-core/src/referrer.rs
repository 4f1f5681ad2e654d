// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use url::Url;

/// Reduces a referrer to a bare hostname.
///
/// The `Referer` header wins over the `?ref=` query value. Returns an empty
/// string for direct traffic: no referrer, an unparsable one, or navigation
/// inside the website's own `primary_domain`.
#[must_use]
pub fn cleanup_referrer(primary_domain: &str, header_referrer: &str, ref_query: &str) -> String {
	let mut referrer = header_referrer.trim().to_lowercase();
	if referrer.is_empty() {
		referrer = ref_query.trim().to_lowercase();
	}
	if referrer.is_empty() {
		return String::new();
	}

	// ?ref= values are usually bare hostnames
	let parsed = if referrer.contains("://") {
		Url::parse(&referrer)
	} else {
		Url::parse(&format!("https://{referrer}"))
	};
	let host = match parsed.ok().as_ref().and_then(Url::host_str) {
		Some(host) => host.to_string(),
		None => return String::new(),
	};

	let host = host.strip_prefix("www.").unwrap_or(&host);
	if host.is_empty() || host == primary_domain.trim().to_lowercase() {
		return String::new();
	}

	host.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_header_referrer() {
		assert_eq!(
			cleanup_referrer("example.com", "https://www.Google.com/search?q=x", ""),
			"google.com"
		);
	}

	#[test]
	fn test_ref_query_fallback() {
		assert_eq!(
			cleanup_referrer("example.com", "", "producthunt.com"),
			"producthunt.com"
		);
		assert_eq!(
			cleanup_referrer("example.com", "", "https://news.ycombinator.com/item?id=1"),
			"news.ycombinator.com"
		);
	}

	#[test]
	fn test_header_wins_over_query() {
		assert_eq!(
			cleanup_referrer("example.com", "https://duckduckgo.com/", "newsletter"),
			"duckduckgo.com"
		);
	}

	#[test]
	fn test_own_domain_is_direct() {
		assert_eq!(cleanup_referrer("example.com", "https://www.example.com/pricing", ""), "");
		assert_eq!(cleanup_referrer("example.com", "https://example.com/", ""), "");
	}

	#[test]
	fn test_empty_and_garbage() {
		assert_eq!(cleanup_referrer("example.com", "", ""), "");
		assert_eq!(cleanup_referrer("example.com", "   ", ""), "");
		assert_eq!(cleanup_referrer("example.com", "http://", ""), "");
		assert_eq!(cleanup_referrer("example.com", "not a url at all", ""), "");
	}
}
