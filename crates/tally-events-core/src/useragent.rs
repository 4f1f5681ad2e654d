// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User-agent classification and bot filtering.
//!
//! This is a heuristic. It catches the self-declared crawlers and command
//! line clients that make up most non-human traffic and accepts false
//! negatives for anything that impersonates a real browser.

use aho_corasick::AhoCorasick;
use woothee::parser::Parser;

use crate::dimensions::{Browser, OperatingSystem};
use crate::error::{EventsError, Result};

/// User-agents longer than this are treated as bots.
pub const MAX_USER_AGENT_LENGTH: usize = 256;

/// Substrings that mark a user-agent as a bot, matched case-insensitively.
pub const BOT_FINGERPRINTS: &[&str] = &["bot", "crawl", "scrap", "spider", "spyder", "wget", "curl"];

/// Every real browser still sends this token.
const BROWSER_TOKEN: &[u8] = b"mozilla";

/// Woothee's category for crawlers and HTTP libraries.
const CRAWLER_CATEGORY: &str = "crawler";

/// Product tokens of browsers the grammar reports as their engine family.
const PRODUCT_TOKENS: &[(&str, Browser)] = &[
	("Edg/", Browser::Edge),
	("EdgA/", Browser::Edge),
	("EdgiOS/", Browser::Edge),
	("OPR/", Browser::Opera),
	("OPiOS/", Browser::Opera),
	("SamsungBrowser/", Browser::SamsungInternet),
	("YaBrowser/", Browser::Yandex),
	("Vivaldi/", Browser::Vivaldi),
	("Brave", Browser::Brave),
	("DuckDuckGo/", Browser::DuckDuckGo),
	("Ddg/", Browser::DuckDuckGo),
	("CriOS/", Browser::Chrome),
	("FxiOS/", Browser::Firefox),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserAgentClass {
	pub browser: Browser,
	pub operating_system: OperatingSystem,
	pub is_bot: bool,
}

impl UserAgentClass {
	fn bot() -> Self {
		Self {
			is_bot: true,
			..Default::default()
		}
	}
}

/// Classifies user-agents, built once at startup and shared.
///
/// Bot fingerprints are matched in a single pass regardless of how many
/// there are. Browser and OS families come from the woothee grammar, whose
/// crawler category also marks a bot.
pub struct BotFilter {
	fingerprints: AhoCorasick,
	products: AhoCorasick,
	parser: Parser,
}

impl std::fmt::Debug for BotFilter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BotFilter")
			.field("fingerprints", &self.fingerprints.patterns_len())
			.finish_non_exhaustive()
	}
}

impl BotFilter {
	/// Builds a filter over [`BOT_FINGERPRINTS`].
	pub fn new() -> Result<Self> {
		Self::with_patterns(BOT_FINGERPRINTS)
	}

	pub fn with_patterns(patterns: &[&str]) -> Result<Self> {
		let fingerprints = AhoCorasick::builder()
			.ascii_case_insensitive(true)
			.build(patterns)
			.map_err(|e| EventsError::BotFingerprints(e.to_string()))?;
		let products = AhoCorasick::new(PRODUCT_TOKENS.iter().map(|(token, _)| token))
			.map_err(|e| EventsError::BotFingerprints(e.to_string()))?;

		Ok(Self {
			fingerprints,
			products,
			parser: Parser::new(),
		})
	}

	/// Returns the browser and OS families of `user_agent` and whether it
	/// looks like a bot. Bot results always carry `Other` dimensions.
	#[must_use]
	pub fn classify(&self, user_agent: &str) -> UserAgentClass {
		if user_agent.is_empty() || user_agent.len() > MAX_USER_AGENT_LENGTH {
			return UserAgentClass::bot();
		}

		if self.fingerprints.is_match(user_agent) {
			return UserAgentClass::bot();
		}

		let Some(parsed) = self.parser.parse(user_agent) else {
			return UserAgentClass::bot();
		};
		if parsed.category == CRAWLER_CATEGORY {
			return UserAgentClass::bot();
		}

		let operating_system = operating_system_family(parsed.os);
		let browser = self
			.products
			.find(user_agent)
			.map(|m| PRODUCT_TOKENS[m.pattern().as_usize()].1)
			.unwrap_or_else(|| browser_family(parsed.name));

		if (operating_system == OperatingSystem::Other && browser == Browser::Other)
			|| !has_browser_token(user_agent)
		{
			return UserAgentClass::bot();
		}

		UserAgentClass {
			browser,
			operating_system,
			is_bot: false,
		}
	}
}

fn has_browser_token(user_agent: &str) -> bool {
	user_agent
		.as_bytes()
		.windows(BROWSER_TOKEN.len())
		.any(|window| window.eq_ignore_ascii_case(BROWSER_TOKEN))
}

fn operating_system_family(os: &str) -> OperatingSystem {
	match os {
		"iPhone" | "iPad" | "iPod" | "iOS" => OperatingSystem::Ios,
		"Android" => OperatingSystem::Android,
		"ChromeOS" => OperatingSystem::ChromeOs,
		"Linux" => OperatingSystem::Linux,
		"Mac OSX" | "Mac OS Classic" => OperatingSystem::MacOs,
		os if os.starts_with("Windows") => OperatingSystem::Windows,
		_ => OperatingSystem::Other,
	}
}

fn browser_family(name: &str) -> Browser {
	match name {
		"Chrome" => Browser::Chrome,
		"Safari" => Browser::Safari,
		"Firefox" => Browser::Firefox,
		"Edge" => Browser::Edge,
		"Opera" => Browser::Opera,
		"Internet Explorer" => Browser::InternetExplorer,
		"Vivaldi" => Browser::Vivaldi,
		"Yandex Browser" => Browser::Yandex,
		_ => Browser::Other,
	}
}
