// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Browser and operating system dimensions.
//!
//! Both are stored as small integer codes; the discriminant order is part of
//! the storage format. Anything unrecognized maps to `Other` (code 0).

use serde::{Deserialize, Serialize};

use crate::error::{EventsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Browser {
	#[default]
	#[serde(rename = "other")]
	Other = 0,
	Chrome = 1,
	Safari = 2,
	Firefox = 3,
	Edge = 4,
	Opera = 5,
	#[serde(rename = "Internet Explorer")]
	InternetExplorer = 6,
	#[serde(rename = "Samsung Internet")]
	SamsungInternet = 7,
	Brave = 8,
	#[serde(rename = "DuckDuckGo Privacy Browser")]
	DuckDuckGo = 9,
	#[serde(rename = "Yandex Browser")]
	Yandex = 10,
	Vivaldi = 11,
}

impl Browser {
	pub const ALL: [Browser; 12] = [
		Browser::Other,
		Browser::Chrome,
		Browser::Safari,
		Browser::Firefox,
		Browser::Edge,
		Browser::Opera,
		Browser::InternetExplorer,
		Browser::SamsungInternet,
		Browser::Brave,
		Browser::DuckDuckGo,
		Browser::Yandex,
		Browser::Vivaldi,
	];

	#[must_use]
	pub fn code(self) -> i64 {
		self as i64
	}

	pub fn from_code(code: i64) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|b| b.code() == code)
			.ok_or_else(|| EventsError::InvalidBrowser(code.to_string()))
	}

	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Browser::Other => "other",
			Browser::Chrome => "Chrome",
			Browser::Safari => "Safari",
			Browser::Firefox => "Firefox",
			Browser::Edge => "Edge",
			Browser::Opera => "Opera",
			Browser::InternetExplorer => "Internet Explorer",
			Browser::SamsungInternet => "Samsung Internet",
			Browser::Brave => "Brave",
			Browser::DuckDuckGo => "DuckDuckGo Privacy Browser",
			Browser::Yandex => "Yandex Browser",
			Browser::Vivaldi => "Vivaldi",
		}
	}
}

impl std::fmt::Display for Browser {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Browser {
	type Err = EventsError;

	fn from_str(s: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|b| b.as_str() == s)
			.ok_or_else(|| EventsError::InvalidBrowser(s.to_string()))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OperatingSystem {
	#[default]
	#[serde(rename = "other")]
	Other = 0,
	Linux = 1,
	#[serde(rename = "macOS")]
	MacOs = 2,
	Windows = 3,
	Android = 4,
	#[serde(rename = "iOS")]
	Ios = 5,
	#[serde(rename = "ChromeOS")]
	ChromeOs = 6,
}

impl OperatingSystem {
	pub const ALL: [OperatingSystem; 7] = [
		OperatingSystem::Other,
		OperatingSystem::Linux,
		OperatingSystem::MacOs,
		OperatingSystem::Windows,
		OperatingSystem::Android,
		OperatingSystem::Ios,
		OperatingSystem::ChromeOs,
	];

	#[must_use]
	pub fn code(self) -> i64 {
		self as i64
	}

	pub fn from_code(code: i64) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|os| os.code() == code)
			.ok_or_else(|| EventsError::InvalidOperatingSystem(code.to_string()))
	}

	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			OperatingSystem::Other => "other",
			OperatingSystem::Linux => "Linux",
			OperatingSystem::MacOs => "macOS",
			OperatingSystem::Windows => "Windows",
			OperatingSystem::Android => "Android",
			OperatingSystem::Ios => "iOS",
			OperatingSystem::ChromeOs => "ChromeOS",
		}
	}
}

impl std::fmt::Display for OperatingSystem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for OperatingSystem {
	type Err = EventsError;

	fn from_str(s: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|os| os.as_str() == s)
			.ok_or_else(|| EventsError::InvalidOperatingSystem(s.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_browser_codes_follow_declaration_order() {
		for (i, browser) in Browser::ALL.into_iter().enumerate() {
			assert_eq!(browser.code(), i as i64);
			assert_eq!(Browser::from_code(i as i64).unwrap(), browser);
		}
		assert!(Browser::from_code(99).is_err());
	}

	#[test]
	fn test_os_codes_follow_declaration_order() {
		for (i, os) in OperatingSystem::ALL.into_iter().enumerate() {
			assert_eq!(os.code(), i as i64);
			assert_eq!(OperatingSystem::from_code(i as i64).unwrap(), os);
		}
		assert!(OperatingSystem::from_code(7).is_err());
	}

	#[test]
	fn test_serde_uses_display_labels() {
		assert_eq!(
			serde_json::to_string(&Browser::InternetExplorer).unwrap(),
			"\"Internet Explorer\""
		);
		assert_eq!(serde_json::to_string(&Browser::Other).unwrap(), "\"other\"");
		assert_eq!(
			serde_json::to_string(&OperatingSystem::MacOs).unwrap(),
			"\"macOS\""
		);
		for browser in Browser::ALL {
			let json = serde_json::to_string(&browser).unwrap();
			assert_eq!(json, format!("\"{}\"", browser));
		}
		for os in OperatingSystem::ALL {
			let json = serde_json::to_string(&os).unwrap();
			assert_eq!(json, format!("\"{}\"", os));
		}
	}

	#[test]
	fn test_parse_labels() {
		assert_eq!("Chrome".parse::<Browser>().unwrap(), Browser::Chrome);
		assert_eq!("iOS".parse::<OperatingSystem>().unwrap(), OperatingSystem::Ios);
		assert!("Netscape".parse::<Browser>().is_err());
	}
}
