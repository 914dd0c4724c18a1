//! Tab types in the shape used by the `chrome.tabs` API.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Browser tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i32);

impl fmt::Display for TabId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl From<i32> for TabId {
	fn from(id: i32) -> Self {
		Self(id)
	}
}

/// Loading status of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabStatus {
	Loading,
	Complete,
	Unloaded,
}

/// The subset of `chrome.tabs.Tab` the extension reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabInfo {
	pub id: TabId,
	/// Absent when the extension lacks permission for the page or the tab has
	/// not committed a navigation yet.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<TabStatus>,
}

impl TabInfo {
	pub fn new(id: impl Into<TabId>, url: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			url: Some(url.into()),
			status: Some(TabStatus::Complete),
		}
	}

	/// Returns the URL if the tab has a usable one.
	pub fn usable_url(&self) -> Option<&str> {
		self.url.as_deref().filter(|url| !url.is_empty())
	}
}
