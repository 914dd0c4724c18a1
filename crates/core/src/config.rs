//! Runtime configuration.
//!
//! Loaded once at startup from the host's storage under [`CONFIG_KEY`]. Every
//! field has a default, so a partial or missing config is valid.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::host::Host;

/// Storage key holding the optional config object.
pub const CONFIG_KEY: &str = "jarswapConfig";

/// Default storage key for the persisted session list.
pub const DEFAULT_STORAGE_KEY: &str = "sessions";

/// Longest accepted session name, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// How a reconciliation pass treats cookies already in the jar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
	/// Record the live cookies onto the session first, then impose the
	/// session's previous cookie set.
	///
	/// A session with no recorded cookies absorbs whatever the jar held for
	/// the URL until the removal notifications arrive.
	#[default]
	CaptureThenImpose,
	/// Impose the recorded set without recording live cookies first.
	ImposeOnly,
}

/// User-visible messages for host failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Messages {
	pub host_failure: String,
	pub tab_create_failed: String,
	pub cookie_cleanup_failed: String,
}

impl Default for Messages {
	fn default() -> Self {
		Self {
			host_failure: "Something went wrong while syncing cookies. Please try again.".into(),
			tab_create_failed: "Could not open a tab for the new session.".into(),
			cookie_cleanup_failed: "Some cookies of the deleted session could not be removed.".into(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
	/// Storage key of the persisted session list.
	pub storage_key: String,
	/// Longest accepted session name; also the label truncation width.
	pub max_name_len: usize,
	/// URL opened for a new session; the browser's new-tab page when unset.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub new_tab_url: Option<String>,
	pub reconcile: ReconcileMode,
	/// 0 = errors only, 1 = info, 2+ = debug.
	pub log_level: u8,
	pub messages: Messages,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			storage_key: DEFAULT_STORAGE_KEY.into(),
			max_name_len: MAX_NAME_LEN,
			new_tab_url: None,
			reconcile: ReconcileMode::default(),
			log_level: 1,
			messages: Messages::default(),
		}
	}
}

/// Where a config returned by [`SessionConfig::read`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
	Stored,
	/// Nothing stored; defaults apply.
	Missing,
	/// The stored value did not decode; defaults apply.
	Malformed(String),
	/// Storage could not be read; defaults apply.
	Unreadable(String),
}

impl ConfigSource {
	/// Logs how the config was obtained. Callers that install a subscriber
	/// after reading the config call this once it is up.
	pub fn log(&self) {
		match self {
			Self::Stored => debug!(target = "jarswap.config", "using stored config"),
			Self::Missing => debug!(target = "jarswap.config", "no stored config, using defaults"),
			Self::Malformed(err) => warn!(target = "jarswap.config", error = %err, "malformed config, using defaults"),
			Self::Unreadable(err) => warn!(target = "jarswap.config", error = %err, "failed to read config, using defaults"),
		}
	}
}

impl SessionConfig {
	pub fn from_value(value: &Value) -> serde_json::Result<Self> {
		Self::deserialize(value)
	}

	/// Reads the config stored under [`CONFIG_KEY`] without logging, falling
	/// back to defaults when it is missing, unreadable or malformed.
	pub async fn read<H: Host + ?Sized>(host: &H) -> (Self, ConfigSource) {
		match host.load(CONFIG_KEY).await {
			Ok(Some(value)) => match Self::from_value(&value) {
				Ok(config) => (config, ConfigSource::Stored),
				Err(err) => (Self::default(), ConfigSource::Malformed(err.to_string())),
			},
			Ok(None) => (Self::default(), ConfigSource::Missing),
			Err(err) => (Self::default(), ConfigSource::Unreadable(err.to_string())),
		}
	}

	/// [`read`](Self::read), then logs the outcome.
	pub async fn load<H: Host + ?Sized>(host: &H) -> Self {
		let (config, source) = Self::read(host).await;
		source.log();
		config
	}
}
