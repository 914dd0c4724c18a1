//! Persisted session records.
//!
//! The whole session list is stored as one JSON array. Loading decodes each
//! entry on its own so a single malformed record is skipped instead of
//! discarding the list.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cookie::Cookie;
use crate::tab::TabId;

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
	/// Generates a fresh random identifier.
	pub fn generate() -> Self {
		Self(uuid::Uuid::new_v4().to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SessionId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl From<String> for SessionId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

/// A named cookie jar, optionally bound to a browser tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	pub id: SessionId,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tab_id: Option<TabId>,
	pub cookies: Vec<Cookie>,
}

impl Session {
	/// Creates an empty session with a generated id.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			id: SessionId::generate(),
			name: name.into(),
			tab_id: None,
			cookies: Vec::new(),
		}
	}

	/// Replaces the cookie with the same name, or appends it.
	pub fn upsert_cookie(&mut self, cookie: Cookie) {
		match self.cookies.iter_mut().find(|c| c.name == cookie.name) {
			Some(existing) => *existing = cookie,
			None => self.cookies.push(cookie),
		}
	}

	/// Removes every cookie with this name. Returns true if any was removed.
	pub fn remove_cookie(&mut self, name: &str) -> bool {
		let before = self.cookies.len();
		self.cookies.retain(|c| c.name != name);
		self.cookies.len() < before
	}
}

/// A stored entry that failed to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
	/// Position in the stored array.
	pub index: usize,
	pub reason: String,
}

/// Result of decoding a stored session list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSessions {
	pub sessions: Vec<Session>,
	pub skipped: Vec<SkippedRecord>,
}

/// Decodes a stored session list.
///
/// `null` decodes to an empty list. A non-array value is reported as one
/// skipped record at index 0.
pub fn decode_sessions(value: &Value) -> DecodedSessions {
	let items = match value {
		Value::Null => return DecodedSessions::default(),
		Value::Array(items) => items,
		other => {
			return DecodedSessions {
				sessions: Vec::new(),
				skipped: vec![SkippedRecord {
					index: 0,
					reason: format!("expected an array of sessions, found {}", kind(other)),
				}],
			};
		}
	};

	let mut decoded = DecodedSessions::default();
	for (index, item) in items.iter().enumerate() {
		match Session::deserialize(item) {
			Ok(session) => decoded.sessions.push(session),
			Err(err) => decoded.skipped.push(SkippedRecord {
				index,
				reason: err.to_string(),
			}),
		}
	}
	decoded
}

/// Encodes a session list for storage.
pub fn encode_sessions(sessions: &[Session]) -> serde_json::Result<Value> {
	serde_json::to_value(sessions)
}

fn kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn generated_ids_are_unique() {
		assert_ne!(SessionId::generate(), SessionId::generate());
	}

	#[test]
	fn session_serializes_with_camel_case_tab_id() {
		let mut session = Session::new("work");
		session.tab_id = Some(TabId(9));
		let json = serde_json::to_value(&session).unwrap();
		assert_eq!(json["tabId"], 9);
		assert_eq!(json["name"], "work");
		assert!(json["cookies"].as_array().unwrap().is_empty());
	}

	#[test]
	fn decode_skips_malformed_entries() {
		let stored = json!([
			{"id": "a", "name": "Alice", "cookies": []},
			{"id": "b", "cookies": []},
			{"name": "NoId", "cookies": []},
			{"id": "c", "name": "NoCookies"},
			{"id": "d", "name": "BadCookies", "cookies": "nope"},
			{"id": "e", "name": "Bob", "tabId": null, "cookies": [
				{"name": "sid", "value": "1", "domain": "x.com", "path": "/"}
			]},
			42
		]);

		let decoded = decode_sessions(&stored);
		let names: Vec<_> = decoded.sessions.iter().map(|s| s.name.as_str()).collect();
		assert_eq!(names, ["Alice", "Bob"]);
		let skipped: Vec<_> = decoded.skipped.iter().map(|s| s.index).collect();
		assert_eq!(skipped, [1, 2, 3, 4, 6]);
	}

	#[test]
	fn decode_null_is_empty() {
		assert_eq!(decode_sessions(&Value::Null), DecodedSessions::default());
	}

	#[test]
	fn decode_non_array_reports_skip() {
		let decoded = decode_sessions(&json!({"sessions": []}));
		assert!(decoded.sessions.is_empty());
		assert_eq!(decoded.skipped.len(), 1);
		assert!(decoded.skipped[0].reason.contains("an object"));
	}

	#[test]
	fn encode_then_decode_preserves_list() {
		let mut first = Session::new("one");
		first.tab_id = Some(TabId(4));
		first.upsert_cookie(Cookie::new("sid", "v", "example.com").secure(true));
		let sessions = vec![first, Session::new("two")];

		let decoded = decode_sessions(&encode_sessions(&sessions).unwrap());
		assert_eq!(decoded.sessions, sessions);
		assert!(decoded.skipped.is_empty());
	}

	#[test]
	fn upsert_replaces_by_name() {
		let mut session = Session::new("s");
		session.upsert_cookie(Cookie::new("a", "1", "x.com"));
		session.upsert_cookie(Cookie::new("b", "2", "x.com"));
		session.upsert_cookie(Cookie::new("a", "3", "x.com"));
		let values: Vec<_> = session.cookies.iter().map(|c| c.value.as_str()).collect();
		assert_eq!(values, ["3", "2"]);
		assert!(session.remove_cookie("a"));
		assert!(!session.remove_cookie("a"));
	}
}
