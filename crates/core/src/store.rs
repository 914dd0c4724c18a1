//! In-memory session list, active selection and error banner.
//!
//! [`SessionStore`] is plain synchronous state owned by the
//! [`SessionService`](crate::SessionService); every mutation goes through it.
//! Two counters track change: `revision` moves when the persisted list
//! changes, `version` when anything a view renders changes.

use jarswap_protocol::{Cookie, CookieChange, Session, SessionId, TabId};
use tracing::{debug, warn};

use crate::error::{Error, Result, ValidationError};

/// Immutable copy of the store, handed to views and callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionsSnapshot {
	pub sessions: Vec<Session>,
	pub active: Option<SessionId>,
	pub error: Option<String>,
	/// False until the stored list has been read.
	pub loaded: bool,
}

impl SessionsSnapshot {
	pub fn get(&self, id: &SessionId) -> Option<&Session> {
		self.sessions.iter().find(|s| &s.id == id)
	}

	pub fn active_session(&self) -> Option<&Session> {
		self.active.as_ref().and_then(|id| self.get(id))
	}

	pub fn find_by_name(&self, name: &str) -> Option<&Session> {
		self.sessions.iter().find(|s| s.name == name)
	}
}

#[derive(Debug)]
pub struct SessionStore {
	sessions: Vec<Session>,
	active: Option<SessionId>,
	error: Option<String>,
	loaded: bool,
	max_name_len: usize,
	revision: u64,
	version: u64,
}

impl SessionStore {
	pub fn new(max_name_len: usize) -> Self {
		Self {
			sessions: Vec::new(),
			active: None,
			error: None,
			loaded: false,
			max_name_len,
			revision: 0,
			version: 0,
		}
	}

	/// Trims `raw` and checks it is non-empty, within the length bound and not
	/// already taken (case-sensitive).
	pub fn validate_name(&self, raw: &str) -> std::result::Result<String, ValidationError> {
		check_name(raw, self.max_name_len, &self.sessions)
	}

	pub fn sessions(&self) -> &[Session] {
		&self.sessions
	}

	pub fn get(&self, id: &SessionId) -> Option<&Session> {
		self.sessions.iter().find(|s| &s.id == id)
	}

	fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
		self.sessions.iter_mut().find(|s| &s.id == id)
	}

	pub fn active_id(&self) -> Option<&SessionId> {
		self.active.as_ref()
	}

	pub fn active_session(&self) -> Option<&Session> {
		self.active.as_ref().and_then(|id| self.get(id))
	}

	pub fn find_by_tab(&self, tab_id: TabId) -> Option<&Session> {
		self.sessions.iter().find(|s| s.tab_id == Some(tab_id))
	}

	pub fn is_loaded(&self) -> bool {
		self.loaded
	}

	/// Installs the list read from storage and activates its first entry.
	/// Entries that [`admit_stored`](Self::admit_stored) rejects are dropped.
	///
	/// Does not move the revision: the loaded list is already persisted.
	pub fn load(&mut self, sessions: Vec<Session>) {
		let sessions = self.admit_stored(sessions);
		self.active = sessions.first().map(|s| s.id.clone());
		self.sessions = sessions;
		self.loaded = true;
		self.version += 1;
	}

	/// Puts a late-read stored list in front of the sessions created while
	/// storage was unreadable. Those keep their place only if neither their
	/// id nor their name is already stored. The selection survives when its
	/// session does, otherwise the first session becomes active.
	pub fn merge_loaded(&mut self, stored: Vec<Session>) {
		let mut merged = self.admit_stored(stored);
		let unsaved = std::mem::take(&mut self.sessions);
		let had_unsaved = !unsaved.is_empty();
		for session in unsaved {
			if merged.iter().any(|s| s.id == session.id || s.name == session.name) {
				warn!(target = "jarswap.store", session_id = %session.id, name = %session.name, "dropping unsaved session that clashes with a stored one");
				continue;
			}
			merged.push(session);
		}
		self.sessions = merged;
		self.loaded = true;

		let keep_active = self.active.as_ref().is_some_and(|id| self.get(id).is_some());
		if !keep_active {
			self.active = self.sessions.first().map(|s| s.id.clone());
		}
		if had_unsaved {
			self.touch_list();
		} else {
			self.version += 1;
		}
	}

	/// Keeps the stored sessions a user could have created: a non-blank
	/// name within the length bound, and an id and name not used by an
	/// earlier entry.
	fn admit_stored(&self, stored: Vec<Session>) -> Vec<Session> {
		let mut admitted: Vec<Session> = Vec::with_capacity(stored.len());
		for session in stored {
			if admitted.iter().any(|s| s.id == session.id) {
				warn!(target = "jarswap.store", session_id = %session.id, "skipping stored session with a repeated id");
				continue;
			}
			if let Err(err) = check_name(&session.name, self.max_name_len, &admitted) {
				warn!(target = "jarswap.store", session_id = %session.id, error = %err, "skipping stored session with an invalid name");
				continue;
			}
			admitted.push(session);
		}
		admitted
	}

	/// Appends a session. Callers validate the name first.
	pub fn insert(&mut self, session: Session) {
		self.sessions.push(session);
		self.touch_list();
	}

	/// Removes a session. If it was active, the first remaining session
	/// becomes active, or the selection clears when none remain.
	pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
		let index = self.sessions.iter().position(|s| &s.id == id)?;
		let removed = self.sessions.remove(index);
		if self.active.as_ref() == Some(id) {
			self.active = self.sessions.first().map(|s| s.id.clone());
		}
		self.touch_list();
		Some(removed)
	}

	/// Makes `id` the active session. Unknown ids are rejected.
	pub fn activate(&mut self, id: &SessionId) -> Result<()> {
		if self.get(id).is_none() {
			return Err(Error::UnknownSession(id.clone()));
		}
		if self.active.as_ref() != Some(id) {
			self.active = Some(id.clone());
			self.version += 1;
		}
		Ok(())
	}

	pub fn clear_active(&mut self) {
		if self.active.take().is_some() {
			self.version += 1;
		}
	}

	/// Binds `tab_id` to a session. Returns false for unknown sessions.
	pub fn assign_tab(&mut self, id: &SessionId, tab_id: TabId) -> bool {
		let Some(session) = self.get_mut(id) else {
			return false;
		};
		if session.tab_id == Some(tab_id) {
			return true;
		}
		session.tab_id = Some(tab_id);
		self.touch_list();
		true
	}

	/// Unbinds a closed tab from whichever session owned it.
	pub fn release_tab(&mut self, tab_id: TabId) -> Option<SessionId> {
		let session = self.sessions.iter_mut().find(|s| s.tab_id == Some(tab_id))?;
		session.tab_id = None;
		let id = session.id.clone();
		self.touch_list();
		Some(id)
	}

	/// Overwrites a session's recorded cookies.
	pub fn record_cookies(&mut self, id: &SessionId, cookies: Vec<Cookie>) -> bool {
		let Some(session) = self.get_mut(id) else {
			return false;
		};
		if session.cookies != cookies {
			session.cookies = cookies;
			self.touch_list();
		}
		true
	}

	/// Mirrors a live cookie change onto the active session: removal drops
	/// the cookie by name, a set replaces it by name or appends it.
	///
	/// Returns true if the recorded list changed.
	pub fn apply_cookie_change(&mut self, change: &CookieChange) -> bool {
		let Some(id) = self.active.clone() else {
			debug!(target = "jarswap.store", cookie = %change.cookie.name, "no active session, ignoring cookie change");
			return false;
		};
		let Some(session) = self.get_mut(&id) else {
			return false;
		};

		let changed = if change.removed {
			session.remove_cookie(&change.cookie.name)
		} else if session.cookies.iter().any(|c| c == &change.cookie) {
			false
		} else {
			session.upsert_cookie(change.cookie.clone());
			true
		};
		if changed {
			self.touch_list();
		}
		changed
	}

	pub fn error(&self) -> Option<&str> {
		self.error.as_deref()
	}

	/// Shows `message` in the banner, replacing any previous one.
	pub fn set_error(&mut self, message: impl Into<String>) {
		self.error = Some(message.into());
		self.version += 1;
	}

	pub fn clear_error(&mut self) {
		if self.error.take().is_some() {
			self.version += 1;
		}
	}

	/// Moves whenever the persisted list changes.
	pub fn revision(&self) -> u64 {
		self.revision
	}

	/// Moves whenever anything in [`SessionsSnapshot`] changes.
	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn snapshot(&self) -> SessionsSnapshot {
		SessionsSnapshot {
			sessions: self.sessions.clone(),
			active: self.active.clone(),
			error: self.error.clone(),
			loaded: self.loaded,
		}
	}

	fn touch_list(&mut self) {
		self.revision += 1;
		self.version += 1;
	}
}

fn check_name(raw: &str, max_len: usize, taken: &[Session]) -> std::result::Result<String, ValidationError> {
	let name = raw.trim();
	if name.is_empty() {
		return Err(ValidationError::Empty);
	}
	if name.chars().count() > max_len {
		return Err(ValidationError::TooLong { max: max_len });
	}
	if taken.iter().any(|s| s.name == name) {
		return Err(ValidationError::Duplicate(name.to_string()));
	}
	Ok(name.to_string())
}

#[cfg(test)]
mod tests {
	use jarswap_protocol::ChangeCause;

	use super::*;
	use crate::config::MAX_NAME_LEN;

	fn store_with(names: &[&str]) -> SessionStore {
		let mut store = SessionStore::new(MAX_NAME_LEN);
		store.load(names.iter().map(|n| Session::new(*n)).collect());
		store
	}

	fn change(removed: bool, cookie: Cookie) -> CookieChange {
		CookieChange {
			removed,
			cookie,
			cause: ChangeCause::Explicit,
		}
	}

	#[test]
	fn validate_trims_and_accepts() {
		let store = store_with(&["Alice"]);
		assert_eq!(store.validate_name("  Bob  ").unwrap(), "Bob");
		assert_eq!(store.validate_name("alice").unwrap(), "alice");
	}

	#[test]
	fn validate_rejects_empty_long_and_duplicate() {
		let store = store_with(&["Alice"]);
		assert_eq!(store.validate_name(""), Err(ValidationError::Empty));
		assert_eq!(store.validate_name(" \t "), Err(ValidationError::Empty));
		assert_eq!(
			store.validate_name(&"x".repeat(21)),
			Err(ValidationError::TooLong { max: 20 })
		);
		assert_eq!(
			store.validate_name(" Alice "),
			Err(ValidationError::Duplicate("Alice".into()))
		);
	}

	#[test]
	fn length_bound_counts_characters() {
		let store = store_with(&[]);
		assert!(store.validate_name(&"é".repeat(20)).is_ok());
		assert!(store.validate_name(&"é".repeat(21)).is_err());
	}

	#[test]
	fn load_activates_first_without_moving_revision() {
		let store = store_with(&["a", "b"]);
		assert_eq!(store.active_session().unwrap().name, "a");
		assert_eq!(store.revision(), 0);
		assert!(store.is_loaded());
	}

	#[test]
	fn load_skips_names_that_could_not_have_been_created() {
		let store = store_with(&["Home", "", "   ", "Home", "An exceptionally long name", "Work"]);
		let names: Vec<_> = store.sessions().iter().map(|s| s.name.as_str()).collect();
		assert_eq!(names, ["Home", "Work"]);
		assert_eq!(store.active_session().unwrap().name, "Home");
	}

	#[test]
	fn load_skips_repeated_ids() {
		let home = Session::new("Home");
		let mut copy = Session::new("Copy");
		copy.id = home.id.clone();
		let mut store = SessionStore::new(MAX_NAME_LEN);
		store.load(vec![home, copy]);
		assert_eq!(store.sessions().len(), 1);
		assert_eq!(store.sessions()[0].name, "Home");
	}

	#[test]
	fn merge_puts_stored_sessions_first() {
		let mut store = store_with(&[]);
		store.insert(Session::new("New"));
		store.insert(Session::new("Work"));
		let new = store.sessions()[0].id.clone();
		store.activate(&new).unwrap();
		let revision = store.revision();

		store.merge_loaded(vec![Session::new("Home"), Session::new("Work")]);

		let names: Vec<_> = store.sessions().iter().map(|s| s.name.as_str()).collect();
		assert_eq!(names, ["Home", "Work", "New"]);
		assert_eq!(store.active_id(), Some(&new));
		assert!(store.revision() > revision);
	}

	#[test]
	fn merge_without_unsaved_sessions_keeps_the_revision() {
		let mut store = store_with(&[]);
		store.merge_loaded(vec![Session::new("Home")]);
		assert_eq!(store.revision(), 0);
		assert_eq!(store.active_session().unwrap().name, "Home");
	}

	#[test]
	fn removing_active_falls_back_to_first_remaining() {
		let mut store = store_with(&["a", "b", "c"]);
		let b = store.sessions()[1].id.clone();
		store.activate(&b).unwrap();

		store.remove(&b).unwrap();
		assert_eq!(store.active_session().unwrap().name, "a");

		let a = store.sessions()[0].id.clone();
		let c = store.sessions()[1].id.clone();
		store.remove(&a);
		assert_eq!(store.active_id(), Some(&c));
		store.remove(&c);
		assert_eq!(store.active_id(), None);
	}

	#[test]
	fn removing_inactive_keeps_selection() {
		let mut store = store_with(&["a", "b"]);
		let b = store.sessions()[1].id.clone();
		store.remove(&b);
		assert_eq!(store.active_session().unwrap().name, "a");
	}

	#[test]
	fn remove_unknown_is_noop() {
		let mut store = store_with(&["a"]);
		let revision = store.revision();
		assert!(store.remove(&SessionId::from("missing")).is_none());
		assert_eq!(store.revision(), revision);
		assert_eq!(store.sessions().len(), 1);
	}

	#[test]
	fn activate_rejects_unknown_id() {
		let mut store = store_with(&["a"]);
		let err = store.activate(&SessionId::from("nope")).unwrap_err();
		assert!(matches!(err, Error::UnknownSession(_)));
		assert_eq!(store.active_session().unwrap().name, "a");
	}

	#[test]
	fn cookie_changes_apply_to_active_session() {
		let mut store = store_with(&["a", "b"]);
		let a = store.sessions()[0].id.clone();

		assert!(store.apply_cookie_change(&change(false, Cookie::new("sid", "1", "x.com"))));
		assert!(store.apply_cookie_change(&change(false, Cookie::new("sid", "2", "x.com"))));
		assert!(!store.apply_cookie_change(&change(false, Cookie::new("sid", "2", "x.com"))));
		assert_eq!(store.get(&a).unwrap().cookies[0].value, "2");
		assert!(store.sessions()[1].cookies.is_empty());

		assert!(store.apply_cookie_change(&change(true, Cookie::new("sid", "2", "x.com"))));
		assert!(store.get(&a).unwrap().cookies.is_empty());
	}

	#[test]
	fn cookie_change_without_active_session_is_ignored() {
		let mut store = SessionStore::new(MAX_NAME_LEN);
		store.load(Vec::new());
		assert!(!store.apply_cookie_change(&change(false, Cookie::new("sid", "1", "x.com"))));
	}

	#[test]
	fn tab_binding_round_trip() {
		let mut store = store_with(&["a"]);
		let a = store.sessions()[0].id.clone();
		assert!(store.assign_tab(&a, TabId(5)));
		assert_eq!(store.find_by_tab(TabId(5)).unwrap().id, a);
		assert_eq!(store.release_tab(TabId(5)), Some(a.clone()));
		assert_eq!(store.get(&a).unwrap().tab_id, None);
		assert_eq!(store.release_tab(TabId(5)), None);
	}

	#[test]
	fn error_banner_keeps_latest_message() {
		let mut store = store_with(&[]);
		store.set_error("first");
		store.set_error("second");
		assert_eq!(store.error(), Some("second"));
		let version = store.version();
		store.clear_error();
		assert_eq!(store.error(), None);
		assert!(store.version() > version);
	}
}
