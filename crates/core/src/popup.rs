//! Platform-neutral popup: view model and gesture handling.
//!
//! [`Popup`] keeps only the in-progress session name and the visible panel;
//! everything else comes from the latest [`SessionsSnapshot`]. A renderer
//! turns [`PopupView`] into widgets and feeds [`Gesture`]s back.

use std::cell::RefCell;

use jarswap_protocol::SessionId;
use tracing::debug;

use crate::service::SessionHandle;
use crate::store::SessionsSnapshot;

/// Key that submits the new-session input.
pub const ENTER_KEY: &str = "Enter";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
	#[default]
	Sessions,
	Settings,
}

/// User input understood by the popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gesture {
	/// The new-session input changed.
	Input(String),
	/// A key was pressed in the new-session input.
	KeyDown(String),
	/// The create button was clicked.
	Create,
	Select(SessionId),
	Delete(SessionId),
	ShowPanel(Panel),
	DismissError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
	pub id: SessionId,
	/// Name truncated to the configured width.
	pub label: String,
	pub active: bool,
}

/// Everything a renderer needs to draw the popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupView {
	pub loading: bool,
	pub panel: Panel,
	pub rows: Vec<SessionRow>,
	pub draft: String,
	pub can_create: bool,
	pub error: Option<String>,
	/// Shown on the settings panel.
	pub active_name: Option<String>,
}

#[derive(Debug, Default)]
struct PopupState {
	draft: String,
	panel: Panel,
	snapshot: SessionsSnapshot,
}

pub struct Popup {
	handle: SessionHandle,
	label_width: usize,
	state: RefCell<PopupState>,
}

impl Popup {
	pub fn new(handle: SessionHandle, label_width: usize) -> Self {
		Self {
			handle,
			label_width,
			state: RefCell::new(PopupState::default()),
		}
	}

	/// Replaces the snapshot the view is built from.
	pub fn update(&self, snapshot: &SessionsSnapshot) {
		self.state.borrow_mut().snapshot = snapshot.clone();
	}

	pub fn view(&self) -> PopupView {
		let state = self.state.borrow();
		let snapshot = &state.snapshot;
		PopupView {
			loading: !snapshot.loaded,
			panel: state.panel,
			rows: snapshot
				.sessions
				.iter()
				.map(|s| SessionRow {
					id: s.id.clone(),
					label: truncate_label(&s.name, self.label_width),
					active: snapshot.active.as_ref() == Some(&s.id),
				})
				.collect(),
			draft: state.draft.clone(),
			can_create: !state.draft.trim().is_empty(),
			error: snapshot.error.clone(),
			active_name: snapshot.active_session().map(|s| s.name.clone()),
		}
	}

	/// Applies `gesture`, forwarding session changes to the service.
	///
	/// Failures are not returned: the service reports them through the
	/// snapshot's error banner.
	pub async fn handle(&self, gesture: Gesture) {
		match gesture {
			Gesture::Input(text) => self.state.borrow_mut().draft = text,
			Gesture::KeyDown(key) if key == ENTER_KEY => self.submit().await,
			Gesture::KeyDown(_) => {}
			Gesture::Create => self.submit().await,
			Gesture::Select(id) => {
				if let Err(err) = self.handle.switch_active(&id).await {
					debug!(target = "jarswap.popup", session_id = %id, error = %err, "switch failed");
				}
			}
			Gesture::Delete(id) => {
				if let Err(err) = self.handle.delete(&id).await {
					debug!(target = "jarswap.popup", session_id = %id, error = %err, "delete failed");
				}
			}
			Gesture::ShowPanel(panel) => self.state.borrow_mut().panel = panel,
			Gesture::DismissError => self.handle.dismiss_error(),
		}
	}

	async fn submit(&self) {
		let name = {
			let state = self.state.borrow();
			if state.draft.trim().is_empty() {
				return;
			}
			state.draft.clone()
		};

		match self.handle.create(name).await {
			Ok(_) => self.state.borrow_mut().draft.clear(),
			Err(err) => debug!(target = "jarswap.popup", error = %err, "create failed"),
		}
	}
}

/// Cuts `name` to at most `width` characters.
pub fn truncate_label(name: &str, width: usize) -> String {
	name.chars().take(width).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn truncate_counts_characters() {
		assert_eq!(truncate_label("short", 20), "short");
		assert_eq!(truncate_label("abcdefghijklmnopqrstuvwxyz", 20), "abcdefghijklmnopqrst");
		assert_eq!(truncate_label("ééé", 2), "éé");
	}
}
