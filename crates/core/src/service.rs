//! The session service: single owner of the session store.
//!
//! User commands and host notifications are queued on one unbounded channel
//! and handled strictly one at a time by [`SessionService::run`], so store
//! mutations and reconciliation passes never interleave. [`SessionHandle`] is
//! the cloneable front end used by the popup and the host bindings.

use futures::StreamExt;
use futures::channel::{mpsc, oneshot};
use jarswap_protocol::{RemovedCookie, Session, SessionId, TabId, TabStatus, encode_sessions};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::handlers::{HandlerMap, Subscription};
use crate::host::{EventSink, Host, HostEvent};
use crate::store::{SessionStore, SessionsSnapshot};
use crate::sync;

enum Command {
	Create {
		name: String,
		reply: oneshot::Sender<Result<SessionId>>,
	},
	Delete {
		id: SessionId,
		reply: oneshot::Sender<Result<()>>,
	},
	SwitchActive {
		id: SessionId,
		reply: oneshot::Sender<Result<()>>,
	},
	DismissError,
	Snapshot {
		reply: oneshot::Sender<SessionsSnapshot>,
	},
	Host(HostEvent),
	Shutdown,
}

/// Commands handled before an unmatched delete echo is forgotten.
const ECHO_WINDOW: u64 = 16;

impl Command {
	fn is_user_request(&self) -> bool {
		matches!(self, Self::Create { .. } | Self::Delete { .. } | Self::SwitchActive { .. })
	}
}

/// A removal made by `delete` whose notification has not arrived yet.
struct PendingEcho {
	removal: RemovedCookie,
	expires_at: u64,
}

/// Owns the [`SessionStore`] and drives the host on its behalf.
pub struct SessionService<H> {
	host: H,
	config: SessionConfig,
	store: SessionStore,
	commands: mpsc::UnboundedReceiver<Command>,
	listeners: HandlerMap<SessionsSnapshot>,
	/// False until the stored list has been read; nothing is saved before.
	storage_read: bool,
	persisted_revision: u64,
	published_version: Option<u64>,
	handled: u64,
	pending_echoes: Vec<PendingEcho>,
}

impl<H: Host> SessionService<H> {
	/// Creates the service and its handle. Nothing happens until
	/// [`run`](Self::run) is polled.
	pub fn new(host: H, config: SessionConfig) -> (Self, SessionHandle) {
		let (tx, rx) = mpsc::unbounded();
		let listeners = HandlerMap::new();
		let service = Self {
			host,
			store: SessionStore::new(config.max_name_len),
			config,
			commands: rx,
			listeners: listeners.clone(),
			storage_read: false,
			persisted_revision: 0,
			published_version: None,
			handled: 0,
			pending_echoes: Vec::new(),
		};
		let handle = SessionHandle { commands: tx, listeners };
		(service, handle)
	}

	/// Loads the stored list, then handles commands until
	/// [`SessionHandle::shutdown`] is called or every handle is dropped.
	pub async fn run(mut self) {
		self.load().await;
		self.publish();

		while let Some(command) = self.commands.next().await {
			if matches!(command, Command::Shutdown) {
				break;
			}
			if !self.storage_read && command.is_user_request() {
				self.retry_load().await;
			}
			self.dispatch(command).await;
			self.handled += 1;
			self.expire_echoes();
			self.persist_if_changed().await;
			self.publish();
		}

		debug!(target = "jarswap.service", "session service stopped");
	}

	/// Reads the stored list. On failure the service starts with an empty
	/// list that is not saved until a later read succeeds.
	async fn load(&mut self) {
		match self.read_stored().await {
			Some(sessions) => {
				self.store.load(sessions);
				self.storage_read = true;
				info!(target = "jarswap.service", count = self.store.sessions().len(), "sessions loaded");
			}
			None => {
				self.store.load(Vec::new());
				self.store.set_error(self.config.messages.host_failure.clone());
			}
		}
		self.persisted_revision = self.store.revision();
	}

	async fn retry_load(&mut self) {
		let Some(stored) = self.read_stored().await else {
			return;
		};
		self.store.merge_loaded(stored);
		self.storage_read = true;
		info!(target = "jarswap.service", count = self.store.sessions().len(), "sessions loaded on retry");
	}

	async fn read_stored(&self) -> Option<Vec<Session>> {
		let value = match self.host.load(&self.config.storage_key).await {
			Ok(value) => value,
			Err(err) => {
				warn!(target = "jarswap.service", error = %err, "failed to load sessions");
				return None;
			}
		};
		let decoded = jarswap_protocol::decode_sessions(&value.unwrap_or_default());
		for skipped in &decoded.skipped {
			warn!(
				target = "jarswap.service",
				index = skipped.index,
				reason = %skipped.reason,
				"skipping malformed stored session"
			);
		}
		Some(decoded.sessions)
	}

	async fn dispatch(&mut self, command: Command) {
		match command {
			Command::Create { name, reply } => {
				let result = self.create(&name).await;
				let _ = reply.send(result);
			}
			Command::Delete { id, reply } => {
				let result = self.delete(&id).await;
				let _ = reply.send(result);
			}
			Command::SwitchActive { id, reply } => {
				let result = self.switch_active(&id).await;
				let _ = reply.send(result);
			}
			Command::DismissError => self.store.clear_error(),
			Command::Snapshot { reply } => {
				let _ = reply.send(self.store.snapshot());
			}
			Command::Host(event) => self.on_host_event(event).await,
			Command::Shutdown => {}
		}
	}

	async fn create(&mut self, raw_name: &str) -> Result<SessionId> {
		self.store.clear_error();
		let name = match self.store.validate_name(raw_name) {
			Ok(name) => name,
			Err(err) => {
				debug!(target = "jarswap.service", name = raw_name, error = %err, "rejected session name");
				self.store.set_error(err.to_string());
				return Err(err.into());
			}
		};

		let session = Session::new(name);
		let id = session.id.clone();
		self.store.insert(session);
		self.store.activate(&id)?;

		match self.host.create_tab(self.config.new_tab_url.as_deref()).await {
			Ok(tab) => {
				self.store.assign_tab(&id, tab.id);
				info!(target = "jarswap.service", session_id = %id, tab_id = %tab.id, "session created");
				Ok(id)
			}
			Err(err) => {
				warn!(target = "jarswap.service", session_id = %id, error = %err, "tab creation failed, rolling back session");
				self.store.remove(&id);
				self.store.clear_active();
				self.store.set_error(self.config.messages.tab_create_failed.clone());
				Err(err.into())
			}
		}
	}

	async fn delete(&mut self, id: &SessionId) -> Result<()> {
		self.store.clear_error();
		let Some(session) = self.store.get(id).cloned() else {
			debug!(target = "jarswap.service", session_id = %id, "delete of unknown session ignored");
			return Ok(());
		};

		if let Some(tab_id) = session.tab_id {
			if let Err(err) = self.host.remove_tab(tab_id).await {
				warn!(target = "jarswap.service", session_id = %id, tab_id = %tab_id, error = %err, "failed to close session tab");
			}
		}

		let (removed, failures) = sync::purge(&self.host, &session.cookies).await;
		let expires_at = self.handled + ECHO_WINDOW;
		self.pending_echoes
			.extend(removed.into_iter().map(|removal| PendingEcho { removal, expires_at }));
		if !failures.is_empty() {
			self.store.set_error(self.config.messages.cookie_cleanup_failed.clone());
		}

		self.store.remove(id);
		info!(target = "jarswap.service", session_id = %id, name = %session.name, "session deleted");
		Ok(())
	}

	async fn switch_active(&mut self, id: &SessionId) -> Result<()> {
		self.store.clear_error();
		self.store.activate(id)?;
		let tab_id = self.store.get(id).and_then(|s| s.tab_id);
		debug!(target = "jarswap.service", session_id = %id, "active session switched");
		if let Some(tab_id) = tab_id {
			self.reconcile_tab(tab_id).await;
		}
		Ok(())
	}

	async fn on_host_event(&mut self, event: HostEvent) {
		match event {
			HostEvent::TabCreated(tab) => {
				let unbound = self
					.store
					.active_session()
					.filter(|s| s.tab_id.is_none())
					.map(|s| s.id.clone());
				if let Some(id) = unbound {
					if self.store.find_by_tab(tab.id).is_none() {
						self.store.assign_tab(&id, tab.id);
					}
				}
			}
			HostEvent::TabActivated(tab_id) => self.reconcile_tab(tab_id).await,
			HostEvent::TabUpdated {
				tab_id,
				status: Some(TabStatus::Complete),
			} => self.reconcile_tab(tab_id).await,
			HostEvent::TabUpdated { .. } => {}
			HostEvent::TabRemoved(tab_id) => {
				if let Some(id) = self.store.release_tab(tab_id) {
					debug!(target = "jarswap.service", session_id = %id, tab_id = %tab_id, "session tab closed");
				}
			}
			HostEvent::CookieChanged(change) => {
				if change.removed {
					if let Some(index) = self.pending_echoes.iter().position(|e| e.removal.covers(&change.cookie)) {
						self.pending_echoes.remove(index);
						return;
					}
				}
				self.store.apply_cookie_change(&change);
			}
		}
	}

	/// Runs a reconciliation pass for the active session against `tab_id`.
	async fn reconcile_tab(&mut self, tab_id: TabId) {
		let Some(session) = self.store.active_session().cloned() else {
			return;
		};

		let tab = match self.host.get_tab(tab_id).await {
			Ok(tab) => tab,
			Err(err) => {
				warn!(target = "jarswap.service", tab_id = %tab_id, error = %err, "failed to resolve tab");
				self.store.set_error(self.config.messages.host_failure.clone());
				return;
			}
		};
		let Some(url) = tab.usable_url() else {
			debug!(target = "jarswap.service", tab_id = %tab_id, "tab has no URL, skipping reconciliation");
			return;
		};

		let result = sync::reconcile(&self.host, &mut self.store, &session, url, self.config.reconcile).await;
		if let Err(err) = result {
			warn!(target = "jarswap.service", session_id = %session.id, url, error = %err, "reconciliation failed");
			self.store.set_error(self.config.messages.host_failure.clone());
		}
	}

	fn expire_echoes(&mut self) {
		let handled = self.handled;
		let before = self.pending_echoes.len();
		self.pending_echoes.retain(|e| e.expires_at > handled);
		if self.pending_echoes.len() < before {
			debug!(target = "jarswap.service", expired = before - self.pending_echoes.len(), "forgot unmatched delete echoes");
		}
	}

	async fn persist_if_changed(&mut self) {
		let revision = self.store.revision();
		if revision == self.persisted_revision {
			return;
		}
		if !self.storage_read {
			warn!(target = "jarswap.service", "stored sessions were never read, not saving over them");
			self.persisted_revision = revision;
			self.store.set_error(self.config.messages.host_failure.clone());
			return;
		}
		self.persisted_revision = revision;

		let value = match encode_sessions(self.store.sessions()) {
			Ok(value) => value,
			Err(err) => {
				warn!(target = "jarswap.service", error = %err, "failed to encode sessions");
				return;
			}
		};
		if let Err(err) = self.host.save(&self.config.storage_key, value).await {
			warn!(target = "jarswap.service", error = %err, "failed to persist sessions");
			self.store.set_error(self.config.messages.host_failure.clone());
		}
	}

	fn publish(&mut self) {
		let version = self.store.version();
		if self.published_version == Some(version) {
			return;
		}
		self.published_version = Some(version);
		self.listeners.emit(&self.store.snapshot());
	}
}

/// Cloneable front end of a running [`SessionService`].
#[derive(Clone)]
pub struct SessionHandle {
	commands: mpsc::UnboundedSender<Command>,
	listeners: HandlerMap<SessionsSnapshot>,
}

impl SessionHandle {
	/// Validates `name`, appends a session, activates it and opens its tab.
	pub async fn create(&self, name: impl Into<String>) -> Result<SessionId> {
		let name = name.into();
		self.request(|reply| Command::Create { name, reply }).await?
	}

	/// Deletes a session, closing its tab and purging its cookies. Unknown
	/// ids are ignored.
	pub async fn delete(&self, id: &SessionId) -> Result<()> {
		let id = id.clone();
		self.request(|reply| Command::Delete { id, reply }).await?
	}

	/// Makes `id` the active session and swaps the jar of its tab.
	pub async fn switch_active(&self, id: &SessionId) -> Result<()> {
		let id = id.clone();
		self.request(|reply| Command::SwitchActive { id, reply }).await?
	}

	/// Returns the state after every previously queued command has run.
	pub async fn snapshot(&self) -> Result<SessionsSnapshot> {
		self.request(|reply| Command::Snapshot { reply }).await
	}

	pub fn dismiss_error(&self) {
		self.send(Command::DismissError);
	}

	/// Queues a host notification.
	pub fn notify(&self, event: HostEvent) {
		self.send(Command::Host(event));
	}

	/// Sink for [`Host::subscribe`] that queues every notification.
	pub fn event_sink(&self) -> EventSink {
		let handle = self.clone();
		std::rc::Rc::new(move |event| handle.notify(event))
	}

	/// Calls `listener` with a fresh snapshot after every command that
	/// changed visible state.
	pub fn on_change(&self, listener: impl Fn(&SessionsSnapshot) + 'static) -> Subscription {
		self.listeners.insert(listener)
	}

	/// Stops the service once the commands queued before this one have run.
	pub fn shutdown(&self) {
		self.send(Command::Shutdown);
	}

	async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
		let (tx, rx) = oneshot::channel();
		self.commands
			.unbounded_send(build(tx))
			.map_err(|_| Error::ServiceClosed)?;
		rx.await.map_err(|_| Error::ServiceClosed)
	}

	fn send(&self, command: Command) {
		if self.commands.unbounded_send(command).is_err() {
			debug!(target = "jarswap.service", "session service is gone, dropping command");
		}
	}
}
