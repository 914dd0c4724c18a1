//! Testing infrastructure: an in-memory [`Host`].
//!
//! [`MockHost`] keeps tabs, a cookie jar and key-value storage in memory,
//! emits the notifications a browser would, records every call and can be
//! told to fail any operation.
//!
//! ```ignore
//! let host = MockHost::new();
//! let tab = host.open_tab("https://example.com/");
//! host.put_cookie(Cookie::new("sid", "1", "example.com"));
//!
//! let (service, handle) = SessionService::new(host.clone(), SessionConfig::default());
//! let _events = host.subscribe(handle.event_sink());
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;
use jarswap_protocol::{ChangeCause, Cookie, CookieChange, RemovedCookie, SetCookieDetails, TabId, TabInfo, TabStatus};
use serde_json::Value;

use crate::error::{HostError, HostResult};
use crate::handlers::{HandlerMap, Subscription};
use crate::host::{EventSink, Host, HostEvent};

/// URL given to tabs created without one.
pub const NEW_TAB_URL: &str = "chrome://newtab/";

/// Host operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
	CreateTab,
	RemoveTab,
	GetTab,
	GetCookies,
	SetCookie,
	RemoveCookie,
	Load,
	Save,
}

/// A recorded host call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
	CreateTab { url: Option<String> },
	RemoveTab(TabId),
	GetTab(TabId),
	GetCookies { url: String },
	SetCookie { name: String, value: String },
	RemoveCookie { url: String, name: String },
	Load { key: String },
	Save { key: String },
}

#[derive(Debug)]
struct MockState {
	next_tab: i32,
	tabs: BTreeMap<TabId, TabInfo>,
	jar: Vec<Cookie>,
	storage: HashMap<String, Value>,
	failing: HashSet<MockOp>,
	calls: Vec<MockCall>,
}

impl Default for MockState {
	fn default() -> Self {
		Self {
			next_tab: 1,
			tabs: BTreeMap::new(),
			jar: Vec::new(),
			storage: HashMap::new(),
			failing: HashSet::new(),
			calls: Vec::new(),
		}
	}
}

/// In-memory browser. Clones share state.
#[derive(Clone, Default)]
pub struct MockHost {
	state: Rc<RefCell<MockState>>,
	listeners: HandlerMap<HostEvent>,
}

impl MockHost {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every later call of `op` fail.
	pub fn fail(&self, op: MockOp) {
		self.state.borrow_mut().failing.insert(op);
	}

	pub fn recover(&self, op: MockOp) {
		self.state.borrow_mut().failing.remove(&op);
	}

	/// Every call made so far, in order.
	pub fn calls(&self) -> Vec<MockCall> {
		self.state.borrow().calls.clone()
	}

	pub fn clear_calls(&self) {
		self.state.borrow_mut().calls.clear();
	}

	/// Opens a tab at `url` without emitting notifications.
	pub fn open_tab(&self, url: &str) -> TabId {
		let mut state = self.state.borrow_mut();
		let id = TabId(state.next_tab);
		state.next_tab += 1;
		state.tabs.insert(id, TabInfo::new(id, url));
		id
	}

	pub fn tab(&self, tab_id: TabId) -> Option<TabInfo> {
		self.state.borrow().tabs.get(&tab_id).cloned()
	}

	pub fn tab_ids(&self) -> Vec<TabId> {
		self.state.borrow().tabs.keys().copied().collect()
	}

	/// Points `tab_id` at `url` and emits a navigation-complete notification.
	pub fn navigate(&self, tab_id: TabId, url: &str) {
		if let Some(tab) = self.state.borrow_mut().tabs.get_mut(&tab_id) {
			tab.url = Some(url.to_string());
			tab.status = Some(TabStatus::Complete);
		}
		self.emit(HostEvent::TabUpdated {
			tab_id,
			status: Some(TabStatus::Complete),
		});
	}

	/// Emits a tab-activated notification.
	pub fn activate(&self, tab_id: TabId) {
		self.emit(HostEvent::TabActivated(tab_id));
	}

	/// Puts a cookie in the jar without emitting a notification.
	pub fn put_cookie(&self, cookie: Cookie) {
		store_cookie(&mut self.state.borrow_mut().jar, cookie);
	}

	/// Sets a cookie the way a web page would, emitting a change notification.
	pub fn page_sets_cookie(&self, cookie: Cookie) {
		self.put_cookie(cookie.clone());
		self.emit(HostEvent::CookieChanged(CookieChange {
			removed: false,
			cookie,
			cause: ChangeCause::Explicit,
		}));
	}

	/// The whole jar.
	pub fn jar(&self) -> Vec<Cookie> {
		self.state.borrow().jar.clone()
	}

	/// Cookies the browser would send to `url`.
	pub fn cookies_for(&self, url: &str) -> Vec<Cookie> {
		self.state.borrow().jar.iter().filter(|c| c.matches_url(url)).cloned().collect()
	}

	pub fn stored(&self, key: &str) -> Option<Value> {
		self.state.borrow().storage.get(key).cloned()
	}

	pub fn put_stored(&self, key: &str, value: Value) {
		self.state.borrow_mut().storage.insert(key.to_string(), value);
	}

	pub fn subscriber_count(&self) -> usize {
		self.listeners.len()
	}

	fn emit(&self, event: HostEvent) {
		self.listeners.emit(&event);
	}

	/// Records `call` and fails it if `op` is marked failing.
	fn enter(&self, op: MockOp, call: MockCall) -> HostResult<()> {
		let mut state = self.state.borrow_mut();
		state.calls.push(call);
		if !state.failing.contains(&op) {
			return Ok(());
		}
		let message = format!("{op:?} failed");
		Err(match op {
			MockOp::CreateTab | MockOp::RemoveTab | MockOp::GetTab => HostError::Tabs(message),
			MockOp::GetCookies | MockOp::SetCookie | MockOp::RemoveCookie => HostError::Cookies(message),
			MockOp::Load | MockOp::Save => HostError::Storage(message),
		})
	}
}

fn store_cookie(jar: &mut Vec<Cookie>, cookie: Cookie) {
	match jar.iter_mut().find(|c| c.same_slot(&cookie)) {
		Some(existing) => *existing = cookie,
		None => jar.push(cookie),
	}
}

#[async_trait(?Send)]
impl Host for MockHost {
	async fn create_tab(&self, url: Option<&str>) -> HostResult<TabInfo> {
		self.enter(MockOp::CreateTab, MockCall::CreateTab {
			url: url.map(str::to_string),
		})?;
		let id = self.open_tab(url.unwrap_or(NEW_TAB_URL));
		let tab = TabInfo::new(id, url.unwrap_or(NEW_TAB_URL));
		self.emit(HostEvent::TabCreated(tab.clone()));
		self.emit(HostEvent::TabActivated(id));
		Ok(tab)
	}

	async fn remove_tab(&self, tab_id: TabId) -> HostResult<()> {
		self.enter(MockOp::RemoveTab, MockCall::RemoveTab(tab_id))?;
		if self.state.borrow_mut().tabs.remove(&tab_id).is_none() {
			return Err(HostError::Tabs(format!("No tab with id: {tab_id}")));
		}
		self.emit(HostEvent::TabRemoved(tab_id));
		Ok(())
	}

	async fn get_tab(&self, tab_id: TabId) -> HostResult<TabInfo> {
		self.enter(MockOp::GetTab, MockCall::GetTab(tab_id))?;
		self.tab(tab_id)
			.ok_or_else(|| HostError::Tabs(format!("No tab with id: {tab_id}")))
	}

	async fn get_all_cookies(&self, url: &str) -> HostResult<Vec<Cookie>> {
		self.enter(MockOp::GetCookies, MockCall::GetCookies { url: url.to_string() })?;
		Ok(self.cookies_for(url))
	}

	async fn set_cookie(&self, details: &SetCookieDetails) -> HostResult<()> {
		self.enter(MockOp::SetCookie, MockCall::SetCookie {
			name: details.name.clone(),
			value: details.value.clone(),
		})?;
		let cookie = details.to_cookie();
		self.put_cookie(cookie.clone());
		self.emit(HostEvent::CookieChanged(CookieChange {
			removed: false,
			cookie,
			cause: ChangeCause::Explicit,
		}));
		Ok(())
	}

	async fn remove_cookie(&self, url: &str, name: &str) -> HostResult<Option<RemovedCookie>> {
		self.enter(MockOp::RemoveCookie, MockCall::RemoveCookie {
			url: url.to_string(),
			name: name.to_string(),
		})?;
		let removed = {
			let mut state = self.state.borrow_mut();
			let position = state.jar.iter().position(|c| c.name == name && c.matches_url(url));
			position.map(|index| state.jar.remove(index))
		};
		let Some(cookie) = removed else {
			return Ok(None);
		};
		self.emit(HostEvent::CookieChanged(CookieChange {
			removed: true,
			cookie,
			cause: ChangeCause::Explicit,
		}));
		Ok(Some(RemovedCookie::new(url, name)))
	}

	async fn load(&self, key: &str) -> HostResult<Option<Value>> {
		self.enter(MockOp::Load, MockCall::Load { key: key.to_string() })?;
		Ok(self.stored(key))
	}

	async fn save(&self, key: &str, value: Value) -> HostResult<()> {
		self.enter(MockOp::Save, MockCall::Save { key: key.to_string() })?;
		self.put_stored(key, value);
		Ok(())
	}

	fn subscribe(&self, sink: EventSink) -> Subscription {
		self.listeners.insert(move |event: &HostEvent| sink(event.clone()))
	}
}
