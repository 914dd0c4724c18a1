//! The host boundary: tab, cookie and storage primitives plus notifications.
//!
//! The extension implements [`Host`] over the `chrome.*` APIs; tests use
//! [`MockHost`](crate::testing::MockHost). Every call is asynchronous and may
//! fail with a [`HostError`](crate::HostError).

use std::rc::Rc;

use async_trait::async_trait;
use jarswap_protocol::{Cookie, CookieChange, RemovedCookie, SetCookieDetails, TabId, TabInfo, TabStatus};
use serde_json::Value;

use crate::error::HostResult;
use crate::handlers::Subscription;

/// Notification delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
	TabCreated(TabInfo),
	TabActivated(TabId),
	TabUpdated {
		tab_id: TabId,
		/// `None` when the update did not change the loading status.
		status: Option<TabStatus>,
	},
	TabRemoved(TabId),
	CookieChanged(CookieChange),
}

/// Callback the host pushes [`HostEvent`]s into.
pub type EventSink = Rc<dyn Fn(HostEvent)>;

/// Browser primitives the session service drives.
///
/// Futures are not `Send`: the host runs on a single UI thread.
#[async_trait(?Send)]
pub trait Host {
	/// Opens a new tab, at `url` or the browser's new-tab page.
	async fn create_tab(&self, url: Option<&str>) -> HostResult<TabInfo>;

	async fn remove_tab(&self, tab_id: TabId) -> HostResult<()>;

	async fn get_tab(&self, tab_id: TabId) -> HostResult<TabInfo>;

	/// Returns every live cookie the browser would send to `url`.
	async fn get_all_cookies(&self, url: &str) -> HostResult<Vec<Cookie>>;

	async fn set_cookie(&self, details: &SetCookieDetails) -> HostResult<()>;

	/// Removes the cookie `name` the browser would send to `url`. Returns
	/// [`None`] if there was nothing to remove.
	async fn remove_cookie(&self, url: &str, name: &str) -> HostResult<Option<RemovedCookie>>;

	/// Reads the value stored under `key`.
	async fn load(&self, key: &str) -> HostResult<Option<Value>>;

	/// Replaces the value stored under `key`.
	async fn save(&self, key: &str, value: Value) -> HostResult<()>;

	/// Starts delivering notifications to `sink` until the returned
	/// subscription is dropped.
	fn subscribe(&self, sink: EventSink) -> Subscription;
}
