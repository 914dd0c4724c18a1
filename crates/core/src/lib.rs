//! Named cookie sessions for a browser extension popup.
//!
//! A user keeps several named sessions against the same sites; the active
//! session's recorded cookies are swapped into the browser jar whenever the
//! user switches session or a tab navigates.
//!
//! # Layout
//!
//! - [`SessionStore`]: session list, active selection, error banner
//! - [`sync`]: reconciliation of the live jar against a session
//! - [`SessionService`] / [`SessionHandle`]: single-owner actor serializing
//!   every mutation and reconciliation pass
//! - [`popup`]: view model and gestures for the popup UI
//! - [`Host`]: the browser primitives, implemented by the extension and by
//!   [`testing::MockHost`]

pub mod config;
pub mod error;
pub mod handlers;
pub mod host;
pub mod popup;
pub mod service;
pub mod store;
pub mod sync;
pub mod testing;

pub use config::{CONFIG_KEY, ConfigSource, MAX_NAME_LEN, Messages, ReconcileMode, SessionConfig};
pub use error::{Error, HostError, HostResult, Result, ValidationError};
pub use handlers::{HandlerId, HandlerMap, Subscription};
pub use host::{EventSink, Host, HostEvent};
pub use jarswap_protocol as protocol;
pub use jarswap_protocol::{
	ChangeCause, Cookie, CookieChange, RemovedCookie, SameSite, Session, SessionId, SetCookieDetails, TabId, TabInfo, TabStatus,
};
pub use popup::{ENTER_KEY, Gesture, Panel, Popup, PopupView, SessionRow};
pub use service::{SessionHandle, SessionService};
pub use store::{SessionStore, SessionsSnapshot};
pub use sync::ReconcileReport;
