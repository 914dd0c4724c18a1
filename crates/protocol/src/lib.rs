//! Wire types shared between the jarswap core and its host bindings.
//!
//! Field names follow the JSON shapes of the `chrome.cookies`, `chrome.tabs`
//! and `chrome.storage` APIs so values cross the host boundary through serde
//! without hand-written conversion.

pub mod cookie;
pub mod session;
pub mod tab;

pub use cookie::{ChangeCause, Cookie, CookieChange, RemovedCookie, SameSite, SetCookieDetails};
pub use session::{DecodedSessions, Session, SessionId, SkippedRecord, decode_sessions, encode_sessions};
pub use tab::{TabId, TabInfo, TabStatus};
