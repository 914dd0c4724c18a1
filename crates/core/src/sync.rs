//! Cookie synchronization between the live jar and recorded sessions.

use std::collections::HashSet;

use jarswap_protocol::{Cookie, RemovedCookie, Session, SetCookieDetails};
use tracing::{debug, warn};

use crate::config::ReconcileMode;
use crate::error::{HostError, HostResult};
use crate::host::Host;
use crate::store::SessionStore;

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
	/// Live cookies recorded onto the session (capture mode only).
	pub captured: usize,
	/// Live cookies removed because the session did not know their name.
	pub removed: usize,
	/// Recorded cookies written back into the jar.
	pub imposed: usize,
}

/// Makes the jar for `url` match `session`'s recorded cookies.
///
/// `session` is the state before the pass. In
/// [`ReconcileMode::CaptureThenImpose`] the live cookies are first recorded
/// onto the session in `store`; removals are decided against the names in
/// `session`, and `session`'s cookies are then set with their original
/// attributes. Stops at the first host error, leaving whatever already ran.
pub async fn reconcile<H: Host + ?Sized>(
	host: &H,
	store: &mut SessionStore,
	session: &Session,
	url: &str,
	mode: ReconcileMode,
) -> HostResult<ReconcileReport> {
	let live = host.get_all_cookies(url).await?;
	let known: HashSet<&str> = session.cookies.iter().map(|c| c.name.as_str()).collect();
	let mut report = ReconcileReport::default();

	let stale: Vec<String> = live
		.iter()
		.filter(|c| !known.contains(c.name.as_str()))
		.map(|c| c.name.clone())
		.collect();

	if mode == ReconcileMode::CaptureThenImpose {
		report.captured = live.len();
		store.record_cookies(&session.id, live);
	}

	for name in &stale {
		host.remove_cookie(url, name).await?;
		report.removed += 1;
	}

	for cookie in &session.cookies {
		host.set_cookie(&SetCookieDetails::from_cookie(cookie)).await?;
		report.imposed += 1;
	}

	debug!(
		target = "jarswap.sync",
		session_id = %session.id,
		url,
		captured = report.captured,
		removed = report.removed,
		imposed = report.imposed,
		"reconciled"
	);
	Ok(report)
}

/// Removes every cookie in `cookies` from the jar, each at its own URL.
///
/// Keeps going after failures. Returns what the host reports as actually
/// removed, which may be a different jar slot than the recorded cookie when
/// several share its name and URL, and the failures.
pub async fn purge<H: Host + ?Sized>(host: &H, cookies: &[Cookie]) -> (Vec<RemovedCookie>, Vec<HostError>) {
	let mut removed = Vec::new();
	let mut failures = Vec::new();
	for cookie in cookies {
		match host.remove_cookie(&cookie.url(), &cookie.name).await {
			Ok(Some(removal)) => removed.push(removal),
			Ok(None) => {}
			Err(err) => {
				warn!(target = "jarswap.sync", cookie = %cookie.name, domain = %cookie.domain, error = %err, "failed to remove cookie");
				failures.push(err);
			}
		}
	}
	(removed, failures)
}
