//! Cookie types in the shape used by the `chrome.cookies` API.
//!
//! [`Cookie`] is both the live-jar representation returned by the host and the
//! snapshot recorded on a session, so a persisted session can be replayed into
//! the jar attribute-for-attribute via [`SetCookieDetails::from_cookie`].

use serde::{Deserialize, Serialize};
use url::Url;

/// SameSite attribute as reported by `chrome.cookies`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
	/// Sent with same-site and cross-site requests.
	NoRestriction,
	/// Sent with same-site requests and cross-site top-level navigations.
	Lax,
	/// Only sent with same-site requests.
	Strict,
	/// No attribute was set; the browser default applies.
	#[default]
	Unspecified,
}

/// A cookie as held by the browser jar or recorded on a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,
	/// Domain the cookie belongs to (leading dot for domain cookies).
	pub domain: String,
	pub path: String,
	/// Exact-host cookie; set without an explicit domain to keep it that way.
	#[serde(default)]
	pub host_only: bool,
	#[serde(default)]
	pub secure: bool,
	#[serde(default)]
	pub http_only: bool,
	#[serde(default)]
	pub same_site: SameSite,
	/// Session cookie (no expiry).
	#[serde(default)]
	pub session: bool,
	/// Unix timestamp in seconds, [`None`] for session cookies.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expiration_date: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub store_id: Option<String>,
}

impl Cookie {
	/// Creates a host-only session cookie scoped to `/`.
	pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			domain: domain.into(),
			path: "/".to_string(),
			host_only: true,
			secure: false,
			http_only: false,
			same_site: SameSite::Unspecified,
			session: true,
			expiration_date: None,
			store_id: None,
		}
	}

	/// Turns this into a domain cookie (matches subdomains too).
	pub fn domain_wide(mut self) -> Self {
		if !self.domain.starts_with('.') {
			self.domain.insert(0, '.');
		}
		self.host_only = false;
		self
	}

	pub fn path(mut self, path: impl Into<String>) -> Self {
		self.path = path.into();
		self
	}

	pub fn secure(mut self, secure: bool) -> Self {
		self.secure = secure;
		self
	}

	pub fn http_only(mut self, http_only: bool) -> Self {
		self.http_only = http_only;
		self
	}

	pub fn same_site(mut self, same_site: SameSite) -> Self {
		self.same_site = same_site;
		self
	}

	/// Sets an absolute expiry, making this a persistent cookie.
	pub fn expires(mut self, expiration_date: f64) -> Self {
		self.expiration_date = Some(expiration_date);
		self.session = false;
		self
	}

	/// URL the cookie belongs to: `{scheme}://{domain}{path}`.
	///
	/// Used wherever no tab URL is at hand, e.g. when replaying or purging a
	/// session's cookies.
	pub fn url(&self) -> String {
		let scheme = if self.secure { "https" } else { "http" };
		let host = self.domain.trim_start_matches('.');
		let path = if self.path.starts_with('/') { self.path.as_str() } else { "/" };
		format!("{scheme}://{host}{path}")
	}

	/// Returns true if `other` names the same jar slot (name, domain and path).
	pub fn same_slot(&self, other: &Cookie) -> bool {
		self.name == other.name && self.domain == other.domain && self.path == other.path
	}

	/// Returns true if the browser would send this cookie to `url`.
	///
	/// Unparseable URLs never match.
	pub fn matches_url(&self, url: &str) -> bool {
		let Ok(url) = Url::parse(url) else {
			return false;
		};
		let Some(host) = url.host_str() else {
			return false;
		};
		if self.secure && url.scheme() != "https" {
			return false;
		}
		domain_matches(host, &self.domain, self.host_only) && path_matches(url.path(), &self.path)
	}
}

fn domain_matches(host: &str, domain: &str, host_only: bool) -> bool {
	let domain = domain.trim_start_matches('.');
	if host.eq_ignore_ascii_case(domain) {
		return true;
	}
	if host_only {
		return false;
	}
	host.len() > domain.len()
		&& host[..host.len() - domain.len()].ends_with('.')
		&& host[host.len() - domain.len()..].eq_ignore_ascii_case(domain)
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
	if request_path == cookie_path {
		return true;
	}
	request_path.starts_with(cookie_path)
		&& (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// Details accepted by `chrome.cookies.set`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCookieDetails {
	pub url: String,
	pub name: String,
	pub value: String,
	/// Omitted for host-only cookies.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
	pub path: String,
	pub secure: bool,
	pub http_only: bool,
	pub same_site: SameSite,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expiration_date: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub store_id: Option<String>,
}

impl SetCookieDetails {
	/// Builds the set request that recreates `cookie` with its original attributes.
	pub fn from_cookie(cookie: &Cookie) -> Self {
		Self {
			url: cookie.url(),
			name: cookie.name.clone(),
			value: cookie.value.clone(),
			domain: (!cookie.host_only).then(|| cookie.domain.clone()),
			path: cookie.path.clone(),
			secure: cookie.secure,
			http_only: cookie.http_only,
			same_site: cookie.same_site,
			expiration_date: if cookie.session { None } else { cookie.expiration_date },
			store_id: cookie.store_id.clone(),
		}
	}

	/// The cookie the jar holds after this request succeeds.
	pub fn to_cookie(&self) -> Cookie {
		let (domain, host_only) = match &self.domain {
			Some(domain) if domain.starts_with('.') => (domain.clone(), false),
			Some(domain) => (format!(".{domain}"), false),
			None => (
				Url::parse(&self.url)
					.ok()
					.and_then(|u| u.host_str().map(str::to_string))
					.unwrap_or_default(),
				true,
			),
		};
		Cookie {
			name: self.name.clone(),
			value: self.value.clone(),
			domain,
			path: self.path.clone(),
			host_only,
			secure: self.secure,
			http_only: self.http_only,
			same_site: self.same_site,
			session: self.expiration_date.is_none(),
			expiration_date: self.expiration_date,
			store_id: self.store_id.clone(),
		}
	}
}

/// Reason reported with a `chrome.cookies.onChanged` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCause {
	Evicted,
	Expired,
	#[default]
	Explicit,
	ExpiredOverwrite,
	Overwrite,
}

/// Payload of `chrome.cookies.onChanged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieChange {
	/// True if the cookie was removed, false if it was set.
	pub removed: bool,
	pub cookie: Cookie,
	#[serde(default)]
	pub cause: ChangeCause,
}

/// What `chrome.cookies.remove` resolves with: the URL and name it removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedCookie {
	pub url: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub store_id: Option<String>,
}

impl RemovedCookie {
	pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			name: name.into(),
			store_id: None,
		}
	}

	/// Returns true if `cookie` is one this removal could have taken out of
	/// the jar.
	pub fn covers(&self, cookie: &Cookie) -> bool {
		self.name == cookie.name && cookie.matches_url(&self.url)
	}
}
