use jarswap_protocol::SessionId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Result of a host API call.
pub type HostResult<T> = std::result::Result<T, HostError>;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error("unknown session: {0}")]
	UnknownSession(SessionId),

	#[error(transparent)]
	Host(#[from] HostError),

	/// The session service has stopped and no longer accepts commands.
	#[error("session service is not running")]
	ServiceClosed,
}

impl Error {
	pub fn is_validation(&self) -> bool {
		matches!(self, Error::Validation(_))
	}

	pub fn is_host(&self) -> bool {
		matches!(self, Error::Host(_))
	}
}

/// Rejected session name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("Session name cannot be empty")]
	Empty,

	#[error("Session name cannot be longer than {max} characters")]
	TooLong { max: usize },

	#[error("A session named \"{0}\" already exists")]
	Duplicate(String),
}

/// A failed call into the host tab, cookie or storage API.
#[derive(Debug, Error)]
pub enum HostError {
	#[error("tab operation failed: {0}")]
	Tabs(String),

	#[error("cookie operation failed: {0}")]
	Cookies(String),

	#[error("storage operation failed: {0}")]
	Storage(String),

	#[error("malformed host data: {0}")]
	Json(#[from] serde_json::Error),
}
