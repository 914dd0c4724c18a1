// Shared harness for session service integration tests.

#![allow(dead_code)]

use std::future::Future;

use jarswap::protocol::encode_sessions;
use jarswap::testing::MockHost;
use jarswap::{Host, Session, SessionConfig, SessionHandle, SessionService, SessionsSnapshot};

pub const SITE: &str = "https://example.com/";

/// Runs `scenario` against a fresh service over `host`, then shuts it down.
///
/// The scenario gets its own handle to the same mock browser.
pub async fn run_with<F, Fut>(host: &MockHost, config: SessionConfig, scenario: F)
where
	F: FnOnce(SessionHandle, MockHost) -> Fut,
	Fut: Future<Output = ()>,
{
	init_tracing();
	let (service, handle) = SessionService::new(host.clone(), config);
	let events = host.subscribe(handle.event_sink());

	let driver = async {
		scenario(handle.clone(), host.clone()).await;
		handle.shutdown();
	};
	tokio::join!(service.run(), driver);
	drop(events);
}

pub async fn run<F, Fut>(host: &MockHost, scenario: F)
where
	F: FnOnce(SessionHandle, MockHost) -> Fut,
	Fut: Future<Output = ()>,
{
	run_with(host, SessionConfig::default(), scenario).await;
}

/// Routes service logs through the test harness's captured output.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_env_filter("jarswap=debug")
		.try_init();
}

/// Waits until the notifications caused by earlier commands have been handled.
///
/// Each snapshot drains everything queued before it; host notifications raised
/// while draining land behind it, so a few rounds cover command → tab event →
/// reconciliation → cookie echo chains.
pub async fn settle(handle: &SessionHandle) -> SessionsSnapshot {
	let mut snapshot = handle.snapshot().await.unwrap();
	for _ in 0..3 {
		snapshot = handle.snapshot().await.unwrap();
	}
	snapshot
}

/// Stores `sessions` where the service will load them from.
pub fn seed(host: &MockHost, sessions: &[Session]) {
	host.put_stored("sessions", encode_sessions(sessions).unwrap());
}

pub fn names(snapshot: &SessionsSnapshot) -> Vec<&str> {
	snapshot.sessions.iter().map(|s| s.name.as_str()).collect()
}

pub fn active_name(snapshot: &SessionsSnapshot) -> Option<&str> {
	snapshot.active_session().map(|s| s.name.as_str())
}
