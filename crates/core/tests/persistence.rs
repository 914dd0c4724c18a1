//! Loading and saving the session list, and reading the stored config.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{SITE, active_name, names, run, run_with, seed, settle};
use jarswap::protocol::decode_sessions;
use jarswap::testing::{MockCall, MockHost, MockOp};
use jarswap::{CONFIG_KEY, ConfigSource, Cookie, Messages, ReconcileMode, Session, SessionConfig};
use serde_json::json;

fn stored_names(host: &MockHost, key: &str) -> Vec<String> {
	let value = host.stored(key).unwrap_or_default();
	decode_sessions(&value).sessions.into_iter().map(|s| s.name).collect()
}

fn saves(host: &MockHost) -> usize {
	host.calls().iter().filter(|c| matches!(c, MockCall::Save { .. })).count()
}

#[tokio::test]
async fn empty_storage_loads_an_empty_list() {
	let host = MockHost::new();
	run(&host, |handle, host| async move {
		let snapshot = settle(&handle).await;
		assert!(snapshot.loaded);
		assert!(snapshot.sessions.is_empty());
		assert_eq!(snapshot.active, None);
		assert_eq!(snapshot.error, None);
		assert_eq!(saves(&host), 0);
	})
	.await;
}

#[tokio::test]
async fn first_stored_session_becomes_active() {
	let host = MockHost::new();
	seed(&host, &[Session::new("Home"), Session::new("Work")]);
	run(&host, |handle, host| async move {
		let snapshot = settle(&handle).await;
		assert_eq!(names(&snapshot), ["Home", "Work"]);
		assert_eq!(active_name(&snapshot), Some("Home"));
		assert_eq!(saves(&host), 0);
	})
	.await;
}

#[tokio::test]
async fn every_list_change_is_saved() {
	let host = MockHost::new();
	run(&host, |handle, host| async move {
		let work = handle.create("Work").await.unwrap();
		settle(&handle).await;
		assert_eq!(stored_names(&host, "sessions"), ["Work"]);

		handle.create("Home").await.unwrap();
		settle(&handle).await;
		assert_eq!(stored_names(&host, "sessions"), ["Work", "Home"]);

		handle.delete(&work).await.unwrap();
		settle(&handle).await;
		assert_eq!(stored_names(&host, "sessions"), ["Home"]);
	})
	.await;
}

#[tokio::test]
async fn selection_and_banner_changes_are_not_saved() {
	let host = MockHost::new();
	let sessions = [Session::new("A"), Session::new("B")];
	seed(&host, &sessions);
	run(&host, |handle, host| async move {
		handle.switch_active(&sessions[1].id).await.unwrap();
		handle.create("").await.unwrap_err();
		handle.dismiss_error();
		settle(&handle).await;
		assert_eq!(saves(&host), 0);
	})
	.await;
}

#[tokio::test]
async fn recorded_cookies_are_saved() {
	let host = MockHost::new();
	seed(&host, &[Session::new("Home")]);
	run(&host, |handle, host| async move {
		settle(&handle).await;
		host.page_sets_cookie(Cookie::new("sid", "1", "example.com").secure(true));
		settle(&handle).await;

		let stored = decode_sessions(&host.stored("sessions").unwrap());
		assert_eq!(stored.sessions[0].cookies, [Cookie::new("sid", "1", "example.com").secure(true)]);
	})
	.await;
}

#[tokio::test]
async fn a_reopened_popup_sees_the_same_sessions() {
	let host = MockHost::new();
	let tab = host.open_tab(SITE);
	let captured = Rc::new(RefCell::new(None));

	let first = Rc::clone(&captured);
	run(&host, |handle, host| async move {
		handle.create("Work").await.unwrap();
		handle.create("Home").await.unwrap();
		host.page_sets_cookie(Cookie::new("sid", "home", "example.com").path("/app"));
		host.activate(tab);
		*first.borrow_mut() = Some(settle(&handle).await);
	})
	.await;
	let before = captured.borrow_mut().take().unwrap();

	run(&host, |handle, _| async move {
		let after = settle(&handle).await;
		assert_eq!(after.sessions, before.sessions);
		assert_eq!(active_name(&after), Some("Work"));
	})
	.await;
}

#[tokio::test]
async fn malformed_entries_are_skipped() {
	let host = MockHost::new();
	let good = serde_json::to_value(Session::new("Good")).unwrap();
	host.put_stored(
		"sessions",
		json!([
			{"name": "no id"},
			good,
			42,
			{"id": "x", "name": "Bad cookie", "cookies": [{"name": "sid"}]},
		]),
	);

	run(&host, |handle, host| async move {
		let snapshot = settle(&handle).await;
		assert_eq!(names(&snapshot), ["Good"]);
		assert_eq!(active_name(&snapshot), Some("Good"));
		assert_eq!(snapshot.error, None);
		assert_eq!(saves(&host), 0);
	})
	.await;
}

#[tokio::test]
async fn a_non_list_value_loads_nothing() {
	let host = MockHost::new();
	host.put_stored("sessions", json!({"oops": true}));
	run(&host, |handle, _| async move {
		let snapshot = settle(&handle).await;
		assert!(snapshot.loaded);
		assert!(snapshot.sessions.is_empty());
	})
	.await;
}

#[tokio::test]
async fn failed_load_never_overwrites_stored_sessions() {
	let host = MockHost::new();
	seed(&host, &[Session::new("Home"), Session::new("Work")]);
	let before = host.stored("sessions");
	host.fail(MockOp::Load);

	run(&host, |handle, host| async move {
		let snapshot = settle(&handle).await;
		assert!(snapshot.loaded);
		assert!(snapshot.sessions.is_empty());
		assert_eq!(snapshot.error, Some(Messages::default().host_failure));

		handle.create("New").await.unwrap();
		let snapshot = settle(&handle).await;
		assert_eq!(names(&snapshot), ["New"]);
		assert_eq!(snapshot.error, Some(Messages::default().host_failure));
		assert_eq!(host.stored("sessions"), before);
		assert_eq!(saves(&host), 0);
	})
	.await;
}

#[tokio::test]
async fn a_later_successful_load_merges_and_saves() {
	let host = MockHost::new();
	seed(&host, &[Session::new("Home"), Session::new("Work")]);
	host.fail(MockOp::Load);

	run(&host, |handle, host| async move {
		handle.create("New").await.unwrap();
		handle.create("Work").await.unwrap();
		settle(&handle).await;
		assert_eq!(saves(&host), 0);

		host.recover(MockOp::Load);
		handle.create("Other").await.unwrap();
		let snapshot = settle(&handle).await;
		assert_eq!(names(&snapshot), ["Home", "Work", "New", "Other"]);
		assert_eq!(active_name(&snapshot), Some("Other"));
		assert_eq!(snapshot.error, None);
		assert_eq!(stored_names(&host, "sessions"), ["Home", "Work", "New", "Other"]);
	})
	.await;
}

#[tokio::test]
async fn stored_entries_with_unusable_names_are_skipped() {
	let host = MockHost::new();
	seed(
		&host,
		&[Session::new("Home"), Session::new("  "), Session::new("Home"), Session::new("x".repeat(21))],
	);
	run(&host, |handle, host| async move {
		let snapshot = settle(&handle).await;
		assert_eq!(names(&snapshot), ["Home"]);
		assert_eq!(saves(&host), 0);

		let err = handle.create("Home").await.unwrap_err();
		assert!(err.is_validation());
	})
	.await;
}

#[tokio::test]
async fn save_failure_keeps_the_change_and_shows_the_banner() {
	let host = MockHost::new();
	host.fail(MockOp::Save);
	run(&host, |handle, host| async move {
		handle.create("Work").await.unwrap();
		let snapshot = settle(&handle).await;
		assert_eq!(names(&snapshot), ["Work"]);
		assert_eq!(snapshot.error, Some(Messages::default().host_failure));
		assert_eq!(host.stored("sessions"), None);

		host.recover(MockOp::Save);
		handle.create("Home").await.unwrap();
		settle(&handle).await;
		assert_eq!(stored_names(&host, "sessions"), ["Work", "Home"]);
	})
	.await;
}

#[tokio::test]
async fn configured_storage_key_is_used() {
	let host = MockHost::new();
	host.put_stored("profiles", json!([serde_json::to_value(Session::new("Old")).unwrap()]));
	let config = SessionConfig {
		storage_key: "profiles".into(),
		..SessionConfig::default()
	};

	run_with(&host, config, |handle, host| async move {
		assert_eq!(names(&settle(&handle).await), ["Old"]);
		handle.create("New").await.unwrap();
		settle(&handle).await;
		assert_eq!(stored_names(&host, "profiles"), ["Old", "New"]);
		assert_eq!(host.stored("sessions"), None);
	})
	.await;
}

#[tokio::test]
async fn config_is_read_from_storage() {
	let host = MockHost::new();
	host.put_stored(
		CONFIG_KEY,
		json!({
			"storageKey": "profiles",
			"maxNameLen": 8,
			"newTabUrl": SITE,
			"reconcile": "impose_only",
			"logLevel": 2,
		}),
	);

	let config = SessionConfig::load(&host).await;
	assert_eq!(config.storage_key, "profiles");
	assert_eq!(config.max_name_len, 8);
	assert_eq!(config.new_tab_url.as_deref(), Some(SITE));
	assert_eq!(config.reconcile, ReconcileMode::ImposeOnly);
	assert_eq!(config.log_level, 2);
	assert_eq!(config.messages, Messages::default());
}

#[tokio::test]
async fn missing_or_broken_config_falls_back_to_defaults() {
	let host = MockHost::new();
	assert_eq!(SessionConfig::load(&host).await, SessionConfig::default());

	host.put_stored(CONFIG_KEY, json!({"maxNameLen": "twenty"}));
	assert_eq!(SessionConfig::load(&host).await, SessionConfig::default());

	host.fail(MockOp::Load);
	assert_eq!(SessionConfig::load(&host).await, SessionConfig::default());
}

#[tokio::test]
async fn config_read_reports_why_defaults_apply() {
	let host = MockHost::new();
	assert_eq!(SessionConfig::read(&host).await.1, ConfigSource::Missing);

	host.put_stored(CONFIG_KEY, json!({"maxNameLen": 8}));
	let (config, source) = SessionConfig::read(&host).await;
	assert_eq!(config.max_name_len, 8);
	assert_eq!(source, ConfigSource::Stored);

	host.put_stored(CONFIG_KEY, json!({"maxNameLen": "twenty"}));
	let (config, source) = SessionConfig::read(&host).await;
	assert_eq!(config, SessionConfig::default());
	assert!(matches!(source, ConfigSource::Malformed(_)));

	host.fail(MockOp::Load);
	let (config, source) = SessionConfig::read(&host).await;
	assert_eq!(config, SessionConfig::default());
	assert!(matches!(source, ConfigSource::Unreadable(ref err) if err.contains("Load failed")));
}
