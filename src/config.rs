#![allow(dead_code)]

//! Session configuration (§9 "global endpoint configuration").
//!
//! The specification notes that host/port are process-wide state in
//! the reference implementation and that a systems rewrite should
//! thread them through a session-configuration record instead of
//! consulting the environment at call time. [`SessionConfig`] is that
//! record; it follows the same priority chain the reference config
//! documented:
//!
//! 1. Built-in defaults ([`SessionConfig::default`])
//! 2. Environment variables (`STUDYSYNC_*` prefix)
//! 3. Explicit builder calls (highest priority)

use serde::{Deserialize, Serialize};

/// Everything a session needs to know about where its peer lives and
/// who it authenticates as, resolved once before [`crate::session::SyncSession::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
	/// Sync endpoint host. Ignored by [`crate::local_transport::LocalTransport`];
	/// consulted by a network transport implementation.
	pub host: String,

	/// Sync endpoint port.
	pub port: u16,

	/// Username presented to `hostKey` (§6).
	pub username: String,

	/// Password presented to `hostKey` (§6). Authentication itself is
	/// out of scope for the core (§9); this field only exists so a
	/// transport implementation has something to send.
	pub password: String,

	/// Remote-call timeout. A transport may use this to bound a single
	/// wire operation; the core itself does not retry on timeout (§7).
	pub timeout_ms: u64,
}

impl Default for SessionConfig {
	fn default() -> Self {
		SessionConfig {
			host: "127.0.0.1".to_string(),
			port: 8384,
			username: String::new(),
			password: String::new(),
			timeout_ms: 60_000,
		}
	}
}

impl SessionConfig {
	/// Start from defaults overridden by any `STUDYSYNC_*` environment
	/// variables present.
	pub fn from_env() -> Self {
		let mut config = SessionConfig::default();
		if let Ok(host) = std::env::var("STUDYSYNC_HOST") {
			config.host = host;
		}
		if let Ok(port) = std::env::var("STUDYSYNC_PORT") {
			if let Ok(port) = port.parse() {
				config.port = port;
			}
		}
		if let Ok(username) = std::env::var("STUDYSYNC_USER") {
			config.username = username;
		}
		if let Ok(timeout) = std::env::var("STUDYSYNC_TIMEOUT_MS") {
			if let Ok(timeout) = timeout.parse() {
				config.timeout_ms = timeout;
			}
		}
		config
	}

	pub fn builder() -> SessionConfigBuilder {
		SessionConfigBuilder::new()
	}
}

/// Builder for [`SessionConfig`] (§9, highest-priority override layer).
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
	config: SessionConfig,
}

impl SessionConfigBuilder {
	pub fn new() -> Self {
		SessionConfigBuilder { config: SessionConfig::default() }
	}

	pub fn host(mut self, host: impl Into<String>) -> Self {
		self.config.host = host.into();
		self
	}

	pub fn port(mut self, port: u16) -> Self {
		self.config.port = port;
		self
	}

	pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
		self.config.username = username.into();
		self.config.password = password.into();
		self
	}

	pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
		self.config.timeout_ms = timeout_ms;
		self
	}

	pub fn build(self) -> SessionConfig {
		self.config
	}
}


// vim: ts=4
