//! High-level entry point and builder, mirroring the reference
//! builder API but scoped to a single sync session (§4.1).

use crate::callbacks::{NullStatusSink, SyncStatusSink};
use crate::config::SessionConfig;
use crate::corpus::Corpus;
use crate::error::SyncError;
use crate::session::{SyncOutcome, SyncSession, SyncTransport};

/// Run one sync session against `corpus` over `transport` with
/// default configuration and no status reporting.
///
/// ```rust,ignore
/// let outcome = studysync::sync::sync(&mut corpus, &transport).await?;
/// ```
pub async fn sync(
	corpus: &mut dyn Corpus,
	transport: &dyn SyncTransport,
) -> Result<SyncOutcome, SyncError> {
	SyncBuilder::new().sync(corpus, transport).await
}

/// Fluent builder for a session (§9: endpoint/credentials live in a
/// [`SessionConfig`] record rather than process-wide state).
pub struct SyncBuilder {
	config: SessionConfig,
	status: Box<dyn SyncStatusSink>,
}

impl SyncBuilder {
	pub fn new() -> Self {
		SyncBuilder { config: SessionConfig::default(), status: Box::new(NullStatusSink) }
	}

	/// Attach endpoint/credential configuration. Consulted by network
	/// transport implementations; [`crate::local_transport::LocalTransport`]
	/// ignores it.
	pub fn config(mut self, config: SessionConfig) -> Self {
		self.config = config;
		self
	}

	/// Register a status sink for phase/chunk reporting.
	pub fn on_status(mut self, sink: Box<dyn SyncStatusSink>) -> Self {
		self.status = sink;
		self
	}

	pub fn session_config(&self) -> &SessionConfig {
		&self.config
	}

	/// Run the session to completion (§4.1).
	pub async fn sync(
		self,
		corpus: &mut dyn Corpus,
		transport: &dyn SyncTransport,
	) -> Result<SyncOutcome, SyncError> {
		let mut session = SyncSession::with_status(corpus, transport, self.status.as_ref());
		session.run().await
	}
}

impl Default for SyncBuilder {
	fn default() -> Self {
		Self::new()
	}
}

// vim: ts=4
