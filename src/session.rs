//! The session driver (§4.1): the five-step handshake, parameterised
//! by [`Role`] rather than split into separate client/server types
//! (§9 "server/client symmetry").

use async_trait::async_trait;

use crate::callbacks::{NullStatusSink, SyncPhase, SyncStatusSink};
use crate::changes::{extract_changes, ChangeSet};
use crate::chunk::{apply_chunk, Chunk, ChunkStreamer};
use crate::corpus::Corpus;
use crate::error::SyncError;
use crate::logging::*;
use crate::merge::merge_changes;
use crate::model::{Mtime, Usn};
use crate::sanity::{check_invariants, sanity_vector, SanityVector};
use crate::usn::{Role, UsnPredicate};

/// The six wire operations a peer exposes to a driving client (§6).
/// The reference transport is HTTP POST with JSON bodies; the
/// in-process implementation lives in [`crate::local_transport`].
#[async_trait]
pub trait SyncTransport: Send + Sync {
	async fn host_key(&self, username: &str, password: &str) -> Result<String, SyncError>;
	/// Returns the peer's `(mod, scm, usn)`.
	async fn meta(&self) -> Result<(Mtime, Mtime, Usn), SyncError>;
	async fn apply_changes(&self, min_usn: Usn, l_newer: bool, changes: ChangeSet) -> Result<ChangeSet, SyncError>;
	async fn chunk(&self) -> Result<Chunk, SyncError>;
	async fn apply_chunk(&self, chunk: Chunk) -> Result<(), SyncError>;
	async fn sanity_check(&self) -> Result<SanityVector, SyncError>;
	/// Returns the final `mod` the server decided on.
	async fn finish(&self) -> Result<Mtime, SyncError>;
}

/// The three control outcomes a session can resolve to (§4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
	/// `lmod == rmod`; nothing to do.
	NoChanges,
	/// `lscm != rscm`; caller must fall back to the out-of-scope
	/// full-sync path.
	FullSync,
	Success,
}

/// Drives one side of a session against a local [`Corpus`] and a
/// remote [`SyncTransport`] (§4.1). Always constructed with
/// `Role::Client` — the peer behind the transport plays `Role::Server`
/// by implementing the same six operations as a request handler.
pub struct SyncSession<'a> {
	corpus: &'a mut dyn Corpus,
	transport: &'a dyn SyncTransport,
	status: &'a dyn SyncStatusSink,
}

static NULL_SINK: NullStatusSink = NullStatusSink;

impl<'a> SyncSession<'a> {
	pub fn new(corpus: &'a mut dyn Corpus, transport: &'a dyn SyncTransport) -> Self {
		SyncSession { corpus, transport, status: &NULL_SINK }
	}

	pub fn with_status(
		corpus: &'a mut dyn Corpus,
		transport: &'a dyn SyncTransport,
		status: &'a dyn SyncStatusSink,
	) -> Self {
		SyncSession { corpus, transport, status }
	}

	/// Run the full handshake (§4.1). All local mutations happen
	/// inside a single transaction, committed only on success and
	/// rolled back on any error (§5 "cancellation").
	pub async fn run(&mut self) -> Result<SyncOutcome, SyncError> {
		self.corpus.begin();
		match self.run_inner().await {
			Ok(outcome) => {
				self.corpus.commit();
				Ok(outcome)
			}
			Err(e) => {
				warn!(error = %e, "sync session aborted, rolling back");
				self.corpus.rollback();
				Err(e)
			}
		}
	}

	async fn run_inner(&mut self) -> Result<SyncOutcome, SyncError> {
		self.status.on_phase(SyncPhase::Meta);
		let local = self.corpus.meta();
		let (rmod, rscm, max_usn) = self.transport.meta().await?;

		if local.mtime == rmod {
			info!("corpora already in sync");
			return Ok(SyncOutcome::NoChanges);
		}
		if local.scm != rscm {
			info!(lscm = local.scm, rscm, "schema divergence, deferring to full sync");
			return Ok(SyncOutcome::FullSync);
		}
		let l_newer = local.mtime > rmod;
		let min_usn = local.usn;
		let predicate = UsnPredicate::new(Role::Client, min_usn);

		self.status.on_phase(SyncPhase::Changes);
		let outgoing = extract_changes(self.corpus, predicate, max_usn, l_newer);
		let incoming = self.transport.apply_changes(min_usn, l_newer, outgoing).await?;
		merge_changes(self.corpus, &incoming, max_usn);

		self.status.on_phase(SyncPhase::ServerToClient);
		loop {
			let chunk = self.transport.chunk().await?;
			let rows = chunk_row_count(&chunk);
			self.status.on_chunk(SyncPhase::ServerToClient, rows);
			apply_chunk(self.corpus, &chunk, predicate);
			if chunk.done {
				break;
			}
		}

		self.status.on_phase(SyncPhase::ClientToServer);
		let mut outgoing_stream = ChunkStreamer::prepare(self.corpus, predicate, max_usn);
		loop {
			let chunk = outgoing_stream.next_chunk(self.corpus);
			let rows = chunk_row_count(&chunk);
			let done = chunk.done;
			self.status.on_chunk(SyncPhase::ClientToServer, rows);
			self.transport.apply_chunk(chunk).await?;
			if done {
				break;
			}
		}

		self.status.on_phase(SyncPhase::Sanity);
		let violations = check_invariants(self.corpus);
		if let Some(v) = violations.into_iter().next() {
			return Err(v.into());
		}
		let local_vector = sanity_vector(self.corpus);
		let remote_vector = self.transport.sanity_check().await?;
		if local_vector != remote_vector {
			return Err(SyncError::SanityMismatch { local: local_vector, remote: remote_vector });
		}

		self.status.on_phase(SyncPhase::Finalize);
		let mod_time = self.transport.finish().await?;
		let mut meta = self.corpus.meta();
		meta.last_sync = mod_time;
		meta.usn = max_usn + 1;
		meta.mtime = mod_time;
		self.corpus.set_meta(meta);

		info!(max_usn, mod_time, "sync completed");
		Ok(SyncOutcome::Success)
	}
}

fn chunk_row_count(chunk: &Chunk) -> usize {
	chunk.revlog.as_ref().map(Vec::len).unwrap_or(0)
		+ chunk.cards.as_ref().map(Vec::len).unwrap_or(0)
		+ chunk.facts.as_ref().map(Vec::len).unwrap_or(0)
}

// vim: ts=4
