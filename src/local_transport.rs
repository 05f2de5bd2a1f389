//! An in-process [`SyncTransport`] (§2.1 expansion): plays the server
//! side of a session against a shared [`Corpus`], for tests and the
//! demonstration CLI. A real deployment would swap this for an HTTP
//! client speaking the wire operations in §6.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::changes::{extract_changes, ChangeSet};
use crate::chunk::{apply_chunk, Chunk, ChunkStreamer};
use crate::corpus::Corpus;
use crate::error::SyncError;
use crate::logging::*;
use crate::merge::merge_changes;
use crate::model::{Mtime, Usn};
use crate::sanity::{check_invariants, sanity_vector, SanityVector};
use crate::session::SyncTransport;
use crate::usn::{Role, UsnPredicate};
use std::sync::Arc;

/// Mutable state accumulated as the server-side operations of one
/// session run (§4.1). Holding the corpus's lock for the whole of
/// `session` is the "per-corpus mutual exclusion lock held for the
/// duration of a session" the concurrency model requires (§5).
struct ServerSession<C: Corpus> {
	guard: Option<OwnedMutexGuard<C>>,
	min_usn: Usn,
	max_usn: Usn,
	l_newer: bool,
	outgoing: Option<ChunkStreamer>,
	finished: bool,
}

impl<C: Corpus> Default for ServerSession<C> {
	fn default() -> Self {
		ServerSession {
			guard: None,
			min_usn: 0,
			max_usn: 0,
			l_newer: false,
			outgoing: None,
			finished: false,
		}
	}
}

impl<C: Corpus> ServerSession<C> {
	/// Roll back and release a held guard that never reached `finish`
	/// (§5 "cancellation": the transport closing mid-stream must leave
	/// the corpus unchanged). Called before a fresh `meta()` replaces
	/// this session's state, and from `Drop` if the transport itself is
	/// torn down mid-session.
	fn abort_if_unfinished(&mut self) {
		if !self.finished {
			if let Some(mut guard) = self.guard.take() {
				warn!("server session superseded before finishing, rolling back");
				guard.rollback();
			}
		}
	}
}

impl<C: Corpus> Drop for ServerSession<C> {
	fn drop(&mut self) {
		self.abort_if_unfinished();
	}
}

/// Server endpoint for one corpus (§5 "inter-session"). A real server
/// keeps one of these per (user, corpus) pair and hands out a fresh
/// session on each `host_key`/`meta` call; this reference
/// implementation is single-session for simplicity.
pub struct LocalTransport<C: Corpus + Send + 'static> {
	corpus: Arc<Mutex<C>>,
	session: Mutex<ServerSession<C>>,
}

impl<C: Corpus + Send + 'static> LocalTransport<C> {
	pub fn new(corpus: Arc<Mutex<C>>) -> Self {
		LocalTransport { corpus, session: Mutex::new(ServerSession::default()) }
	}

	fn predicate(min_usn: Usn) -> UsnPredicate {
		UsnPredicate::new(Role::Server, min_usn)
	}
}

#[async_trait]
impl<C: Corpus + Send + 'static> SyncTransport for LocalTransport<C> {
	async fn host_key(&self, username: &str, _password: &str) -> Result<String, SyncError> {
		// Authentication itself is out of scope (§9); this mints an
		// opaque session key the way a real handshake would.
		debug!(username, "issuing session key");
		Ok(uuid::Uuid::new_v4().to_string())
	}

	async fn meta(&self) -> Result<(Mtime, Mtime, Usn), SyncError> {
		// A momentary read, not the session's write transaction: most
		// sessions stop here (`NoChanges`/`FullSync`, §4.1 step 1)
		// without ever calling `finish`, and must not leave the corpus
		// locked when they do. Any session left over from a prior
		// `apply_changes` that never finished is rolled back first.
		let mut session = self.session.lock().await;
		session.abort_if_unfinished();
		let meta = self.corpus.lock().await.meta();
		debug!(rmod = meta.mtime, rscm = meta.scm, max_usn = meta.usn, "server meta");
		Ok((meta.mtime, meta.scm, meta.usn))
	}

	async fn apply_changes(
		&self,
		min_usn: Usn,
		l_newer_from_client: bool,
		changes: ChangeSet,
	) -> Result<ChangeSet, SyncError> {
		// The write transaction begins here (§5 "cancellation"): the
		// per-corpus lock is held from this call through `finish`, or
		// released by rollback if the transport never reaches it. `maxUsn`
		// is the server's usn as of now (§4.1 step 2: "maxUsn := server.usn").
		let mut session = self.session.lock().await;
		let mut guard = self.corpus.clone().lock_owned().await;
		guard.begin();
		let max_usn = guard.meta().usn;
		session.min_usn = min_usn;
		session.max_usn = max_usn;
		session.l_newer = !l_newer_from_client;
		let l_newer = session.l_newer;

		let predicate = Self::predicate(min_usn);
		let own_changes = extract_changes(&mut *guard, predicate, max_usn, l_newer);
		merge_changes(&mut *guard, &changes, max_usn);
		session.guard = Some(guard);
		Ok(own_changes)
	}

	async fn chunk(&self) -> Result<Chunk, SyncError> {
		let mut session = self.session.lock().await;
		let min_usn = session.min_usn;
		let max_usn = session.max_usn;
		let session = &mut *session;
		let guard = session.guard.as_deref_mut().ok_or(SyncError::Aborted)?;
		if session.outgoing.is_none() {
			let predicate = Self::predicate(min_usn);
			session.outgoing = Some(ChunkStreamer::prepare(guard, predicate, max_usn));
		}
		let guard = session.guard.as_deref_mut().ok_or(SyncError::Aborted)?;
		Ok(session.outgoing.as_mut().unwrap().next_chunk(guard))
	}

	async fn apply_chunk(&self, chunk: Chunk) -> Result<(), SyncError> {
		let mut session = self.session.lock().await;
		let min_usn = session.min_usn;
		let guard = session.guard.as_deref_mut().ok_or(SyncError::Aborted)?;
		apply_chunk(guard, &chunk, Self::predicate(min_usn));
		Ok(())
	}

	async fn sanity_check(&self) -> Result<SanityVector, SyncError> {
		let mut session = self.session.lock().await;
		let guard = session.guard.as_deref_mut().ok_or(SyncError::Aborted)?;
		let violations = check_invariants(guard);
		if let Some(v) = violations.into_iter().next() {
			return Err(v.into());
		}
		Ok(sanity_vector(guard))
	}

	async fn finish(&self) -> Result<Mtime, SyncError> {
		let mut session = self.session.lock().await;
		let max_usn = session.max_usn;
		let mod_time = now_seconds();
		{
			let guard = session.guard.as_deref_mut().ok_or(SyncError::Aborted)?;
			let mut meta = guard.meta();
			meta.last_sync = mod_time;
			meta.usn = max_usn + 1;
			meta.mtime = mod_time;
			guard.set_meta(meta);
			guard.commit();
		}
		session.finished = true;
		*session = ServerSession::default();
		Ok(mod_time)
	}
}

fn now_seconds() -> Mtime {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as Mtime).unwrap_or(0)
}


// vim: ts=4
