//! Property-based checks of the sync core's protocol invariants,
//! driven through the public [`SyncSession`] API against randomly
//! sized, randomly timed sets of card additions on each side.
//!
//! Each case builds a pair of corpora that already share one fact
//! (synced at usn 6), has the client add some disjoint set of cards
//! and the server add another disjoint set, runs a session to
//! completion on a fresh current-thread runtime, and checks the
//! invariants the protocol promises.

use std::sync::Arc;

use proptest::prelude::*;
use tokio::sync::Mutex;

use studysync::corpus::{Corpus, InMemoryCorpus};
use studysync::local_transport::LocalTransport;
use studysync::model::{CardRow, CorpusMeta, FactRow};
use studysync::session::{SyncOutcome, SyncSession};

const SHARED_FACT: i64 = 1;

fn shared_fact() -> FactRow {
	FactRow {
		id: SHARED_FACT,
		guid: "shared".to_string(),
		model_id: 1,
		group_id: 1,
		mtime: 500,
		usn: 6,
		tags: String::new(),
		fields: "front\u{1f}back".to_string(),
		sort_field: String::new(),
		flags: 0,
		data: String::new(),
	}
}

fn card(id: i64, mtime: i64, usn: i32) -> CardRow {
	CardRow {
		id,
		fact_id: SHARED_FACT,
		group_id: 1,
		ordinal: 0,
		mtime,
		usn,
		card_type: 0,
		queue: 0,
		due: 0,
		interval: 0,
		ease_factor: 2500,
		reps: 0,
		lapses: 0,
		left_steps: 0,
		edue: 0,
		flags: 0,
		data: String::new(),
	}
}

/// `client_edits` are dirty (usn = -1), disjoint in id-space from
/// `server_edits`, which already carry the session's prospective usn
/// (7), matching a server-side edit made since the last sync.
fn build_pair(
	client_edits: &[(i64, i64)],
	server_edits: &[(i64, i64)],
) -> (InMemoryCorpus, Arc<Mutex<InMemoryCorpus>>) {
	let mut client = InMemoryCorpus::new();
	client.insert_fact(shared_fact());
	let client_mtime = client_edits.iter().map(|(_, m)| *m).max().unwrap_or(500).max(501);
	for &(id, mtime) in client_edits {
		client.insert_card(card(id, mtime, -1));
	}
	client.set_meta(CorpusMeta { mtime: client_mtime, scm: 500, usn: 7, last_sync: 0, conf: serde_json::json!({}) });

	let mut server = InMemoryCorpus::new();
	server.insert_fact(shared_fact());
	// Offset well clear of `client_mtime`'s range so the two can never
	// collide and accidentally produce a spurious NoChanges outcome.
	let server_mtime = server_edits.iter().map(|(_, m)| *m).max().unwrap_or(500) + 10_000_000;
	for &(id, mtime) in server_edits {
		server.insert_card(card(id, mtime, 7));
	}
	server.set_meta(CorpusMeta { mtime: server_mtime, scm: 500, usn: 7, last_sync: 0, conf: serde_json::json!({}) });

	(client, Arc::new(Mutex::new(server)))
}

fn run_session(client: &mut InMemoryCorpus, transport: &LocalTransport<InMemoryCorpus>) -> SyncOutcome {
	tokio::runtime::Builder::new_current_thread()
		.build()
		.unwrap()
		.block_on(async { SyncSession::new(client, transport).run().await.unwrap() })
}

fn edit_ids(base: i64, count: usize) -> impl Strategy<Value = Vec<(i64, i64)>> {
	prop::collection::vec(any::<i64>().prop_map(move |m| m.rem_euclid(100_000)), 0..count)
		.prop_map(move |mtimes| {
			mtimes.into_iter().enumerate().map(|(i, m)| (base + i as i64, 1000 + m)).collect()
		})
}

proptest! {
	/// No row or gravestone carries the dirty sentinel after a session
	/// completes (§4.6 invariant: "no row... should retain usn = -1").
	#[test]
	fn dirty_rows_never_survive_a_successful_sync(
		client_edits in edit_ids(1, 12),
		server_edits in edit_ids(10_001, 12),
	) {
		let (mut client, server) = build_pair(&client_edits, &server_edits);
		let transport = LocalTransport::new(server.clone());
		let outcome = run_session(&mut client, &transport);
		prop_assert_eq!(outcome, SyncOutcome::Success);

		prop_assert_eq!(client.card_dirty_count(), 0);
		let server = tokio::runtime::Runtime::new().unwrap().block_on(server.lock());
		prop_assert_eq!(server.card_dirty_count(), 0);
	}

	/// Both sides land on the same `usn` (`max_usn + 1`) after a
	/// successful session (§4.1 step 5).
	#[test]
	fn both_sides_advance_to_the_same_usn(
		client_edits in edit_ids(1, 12),
		server_edits in edit_ids(10_001, 12),
	) {
		let (mut client, server) = build_pair(&client_edits, &server_edits);
		let transport = LocalTransport::new(server.clone());
		let outcome = run_session(&mut client, &transport);
		prop_assert_eq!(outcome, SyncOutcome::Success);

		let server_usn = tokio::runtime::Runtime::new().unwrap().block_on(server.lock()).meta().usn;
		prop_assert_eq!(client.meta().usn, 8);
		prop_assert_eq!(server_usn, 8);
	}

	/// Disjoint additions from each side are present on both sides
	/// afterward — the merge is a union over non-conflicting edits
	/// (§4.4, §4.5).
	#[test]
	fn disjoint_edits_from_both_sides_end_up_on_both_sides(
		client_edits in edit_ids(1, 12),
		server_edits in edit_ids(10_001, 12),
	) {
		let (mut client, server) = build_pair(&client_edits, &server_edits);
		let transport = LocalTransport::new(server.clone());
		let outcome = run_session(&mut client, &transport);
		prop_assert_eq!(outcome, SyncOutcome::Success);

		let server_guard = tokio::runtime::Runtime::new().unwrap().block_on(server.lock());
		for &(id, mtime) in &client_edits {
			let row = server_guard.get_card(id).expect("client addition missing on server");
			prop_assert_eq!(row.mtime, mtime);
		}
		for &(id, mtime) in &server_edits {
			let row = client.get_card(id).expect("server addition missing on client");
			prop_assert_eq!(row.mtime, mtime);
		}
	}

	/// A session run immediately after a successful one, with no
	/// further local activity, finds nothing to do (§4.1 step 1:
	/// `finish` leaves both sides at the same `mod`).
	#[test]
	fn resyncing_right_after_success_reports_no_changes(
		client_edits in edit_ids(1, 8),
		server_edits in edit_ids(10_001, 8),
	) {
		let (mut client, server) = build_pair(&client_edits, &server_edits);
		let transport = LocalTransport::new(server.clone());
		let first = run_session(&mut client, &transport);
		prop_assert_eq!(first, SyncOutcome::Success);

		let second = run_session(&mut client, &transport);
		prop_assert_eq!(second, SyncOutcome::NoChanges);
	}
}

// vim: ts=4
