//! The chunk streamer (§4.5): streams the three large tables
//! (review log, cards, facts) in bounded-size batches.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::corpus::Corpus;
use crate::logging::*;
use crate::model::{CardRow, FactRow, ObjectId, RevlogRow, Usn};
use crate::usn::{Role, UsnPredicate};

/// Rows per chunk (§4.5). Fixed per the specification; not part of
/// [`crate::config::SessionConfig`] because changing it would change
/// the wire behavior the property tests (§8, scenario S6) depend on.
pub const CHUNK_SIZE: usize = 5000;

/// The order large tables are drained in (§4.1, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
	Revlog,
	Cards,
	Facts,
}

/// One streamed batch. Absent fields mean "nothing from that table in
/// this chunk" (§4.5, §6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
	pub done: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub revlog: Option<Vec<RevlogRow>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cards: Option<Vec<CardRow>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub facts: Option<Vec<FactRow>>,
}

/// Streaming state for one direction of one sync session.
///
/// `prepare` materializes the full matching set per table once
/// (`prepareToChunk` in the reference protocol); `next_chunk` then
/// drains up to [`CHUNK_SIZE`] rows per call, popping a table only
/// once a fetch against it returns fewer rows than requested.
pub struct ChunkStreamer {
	is_client: bool,
	max_usn: Usn,
	tables_left: VecDeque<TableKind>,
	revlog: VecDeque<RevlogRow>,
	cards: VecDeque<CardRow>,
	facts: VecDeque<FactRow>,
	// Full id sets captured at prepare time, used to mark rows as
	// acknowledged (client only) once a table is fully drained.
	revlog_ids: Vec<i64>,
	card_ids: Vec<ObjectId>,
	fact_ids: Vec<ObjectId>,
}

impl ChunkStreamer {
	/// Arm the streamer with the pending-table list `[revlog, cards,
	/// facts]` (§4.1 "prepareToChunk"). The USN column of every row is
	/// rewritten to `max_usn` on the wire so a receiving side persists
	/// it directly without further adjustment (§4.5).
	pub fn prepare(corpus: &mut dyn Corpus, predicate: UsnPredicate, max_usn: Usn) -> Self {
		let mut revlog: Vec<RevlogRow> = corpus.revlog_matching(predicate);
		let revlog_ids: Vec<i64> = revlog.iter().map(|r| r.id).collect();
		for r in &mut revlog {
			r.usn = max_usn;
		}

		let mut cards: Vec<CardRow> = corpus.cards_matching(predicate);
		let card_ids: Vec<ObjectId> = cards.iter().map(|r| r.id).collect();
		for r in &mut cards {
			r.usn = max_usn;
		}

		let mut facts: Vec<FactRow> = corpus.facts_matching(predicate);
		let fact_ids: Vec<ObjectId> = facts.iter().map(|r| r.id).collect();
		for r in &mut facts {
			r.usn = max_usn;
			r.sort_field = String::new();
		}

		debug!(
			revlog = revlog.len(),
			cards = cards.len(),
			facts = facts.len(),
			"armed chunk streamer"
		);

		ChunkStreamer {
			is_client: predicate.role() == Role::Client,
			max_usn,
			tables_left: VecDeque::from([TableKind::Revlog, TableKind::Cards, TableKind::Facts]),
			revlog: revlog.into(),
			cards: cards.into(),
			facts: facts.into(),
			revlog_ids,
			card_ids,
			fact_ids,
		}
	}

	/// Produce the next chunk, draining up to [`CHUNK_SIZE`] rows
	/// across however many tables remain (§4.5).
	pub fn next_chunk(&mut self, corpus: &mut dyn Corpus) -> Chunk {
		let mut lim = CHUNK_SIZE;
		let mut out = Chunk::default();

		while let Some(&table) = self.tables_left.front() {
			if lim == 0 {
				break;
			}
			let fetched = match table {
				TableKind::Revlog => {
					let take = lim.min(self.revlog.len());
					let batch: Vec<RevlogRow> = self.revlog.drain(..take).collect();
					let fetched = batch.len();
					if !batch.is_empty() {
						out.revlog.get_or_insert_with(Vec::new).extend(batch);
					}
					fetched
				}
				TableKind::Cards => {
					let take = lim.min(self.cards.len());
					let batch: Vec<CardRow> = self.cards.drain(..take).collect();
					let fetched = batch.len();
					if !batch.is_empty() {
						out.cards.get_or_insert_with(Vec::new).extend(batch);
					}
					fetched
				}
				TableKind::Facts => {
					let take = lim.min(self.facts.len());
					let batch: Vec<FactRow> = self.facts.drain(..take).collect();
					let fetched = batch.len();
					if !batch.is_empty() {
						out.facts.get_or_insert_with(Vec::new).extend(batch);
					}
					fetched
				}
			};

			if fetched < lim {
				self.tables_left.pop_front();
				if self.is_client {
					self.acknowledge(corpus, table);
				}
			}
			lim -= fetched;
		}

		out.done = self.tables_left.is_empty();
		out
	}

	fn acknowledge(&self, corpus: &mut dyn Corpus, table: TableKind) {
		match table {
			TableKind::Revlog => corpus.rewrite_revlog_usns_sent(&self.revlog_ids, self.max_usn),
			TableKind::Cards => corpus.rewrite_card_usns_sent(&self.card_ids, self.max_usn),
			TableKind::Facts => corpus.rewrite_fact_usns_sent(&self.fact_ids, self.max_usn),
		}
	}
}

/// Apply a received chunk (§4.5 `applyChunk`).
pub fn apply_chunk(corpus: &mut dyn Corpus, chunk: &Chunk, predicate: UsnPredicate) {
	if let Some(rows) = &chunk.revlog {
		corpus.insert_revlog_ignore(rows.clone());
	}
	if let Some(rows) = &chunk.cards {
		let retained = newer_cards(corpus, rows, predicate);
		let n = retained.len();
		corpus.upsert_cards(retained);
		trace!(received = rows.len(), applied = n, "merged card chunk");
	}
	if let Some(rows) = &chunk.facts {
		let retained = newer_facts(corpus, rows, predicate);
		let ids: Vec<ObjectId> = retained.iter().map(|r| r.id).collect();
		corpus.upsert_facts(retained);
		corpus.refresh_sort_field_cache(&ids);
	}
}

/// Retain incoming rows where no local row exists, or the incoming
/// `mtime` is strictly greater than the local one (§4.5 `newerRows`).
/// Only local rows matching the USN predicate are considered — a row
/// the receiver itself changed since `min_usn` cannot be clobbered by
/// an older inbound copy (§4.5).
fn newer_cards(corpus: &dyn Corpus, incoming: &[CardRow], predicate: UsnPredicate) -> Vec<CardRow> {
	let ids: Vec<ObjectId> = incoming.iter().map(|r| r.id).collect();
	let local = corpus.local_card_mtimes(&ids, predicate);
	incoming
		.iter()
		.filter(|r| local.get(&r.id).map(|&m| m < r.mtime).unwrap_or(true))
		.cloned()
		.collect()
}

fn newer_facts(corpus: &dyn Corpus, incoming: &[FactRow], predicate: UsnPredicate) -> Vec<FactRow> {
	let ids: Vec<ObjectId> = incoming.iter().map(|r| r.id).collect();
	let local = corpus.local_fact_mtimes(&ids, predicate);
	incoming
		.iter()
		.filter(|r| local.get(&r.id).map(|&m| m < r.mtime).unwrap_or(true))
		.cloned()
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::corpus::InMemoryCorpus;

	fn card(id: i64, mtime: i64, usn: Usn) -> CardRow {
		CardRow {
			id,
			fact_id: 1,
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

	#[test]
	fn large_table_streams_in_bounded_chunks() {
		let mut corpus = InMemoryCorpus::new();
		for i in 0..12_000i64 {
			corpus.insert_card(card(i, 1000 + i, -1));
		}

		let predicate = UsnPredicate::new(Role::Client, 0);
		let mut streamer = ChunkStreamer::prepare(&mut corpus, predicate, 7);

		let c1 = streamer.next_chunk(&mut corpus);
		assert_eq!(c1.cards.as_ref().unwrap().len(), 5000);
		assert!(!c1.done);

		let c2 = streamer.next_chunk(&mut corpus);
		assert_eq!(c2.cards.as_ref().unwrap().len(), 5000);
		assert!(!c2.done);

		let c3 = streamer.next_chunk(&mut corpus);
		assert_eq!(c3.cards.as_ref().unwrap().len(), 2000);
		assert!(c3.done);

		for i in 0..12_000i64 {
			assert_eq!(corpus.get_card(i).unwrap().usn, 7);
		}
	}

	#[test]
	fn newer_rows_only_replaces_strictly_older_local_copies() {
		let mut corpus = InMemoryCorpus::new();
		corpus.insert_card(card(1, 1000, 7));
		corpus.insert_card(card(2, 1000, 7));

		let incoming = vec![card(1, 500, 7), card(2, 2000, 7), card(3, 100, 7)];
		let predicate = UsnPredicate::new(Role::Server, 0);
		let retained = newer_cards(&corpus, &incoming, predicate);

		let ids: Vec<i64> = retained.iter().map(|r| r.id).collect();
		assert_eq!(ids, vec![2, 3]);
	}
}

// vim: ts=4
