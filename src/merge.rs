//! The change merger (§4.4): applies a received [`ChangeSet`] using
//! last-writer-wins on modification time.

use crate::changes::{ChangeSet, Graves};
use crate::corpus::{Corpus, MetaKind};
use crate::logging::*;
use crate::model::{Grave, GraveKind, MetaRow, Usn};

/// Merge a peer's change set into the local corpus (§4.4).
///
/// `max_usn` is the session's `maxUsn`: the value every gravestone and
/// tag registered by this merge is stamped with, matching the usn the
/// rows already carry on the wire (§4.3 rewrote them before sending).
pub fn merge_changes(corpus: &mut dyn Corpus, received: &ChangeSet, max_usn: Usn) {
	merge_graves(corpus, &received.graves, max_usn);
	merge_meta(corpus, MetaKind::Model, &received.models);
	merge_meta(corpus, MetaKind::Group, &received.groups);
	merge_meta(corpus, MetaKind::GroupConfig, &received.group_configs);
	merge_tags(corpus, &received.tags, max_usn);
	if let Some(conf) = &received.conf {
		merge_conf(corpus, conf.clone());
	}
}

/// Facts first (cascading their cards), then standalone cards, then
/// groups — this ordering prevents re-creating gravestones for cards
/// whose fact is about to be erased (§4.4).
fn merge_graves(corpus: &mut dyn Corpus, graves: &Graves, max_usn: Usn) {
	for &fact_id in &graves.facts {
		corpus.put_grave(Grave { oid: fact_id, kind: GraveKind::Fact, usn: max_usn });
		let cascaded = corpus.remove_fact(fact_id);
		for card_id in cascaded {
			if !graves.cards.contains(&card_id) {
				debug!(fact_id, card_id, "cascading gravestone for card deleted with its fact");
				corpus.put_grave(Grave { oid: card_id, kind: GraveKind::Card, usn: max_usn });
			}
		}
	}
	for &card_id in &graves.cards {
		corpus.put_grave(Grave { oid: card_id, kind: GraveKind::Card, usn: max_usn });
		corpus.remove_card(card_id);
	}
	for &group_id in &graves.groups {
		corpus.put_grave(Grave { oid: group_id, kind: GraveKind::Group, usn: max_usn });
		corpus.remove_group(group_id);
	}
}

/// Insert if absent; otherwise overwrite iff the incoming row is
/// strictly newer. Equal mtimes leave the local copy (§4.4).
fn merge_meta(corpus: &mut dyn Corpus, kind: MetaKind, rows: &[MetaRow]) {
	for row in rows {
		match corpus.get_meta_row(kind, row.id) {
			None => corpus.put_meta_row(kind, row.clone()),
			Some(local) if row.mtime > local.mtime => corpus.put_meta_row(kind, row.clone()),
			_ => {}
		}
	}
}

/// Tags are union-semantics: no mtime comparison (§4.4).
fn merge_tags(corpus: &mut dyn Corpus, tags: &[String], max_usn: Usn) {
	if !tags.is_empty() {
		corpus.register_tags(tags, max_usn);
	}
}

/// Replace the local `conf` blob wholesale (§4.4).
fn merge_conf(corpus: &mut dyn Corpus, conf: serde_json::Value) {
	let mut meta = corpus.meta();
	meta.conf = conf;
	corpus.set_meta(meta);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::corpus::InMemoryCorpus;
	use crate::model::{CardRow, FactRow};

	fn fact(id: i64, mtime: i64) -> FactRow {
		FactRow {
			id,
			guid: format!("g{}", id),
			model_id: 1,
			group_id: 1,
			mtime,
			usn: 7,
			tags: String::new(),
			fields: "front\u{1f}back".to_string(),
			sort_field: String::new(),
			flags: 0,
			data: String::new(),
		}
	}

	fn card(id: i64, fact_id: i64, mtime: i64) -> CardRow {
		CardRow {
			id,
			fact_id,
			group_id: 1,
			ordinal: 0,
			mtime,
			usn: 7,
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
	fn fact_grave_cascades_its_cards_and_synthesizes_their_gravestone() {
		let mut corpus = InMemoryCorpus::new();
		corpus.insert_fact(fact(1, 100));
		corpus.insert_card(card(10, 1, 100));
		corpus.insert_card(card(11, 1, 100));

		let graves = Graves { cards: vec![], facts: vec![1], groups: vec![] };
		merge_graves(&mut corpus, &graves, 7);

		assert!(corpus.get_fact(1).is_none());
		assert!(corpus.get_card(10).is_none());
		assert!(corpus.get_card(11).is_none());
		assert_eq!(corpus.has_grave(1, GraveKind::Fact), Some(7));
		assert_eq!(corpus.has_grave(10, GraveKind::Card), Some(7));
		assert_eq!(corpus.has_grave(11, GraveKind::Card), Some(7));
	}

	#[test]
	fn meta_merge_is_last_writer_wins_strict() {
		let mut corpus = InMemoryCorpus::new();
		corpus.put_meta_row(
			MetaKind::Model,
			MetaRow { id: 1, mtime: 1000, usn: 7, payload: serde_json::json!({"v": "local"}) },
		);

		let older = MetaRow { id: 1, mtime: 500, usn: 7, payload: serde_json::json!({"v": "older"}) };
		let newer = MetaRow { id: 1, mtime: 1500, usn: 7, payload: serde_json::json!({"v": "newer"}) };
		let equal = MetaRow { id: 1, mtime: 1500, usn: 7, payload: serde_json::json!({"v": "equal"}) };

		merge_meta(&mut corpus, MetaKind::Model, &[older]);
		assert_eq!(corpus.get_meta_row(MetaKind::Model, 1).unwrap().payload["v"], "local");

		merge_meta(&mut corpus, MetaKind::Model, &[newer]);
		assert_eq!(corpus.get_meta_row(MetaKind::Model, 1).unwrap().payload["v"], "newer");

		merge_meta(&mut corpus, MetaKind::Model, &[equal]);
		assert_eq!(corpus.get_meta_row(MetaKind::Model, 1).unwrap().payload["v"], "newer");
	}
}

// vim: ts=4
