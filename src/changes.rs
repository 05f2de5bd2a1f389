//! The change extractor (§4.3): bundles up small-object modifications
//! and deletions into a [`ChangeSet`].

use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, MetaKind};
use crate::model::{Grave, GraveKind, MetaRow, ObjectId, Usn};
use crate::usn::UsnPredicate;

/// Gravestones partitioned by object kind (§3, §6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graves {
	pub cards: Vec<ObjectId>,
	pub facts: Vec<ObjectId>,
	pub groups: Vec<ObjectId>,
}

/// The "small objects + deletions" change set exchanged in step 2 of
/// the session driver (§4.1, §6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
	pub models: Vec<MetaRow>,
	pub groups: Vec<MetaRow>,
	pub group_configs: Vec<MetaRow>,
	pub tags: Vec<String>,
	pub graves: Graves,
	/// Included only when the producing side has `l_newer = true` (§4.3).
	pub conf: Option<serde_json::Value>,
}

/// Build the change set for one side of a session (§4.3).
///
/// `predicate` selects "changed since last sync" rows; on the client
/// side this call also rewrites those rows' `usn` to `max_usn` in
/// memory and persists the rewrite, since they are about to be
/// acknowledged by the peer.
pub fn extract_changes(
	corpus: &mut dyn Corpus,
	predicate: UsnPredicate,
	max_usn: Usn,
	l_newer: bool,
) -> ChangeSet {
	let is_client = matches!(predicate.role(), crate::usn::Role::Client);

	let models = extract_meta(corpus, MetaKind::Model, predicate, max_usn, is_client);
	let groups = extract_meta(corpus, MetaKind::Group, predicate, max_usn, is_client);
	let group_configs = extract_meta(corpus, MetaKind::GroupConfig, predicate, max_usn, is_client);

	let mut tags: Vec<String> = corpus.tags_matching(predicate);
	if is_client {
		corpus.rewrite_tag_usns(&tags, max_usn);
	}
	tags.sort();

	let graves = extract_graves(corpus, predicate, max_usn, is_client);

	let conf = if l_newer { Some(corpus.meta().conf) } else { None };

	ChangeSet { models, groups, group_configs, tags, graves, conf }
}

fn extract_meta(
	corpus: &mut dyn Corpus,
	kind: MetaKind,
	predicate: UsnPredicate,
	max_usn: Usn,
	is_client: bool,
) -> Vec<MetaRow> {
	let mut rows = corpus.meta_rows(kind, predicate);
	if is_client {
		let ids: Vec<ObjectId> = rows.iter().map(|r| r.id).collect();
		corpus.rewrite_meta_usns(kind, &ids, max_usn);
		for row in &mut rows {
			row.usn = max_usn;
		}
	}
	rows
}

fn extract_graves(
	corpus: &mut dyn Corpus,
	predicate: UsnPredicate,
	max_usn: Usn,
	is_client: bool,
) -> Graves {
	let graves: Vec<Grave> = corpus.graves_matching(predicate);
	if is_client {
		let keys: Vec<(ObjectId, GraveKind)> = graves.iter().map(|g| (g.oid, g.kind)).collect();
		corpus.rewrite_grave_usns(&keys, max_usn);
	}

	let mut out = Graves::default();
	for g in graves {
		match g.kind {
			GraveKind::Card => out.cards.push(g.oid),
			GraveKind::Fact => out.facts.push(g.oid),
			GraveKind::Group => out.groups.push(g.oid),
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::corpus::InMemoryCorpus;
	use crate::model::CorpusMeta;
	use crate::usn::Role;

	fn meta_row(id: ObjectId, usn: Usn) -> MetaRow {
		MetaRow { id, mtime: 100, usn, payload: serde_json::json!({"name": "x"}) }
	}

	#[test]
	fn client_extraction_rewrites_dirty_rows_to_max_usn() {
		let mut corpus = InMemoryCorpus::new();
		corpus.put_meta_row(MetaKind::Model, meta_row(1, -1));
		corpus.register_tags(&["leech".to_string()], -1);
		corpus.put_grave(Grave { oid: 5, kind: GraveKind::Card, usn: -1 });

		let predicate = UsnPredicate::new(Role::Client, 0);
		let changes = extract_changes(&mut corpus, predicate, 7, false);

		assert_eq!(changes.models.len(), 1);
		assert_eq!(changes.models[0].usn, 7);
		assert_eq!(corpus.get_meta_row(MetaKind::Model, 1).unwrap().usn, 7);
		assert_eq!(changes.tags, vec!["leech".to_string()]);
		assert_eq!(corpus.tags_matching(UsnPredicate::new(Role::Client, 0)).len(), 0);
		assert_eq!(changes.graves.cards, vec![5]);
		assert!(changes.conf.is_none());
	}

	#[test]
	fn server_extraction_does_not_rewrite_usns() {
		let mut corpus = InMemoryCorpus::new();
		corpus.set_meta(CorpusMeta { usn: 7, ..CorpusMeta::default() });
		corpus.put_meta_row(MetaKind::Model, meta_row(1, 7));

		let predicate = UsnPredicate::new(Role::Server, 7);
		let changes = extract_changes(&mut corpus, predicate, 7, true);

		assert_eq!(changes.models.len(), 1);
		assert!(changes.conf.is_some());
	}
}

// vim: ts=4
