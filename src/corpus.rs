//! The `Corpus` trait: the out-of-scope "relational store" interface
//! the sync core actually consumes (§1, §3). A concrete SQLite-backed
//! implementation is assumed by the specification and is not part of
//! this crate; [`InMemoryCorpus`] is a reference implementation used
//! by the test suite and the demonstration CLI.

use std::collections::{HashMap, HashSet};

use crate::model::{
	CardRow, CorpusMeta, FactRow, Grave, GraveKind, MetaRow, Mtime, ObjectId, RevlogRow, TagSet,
	Usn, DIRTY,
};
use crate::usn::UsnPredicate;

/// Which small-metadata collection a call is about (§3: models, groups,
/// group-configs all share id/mtime/usn + a class-specific payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKind {
	Model,
	Group,
	GroupConfig,
}

impl MetaKind {
	pub fn label(&self) -> &'static str {
		match self {
			MetaKind::Model => "models",
			MetaKind::Group => "groups",
			MetaKind::GroupConfig => "group-configs",
		}
	}
}

/// The interface the sync core needs from "the database" (§1, §3).
///
/// Implementations are expected to be backed by a real relational
/// store; the core performs all of a session's mutations inside a
/// single write transaction, committed only in `finish` (§5).
pub trait Corpus {
	fn meta(&self) -> CorpusMeta;
	fn set_meta(&mut self, meta: CorpusMeta);

	// -- models / groups / group-configs (§4.3, §4.4) ---------------
	fn meta_rows(&self, kind: MetaKind, predicate: UsnPredicate) -> Vec<MetaRow>;
	fn rewrite_meta_usns(&mut self, kind: MetaKind, ids: &[ObjectId], usn: Usn);
	fn get_meta_row(&self, kind: MetaKind, id: ObjectId) -> Option<MetaRow>;
	fn put_meta_row(&mut self, kind: MetaKind, row: MetaRow);
	fn meta_count(&self, kind: MetaKind) -> usize;
	fn meta_dirty_count(&self, kind: MetaKind) -> usize;

	// -- tags (§4.3, §4.4) --------------------------------------------
	fn tags_matching(&self, predicate: UsnPredicate) -> Vec<String>;
	fn rewrite_tag_usns(&mut self, names: &[String], usn: Usn);
	fn register_tags(&mut self, names: &[String], usn: Usn);
	fn tag_count(&self) -> usize;
	fn tag_dirty_count(&self) -> usize;

	// -- gravestones (§4.3, §4.4) --------------------------------------
	fn graves_matching(&self, predicate: UsnPredicate) -> Vec<Grave>;
	fn rewrite_grave_usns(&mut self, keys: &[(ObjectId, GraveKind)], usn: Usn);
	fn put_grave(&mut self, grave: Grave);
	fn grave_count(&self) -> usize;
	fn grave_dirty_count(&self) -> usize;
	/// Remove a fact and cascade-remove any local cards referencing it.
	/// Returns the ids of cards actually removed by the cascade.
	fn remove_fact(&mut self, id: ObjectId) -> Vec<ObjectId>;
	fn remove_card(&mut self, id: ObjectId) -> bool;
	fn remove_group(&mut self, id: ObjectId) -> bool;

	// -- large tables (§4.5) -------------------------------------------
	fn cards_matching(&self, predicate: UsnPredicate) -> Vec<CardRow>;
	fn facts_matching(&self, predicate: UsnPredicate) -> Vec<FactRow>;
	fn revlog_matching(&self, predicate: UsnPredicate) -> Vec<RevlogRow>;

	fn rewrite_card_usns_sent(&mut self, ids: &[ObjectId], usn: Usn);
	fn rewrite_fact_usns_sent(&mut self, ids: &[ObjectId], usn: Usn);
	fn rewrite_revlog_usns_sent(&mut self, ids: &[i64], usn: Usn);

	fn insert_revlog_ignore(&mut self, rows: Vec<RevlogRow>);

	/// Local `(id, mtime)` restricted to `ids` and matching `predicate`,
	/// used by [`crate::chunk`] to compute `newer_rows` (§4.5).
	fn local_card_mtimes(&self, ids: &[ObjectId], predicate: UsnPredicate) -> HashMap<ObjectId, Mtime>;
	fn local_fact_mtimes(&self, ids: &[ObjectId], predicate: UsnPredicate) -> HashMap<ObjectId, Mtime>;

	fn upsert_cards(&mut self, rows: Vec<CardRow>);
	fn upsert_facts(&mut self, rows: Vec<FactRow>);
	fn refresh_sort_field_cache(&mut self, fact_ids: &[ObjectId]);

	// -- sanity (§4.6) ---------------------------------------------------
	fn card_count(&self) -> usize;
	fn fact_count(&self) -> usize;
	fn revlog_count(&self) -> usize;
	/// Count of non-empty fields across all facts (a simplified stand-in
	/// for the field-checksum cache's row count; see DESIGN.md).
	fn field_sum_count(&self) -> usize;
	fn card_dirty_count(&self) -> usize;
	fn fact_dirty_count(&self) -> usize;
	fn revlog_dirty_count(&self) -> usize;
	/// `(card_id, fact_id)` pairs where `fact_id` does not exist.
	fn cards_without_facts(&self) -> Vec<(ObjectId, ObjectId)>;
	/// Fact ids with no referencing card.
	fn facts_without_cards(&self) -> Vec<ObjectId>;

	// -- transaction boundary (§5) ---------------------------------------
	fn begin(&mut self);
	fn commit(&mut self);
	fn rollback(&mut self);
}

/// An in-memory reference implementation of [`Corpus`].
///
/// Not a persistence layer the specification requires — a concrete
/// stand-in for "the database" so the protocol is exercisable in
/// tests and the demonstration CLI without a SQLite binding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
	meta: CorpusMeta,
	models: HashMap<ObjectId, MetaRow>,
	groups: HashMap<ObjectId, MetaRow>,
	group_configs: HashMap<ObjectId, MetaRow>,
	tags: TagSet,
	graves: HashMap<(ObjectId, GraveKind), Usn>,
	cards: HashMap<ObjectId, CardRow>,
	facts: HashMap<ObjectId, FactRow>,
	revlog: HashMap<i64, RevlogRow>,
	snapshot: Option<Box<InMemoryCorpus>>,
}

impl Default for CorpusMeta {
	fn default() -> Self {
		CorpusMeta { mtime: 0, scm: 0, usn: 0, last_sync: 0, conf: serde_json::json!({}) }
	}
}

impl InMemoryCorpus {
	pub fn new() -> Self {
		InMemoryCorpus::default()
	}

	fn meta_table(&self, kind: MetaKind) -> &HashMap<ObjectId, MetaRow> {
		match kind {
			MetaKind::Model => &self.models,
			MetaKind::Group => &self.groups,
			MetaKind::GroupConfig => &self.group_configs,
		}
	}

	fn meta_table_mut(&mut self, kind: MetaKind) -> &mut HashMap<ObjectId, MetaRow> {
		match kind {
			MetaKind::Model => &mut self.models,
			MetaKind::Group => &mut self.groups,
			MetaKind::GroupConfig => &mut self.group_configs,
		}
	}

	/// Direct accessors for tests that want to seed or inspect state
	/// without going through the `Corpus` trait.
	pub fn insert_card(&mut self, row: CardRow) {
		self.cards.insert(row.id, row);
	}

	pub fn insert_fact(&mut self, row: FactRow) {
		self.facts.insert(row.id, row);
	}

	pub fn get_card(&self, id: ObjectId) -> Option<&CardRow> {
		self.cards.get(&id)
	}

	pub fn get_fact(&self, id: ObjectId) -> Option<&FactRow> {
		self.facts.get(&id)
	}

	pub fn has_grave(&self, oid: ObjectId, kind: GraveKind) -> Option<Usn> {
		self.graves.get(&(oid, kind)).copied()
	}
}

impl Corpus for InMemoryCorpus {
	fn meta(&self) -> CorpusMeta {
		self.meta.clone()
	}

	fn set_meta(&mut self, meta: CorpusMeta) {
		self.meta = meta;
	}

	fn meta_rows(&self, kind: MetaKind, predicate: UsnPredicate) -> Vec<MetaRow> {
		self.meta_table(kind).values().filter(|r| predicate.matches(r.usn)).cloned().collect()
	}

	fn rewrite_meta_usns(&mut self, kind: MetaKind, ids: &[ObjectId], usn: Usn) {
		let table = self.meta_table_mut(kind);
		for id in ids {
			if let Some(row) = table.get_mut(id) {
				row.usn = usn;
			}
		}
	}

	fn get_meta_row(&self, kind: MetaKind, id: ObjectId) -> Option<MetaRow> {
		self.meta_table(kind).get(&id).cloned()
	}

	fn put_meta_row(&mut self, kind: MetaKind, row: MetaRow) {
		self.meta_table_mut(kind).insert(row.id, row);
	}

	fn meta_count(&self, kind: MetaKind) -> usize {
		self.meta_table(kind).len()
	}

	fn meta_dirty_count(&self, kind: MetaKind) -> usize {
		self.meta_table(kind).values().filter(|r| r.usn == DIRTY).count()
	}

	fn tags_matching(&self, predicate: UsnPredicate) -> Vec<String> {
		self.tags.iter().filter(|(_, usn)| predicate.matches(**usn)).map(|(t, _)| t.clone()).collect()
	}

	fn rewrite_tag_usns(&mut self, names: &[String], usn: Usn) {
		for name in names {
			if let Some(v) = self.tags.get_mut(name) {
				*v = usn;
			}
		}
	}

	fn register_tags(&mut self, names: &[String], usn: Usn) {
		for name in names {
			self.tags.insert(name.clone(), usn);
		}
	}

	fn tag_count(&self) -> usize {
		self.tags.len()
	}

	fn tag_dirty_count(&self) -> usize {
		self.tags.values().filter(|usn| **usn == DIRTY).count()
	}

	fn graves_matching(&self, predicate: UsnPredicate) -> Vec<Grave> {
		self.graves
			.iter()
			.filter(|(_, usn)| predicate.matches(**usn))
			.map(|((oid, kind), usn)| Grave { oid: *oid, kind: *kind, usn: *usn })
			.collect()
	}

	fn rewrite_grave_usns(&mut self, keys: &[(ObjectId, GraveKind)], usn: Usn) {
		for key in keys {
			if let Some(v) = self.graves.get_mut(key) {
				*v = usn;
			}
		}
	}

	fn put_grave(&mut self, grave: Grave) {
		self.graves.insert((grave.oid, grave.kind), grave.usn);
	}

	fn grave_count(&self) -> usize {
		self.graves.len()
	}

	fn grave_dirty_count(&self) -> usize {
		self.graves.values().filter(|usn| **usn == DIRTY).count()
	}

	fn remove_fact(&mut self, id: ObjectId) -> Vec<ObjectId> {
		self.facts.remove(&id);
		let cascaded: Vec<ObjectId> =
			self.cards.values().filter(|c| c.fact_id == id).map(|c| c.id).collect();
		for cid in &cascaded {
			self.cards.remove(cid);
		}
		cascaded
	}

	fn remove_card(&mut self, id: ObjectId) -> bool {
		self.cards.remove(&id).is_some()
	}

	fn remove_group(&mut self, id: ObjectId) -> bool {
		self.groups.remove(&id).is_some()
	}

	fn cards_matching(&self, predicate: UsnPredicate) -> Vec<CardRow> {
		self.cards.values().filter(|r| predicate.matches(r.usn)).cloned().collect()
	}

	fn facts_matching(&self, predicate: UsnPredicate) -> Vec<FactRow> {
		self.facts.values().filter(|r| predicate.matches(r.usn)).cloned().collect()
	}

	fn revlog_matching(&self, predicate: UsnPredicate) -> Vec<RevlogRow> {
		self.revlog.values().filter(|r| predicate.matches(r.usn)).cloned().collect()
	}

	fn rewrite_card_usns_sent(&mut self, ids: &[ObjectId], usn: Usn) {
		for id in ids {
			if let Some(row) = self.cards.get_mut(id) {
				row.usn = usn;
			}
		}
	}

	fn rewrite_fact_usns_sent(&mut self, ids: &[ObjectId], usn: Usn) {
		for id in ids {
			if let Some(row) = self.facts.get_mut(id) {
				row.usn = usn;
			}
		}
	}

	fn rewrite_revlog_usns_sent(&mut self, ids: &[i64], usn: Usn) {
		for id in ids {
			if let Some(row) = self.revlog.get_mut(id) {
				row.usn = usn;
			}
		}
	}

	fn insert_revlog_ignore(&mut self, rows: Vec<RevlogRow>) {
		for row in rows {
			self.revlog.entry(row.id).or_insert(row);
		}
	}

	fn local_card_mtimes(&self, ids: &[ObjectId], predicate: UsnPredicate) -> HashMap<ObjectId, Mtime> {
		let want: HashSet<&ObjectId> = ids.iter().collect();
		self.cards
			.values()
			.filter(|r| want.contains(&r.id) && predicate.matches(r.usn))
			.map(|r| (r.id, r.mtime))
			.collect()
	}

	fn local_fact_mtimes(&self, ids: &[ObjectId], predicate: UsnPredicate) -> HashMap<ObjectId, Mtime> {
		let want: HashSet<&ObjectId> = ids.iter().collect();
		self.facts
			.values()
			.filter(|r| want.contains(&r.id) && predicate.matches(r.usn))
			.map(|r| (r.id, r.mtime))
			.collect()
	}

	fn upsert_cards(&mut self, rows: Vec<CardRow>) {
		for row in rows {
			self.cards.insert(row.id, row);
		}
	}

	fn upsert_facts(&mut self, rows: Vec<FactRow>) {
		for row in rows {
			self.facts.insert(row.id, row);
		}
	}

	fn refresh_sort_field_cache(&mut self, fact_ids: &[ObjectId]) {
		for id in fact_ids {
			if let Some(fact) = self.facts.get_mut(id) {
				fact.sort_field = fact.fields.split('\u{1f}').next().unwrap_or("").to_string();
			}
		}
	}

	fn card_count(&self) -> usize {
		self.cards.len()
	}

	fn fact_count(&self) -> usize {
		self.facts.len()
	}

	fn revlog_count(&self) -> usize {
		self.revlog.len()
	}

	fn field_sum_count(&self) -> usize {
		self.facts
			.values()
			.map(|f| f.fields.split('\u{1f}').filter(|s| !s.is_empty()).count())
			.sum()
	}

	fn card_dirty_count(&self) -> usize {
		self.cards.values().filter(|r| r.usn == DIRTY).count()
	}

	fn fact_dirty_count(&self) -> usize {
		self.facts.values().filter(|r| r.usn == DIRTY).count()
	}

	fn revlog_dirty_count(&self) -> usize {
		self.revlog.values().filter(|r| r.usn == DIRTY).count()
	}

	fn cards_without_facts(&self) -> Vec<(ObjectId, ObjectId)> {
		self.cards
			.values()
			.filter(|c| !self.facts.contains_key(&c.fact_id))
			.map(|c| (c.id, c.fact_id))
			.collect()
	}

	fn facts_without_cards(&self) -> Vec<ObjectId> {
		let referenced: HashSet<ObjectId> = self.cards.values().map(|c| c.fact_id).collect();
		self.facts.keys().filter(|id| !referenced.contains(id)).copied().collect()
	}

	fn begin(&mut self) {
		self.snapshot = Some(Box::new(self.shallow_clone_without_snapshot()));
	}

	fn commit(&mut self) {
		self.snapshot = None;
	}

	fn rollback(&mut self) {
		if let Some(snapshot) = self.snapshot.take() {
			*self = *snapshot;
		}
	}
}

impl InMemoryCorpus {
	fn shallow_clone_without_snapshot(&self) -> InMemoryCorpus {
		InMemoryCorpus {
			meta: self.meta.clone(),
			models: self.models.clone(),
			groups: self.groups.clone(),
			group_configs: self.group_configs.clone(),
			tags: self.tags.clone(),
			graves: self.graves.clone(),
			cards: self.cards.clone(),
			facts: self.facts.clone(),
			revlog: self.revlog.clone(),
			snapshot: None,
		}
	}
}

// vim: ts=4
