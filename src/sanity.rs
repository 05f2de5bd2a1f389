//! The sanity checker (§4.6): a fixed-shape row-count vector plus the
//! four post-merge invariants that must hold before a session commits.

use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, MetaKind};
use crate::error::IntegrityViolation;
use crate::model::DIRTY;

/// Nine integers, in the order the specification fixes them. Equality
/// of this vector between client and server is the protocol's
/// acceptance test for a session (§4.6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanityVector {
	pub cards: usize,
	pub facts: usize,
	pub revlog: usize,
	pub field_sums: usize,
	pub graves: usize,
	pub models: usize,
	pub tags: usize,
	pub groups: usize,
	pub group_configs: usize,
}

/// Compute the vector for one side (§4.6). Does not itself check
/// invariants — call [`check_invariants`] first, since a corpus that
/// fails an invariant shouldn't have its vector trusted either.
pub fn sanity_vector(corpus: &dyn Corpus) -> SanityVector {
	SanityVector {
		cards: corpus.card_count(),
		facts: corpus.fact_count(),
		revlog: corpus.revlog_count(),
		field_sums: corpus.field_sum_count(),
		graves: corpus.grave_count(),
		models: corpus.meta_count(MetaKind::Model),
		tags: corpus.tag_count(),
		groups: corpus.meta_count(MetaKind::Group),
		group_configs: corpus.meta_count(MetaKind::GroupConfig),
	}
}

/// Validate the four post-merge invariants (§4.6). Returns every
/// violation found rather than stopping at the first, so the caller
/// can log a complete forensic picture before aborting.
pub fn check_invariants(corpus: &dyn Corpus) -> Vec<IntegrityViolation> {
	let mut violations = Vec::new();

	for (card_id, fact_id) in corpus.cards_without_facts() {
		violations.push(IntegrityViolation::CardWithoutFact { card_id, fact_id });
	}
	for fact_id in corpus.facts_without_cards() {
		violations.push(IntegrityViolation::FactWithoutCards { fact_id });
	}

	if corpus.card_dirty_count() > 0 {
		violations.push(IntegrityViolation::DirtyRowSurvivedSync { table: "cards" });
	}
	if corpus.fact_dirty_count() > 0 {
		violations.push(IntegrityViolation::DirtyRowSurvivedSync { table: "facts" });
	}
	if corpus.revlog_dirty_count() > 0 {
		violations.push(IntegrityViolation::DirtyRowSurvivedSync { table: "revlog" });
	}
	if corpus.grave_dirty_count() > 0 {
		violations.push(IntegrityViolation::DirtyRowSurvivedSync { table: "graves" });
	}

	if corpus.meta_dirty_count(MetaKind::Model) > 0 {
		violations.push(IntegrityViolation::DirtyMetadataSurvivedSync { kind: "models" });
	}
	if corpus.tag_dirty_count() > 0 {
		violations.push(IntegrityViolation::DirtyMetadataSurvivedSync { kind: "tags" });
	}
	if corpus.meta_dirty_count(MetaKind::Group) > 0 {
		violations.push(IntegrityViolation::DirtyMetadataSurvivedSync { kind: "groups" });
	}

	debug_assert!(DIRTY == -1);
	violations
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::corpus::InMemoryCorpus;
	use crate::model::{CardRow, FactRow};

	fn fact(id: i64) -> FactRow {
		FactRow {
			id,
			guid: format!("g{}", id),
			model_id: 1,
			group_id: 1,
			mtime: 100,
			usn: 7,
			tags: String::new(),
			fields: "front\u{1f}back".to_string(),
			sort_field: String::new(),
			flags: 0,
			data: String::new(),
		}
	}

	fn card(id: i64, fact_id: i64, usn: i32) -> CardRow {
		CardRow {
			id,
			fact_id,
			group_id: 1,
			ordinal: 0,
			mtime: 100,
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
	fn clean_corpus_has_no_violations() {
		let mut corpus = InMemoryCorpus::new();
		corpus.insert_fact(fact(1));
		corpus.insert_card(card(10, 1, 7));

		assert!(check_invariants(&corpus).is_empty());
		let v = sanity_vector(&corpus);
		assert_eq!(v.cards, 1);
		assert_eq!(v.facts, 1);
		assert_eq!(v.field_sums, 2);
	}

	#[test]
	fn orphaned_card_and_dirty_row_are_both_reported() {
		let mut corpus = InMemoryCorpus::new();
		corpus.insert_fact(fact(1));
		corpus.insert_card(card(10, 1, 7));
		corpus.insert_card(card(11, 999, -1));

		let violations = check_invariants(&corpus);
		assert!(violations.contains(&IntegrityViolation::CardWithoutFact { card_id: 11, fact_id: 999 }));
		assert!(violations.contains(&IntegrityViolation::DirtyRowSurvivedSync { table: "cards" }));
	}

	#[test]
	fn fact_without_cards_is_reported() {
		let mut corpus = InMemoryCorpus::new();
		corpus.insert_fact(fact(1));

		let violations = check_invariants(&corpus);
		assert_eq!(violations, vec![IntegrityViolation::FactWithoutCards { fact_id: 1 }]);
	}

	#[test]
	fn identical_corpora_produce_equal_vectors() {
		let mut a = InMemoryCorpus::new();
		let mut b = InMemoryCorpus::new();
		for c in [&mut a, &mut b] {
			c.insert_fact(fact(1));
			c.insert_card(card(10, 1, 7));
		}
		assert_eq!(sanity_vector(&a), sanity_vector(&b));
	}
}

// vim: ts=4
