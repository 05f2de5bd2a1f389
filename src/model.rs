//! The corpus data model (§3).
//!
//! These are the typed, tagged records the sync core reads and writes.
//! Field order follows the column order fixed by the specification;
//! it is documentation, not wire-significant (see DESIGN.md).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Row/object id. Facts, cards, models, groups and group-configs all
/// share this id space conceptually, though each table's ids are
/// independent.
pub type ObjectId = i64;

/// Update sequence number. `-1` is the client-side "dirty" sentinel;
/// all other values are non-negative and assigned by the server.
pub type Usn = i32;

/// Modification timestamp, in whatever unit the embedding application
/// uses consistently (seconds, typically). Only relative ordering
/// matters to the core.
pub type Mtime = i64;

pub const DIRTY: Usn = -1;

/// A scheduling record (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRow {
	pub id: ObjectId,
	pub fact_id: ObjectId,
	pub group_id: ObjectId,
	pub ordinal: i32,
	pub mtime: Mtime,
	pub usn: Usn,
	pub card_type: i32,
	pub queue: i32,
	pub due: i32,
	pub interval: i32,
	pub ease_factor: i32,
	pub reps: i32,
	pub lapses: i32,
	pub left_steps: i32,
	pub edue: i32,
	pub flags: i32,
	pub data: String,
}

/// A note source (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
	pub id: ObjectId,
	pub guid: String,
	pub model_id: ObjectId,
	pub group_id: ObjectId,
	pub mtime: Mtime,
	pub usn: Usn,
	pub tags: String,
	pub fields: String,
	/// Denormalized sort-field cache; the wire format always carries an
	/// empty placeholder here, refreshed locally after applying (§4.5).
	pub sort_field: String,
	pub flags: i32,
	pub data: String,
}

/// An append-only study event (§3). `id` is the event timestamp in ms
/// and doubles as the primary key for insert-or-ignore deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevlogRow {
	pub id: i64,
	pub card_id: ObjectId,
	pub usn: Usn,
	pub ease: i32,
	pub interval: i32,
	pub last_interval: i32,
	pub factor: i32,
	pub elapsed_ms: i32,
	pub review_type: i32,
}

/// The kind of object a gravestone marks as deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GraveKind {
	Card,
	Fact,
	Group,
}

/// A tombstone record (§3). Deleting a fact also removes its cards;
/// that cascade produces additional `Card` gravestones (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grave {
	pub oid: ObjectId,
	pub kind: GraveKind,
	pub usn: Usn,
}

/// A note-type model, a studying group (deck), or a group's
/// configuration — the three small metadata collections whose payload
/// the spec leaves schema-agnostic (§3, §3.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRow {
	pub id: ObjectId,
	pub mtime: Mtime,
	pub usn: Usn,
	pub payload: serde_json::Value,
}

pub type ModelRow = MetaRow;
pub type GroupRow = MetaRow;
pub type GroupConfigRow = MetaRow;

/// `name -> usn` pairs (§3). Tags have union semantics only; there is
/// no per-tag modification time to compare.
pub type TagSet = HashMap<String, Usn>;

/// Corpus-wide metadata (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusMeta {
	/// Latest modification time of anything in the corpus
	pub mtime: Mtime,
	/// Schema modification time; bumped on structural change
	pub scm: Mtime,
	/// The corpus's current update-sequence number
	pub usn: Usn,
	/// Timestamp of the last completed sync
	pub last_sync: Mtime,
	/// Freeform deck-wide configuration blob
	pub conf: serde_json::Value,
}

// vim: ts=4
