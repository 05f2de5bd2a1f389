//! The USN allocator & gravestone discriminator (§4.2).
//!
//! Every query that decides "what changed since last sync" goes
//! through [`UsnPredicate`]. It is derived once per session from the
//! session's [`Role`] and `min_usn`, and reused by the change
//! extractor, the change merger and the chunk streamer, rather than
//! re-derived at each call site.

use crate::model::{Usn, DIRTY};

/// Which side of a sync session this corpus is playing.
///
/// A single [`crate::session::SyncSession`] is parameterised by `Role`
/// rather than being one of two distinct client/server types (§9,
/// "server/client symmetry").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	Client,
	Server,
}

/// The "what changed" discriminator (§4.2).
///
/// - On the server: `usn >= min_usn`.
/// - On the client: `usn == -1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsnPredicate {
	role: Role,
	min_usn: Usn,
}

impl UsnPredicate {
	pub fn new(role: Role, min_usn: Usn) -> Self {
		UsnPredicate { role, min_usn }
	}

	pub fn role(&self) -> Role {
		self.role
	}

	pub fn min_usn(&self) -> Usn {
		self.min_usn
	}

	/// Whether a row with the given `usn` matches "changed since last sync".
	pub fn matches(&self, usn: Usn) -> bool {
		match self.role {
			Role::Server => usn >= self.min_usn,
			Role::Client => usn == DIRTY,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn client_predicate_only_matches_dirty_sentinel() {
		let p = UsnPredicate::new(Role::Client, 7);
		assert!(p.matches(DIRTY));
		assert!(!p.matches(0));
		assert!(!p.matches(7));
	}

	#[test]
	fn server_predicate_matches_anything_at_or_above_min_usn() {
		let p = UsnPredicate::new(Role::Server, 7);
		assert!(!p.matches(6));
		assert!(p.matches(7));
		assert!(p.matches(100));
		assert!(!p.matches(DIRTY));
	}
}

// vim: ts=4
