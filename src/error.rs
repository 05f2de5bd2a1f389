//! Error types for synchronization operations

use std::error::Error;
use std::fmt;

use crate::sanity::SanityVector;

/// Main error type for sync operations
///
/// This is the unified error type that encompasses all sync-related errors.
/// It contains both direct variants for common errors and nested variants
/// for domain-specific errors.
#[derive(Debug)]
pub enum SyncError {
	/// Failed to reach the remote peer
	Connection(ConnectionError),

	/// Session key was rejected by the server
	AuthFailed,

	/// Post-merge sanity vectors disagreed between client and server
	SanityMismatch { local: SanityVector, remote: SanityVector },

	/// A sanity-check invariant was violated on one side
	IntegrityViolation(IntegrityViolation),

	/// The session was aborted by the caller (transport closed mid-stream)
	Aborted,

	/// Invalid session configuration
	InvalidConfig { message: String },

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Connection(e) => write!(f, "connection error: {}", e),
			SyncError::AuthFailed => write!(f, "auth failed"),
			SyncError::SanityMismatch { local, remote } => {
				write!(f, "sanity check mismatch: local={:?} remote={:?}", local, remote)
			}
			SyncError::IntegrityViolation(v) => write!(f, "integrity violation: {}", v),
			SyncError::Aborted => write!(f, "sync aborted"),
			SyncError::InvalidConfig { message } => write!(f, "invalid session config: {}", message),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<ConnectionError> for SyncError {
	fn from(e: ConnectionError) -> Self {
		SyncError::Connection(e)
	}
}

impl From<IntegrityViolation> for SyncError {
	fn from(e: IntegrityViolation) -> Self {
		SyncError::IntegrityViolation(e)
	}
}

/// Transport-level errors, surfaced as a stable "connection error" kind
/// regardless of the concrete transport (HTTP, in-process, ...).
#[derive(Debug)]
pub enum ConnectionError {
	/// The transport's underlying channel failed
	Disconnected,

	/// The remote call timed out
	Timeout,

	/// The peer returned a malformed response
	Protocol { message: String },
}

impl fmt::Display for ConnectionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConnectionError::Disconnected => write!(f, "peer disconnected"),
			ConnectionError::Timeout => write!(f, "remote call timed out"),
			ConnectionError::Protocol { message } => write!(f, "protocol error: {}", message),
		}
	}
}

impl Error for ConnectionError {}

/// Sanity-check invariant violations (§4.6). Each variant names the
/// specific invariant that failed so the caller can log a useful
/// forensic message before treating the corpus as suspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
	/// A card references a fact id that does not exist
	CardWithoutFact { card_id: i64, fact_id: i64 },

	/// A fact has no card referencing it
	FactWithoutCards { fact_id: i64 },

	/// A row in cards/facts/revlog/graves still carries usn = -1 after sync
	DirtyRowSurvivedSync { table: &'static str },

	/// A model/tag/group still carries usn = -1 after sync
	DirtyMetadataSurvivedSync { kind: &'static str },
}

impl fmt::Display for IntegrityViolation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IntegrityViolation::CardWithoutFact { card_id, fact_id } => {
				write!(f, "card {} references missing fact {}", card_id, fact_id)
			}
			IntegrityViolation::FactWithoutCards { fact_id } => {
				write!(f, "fact {} has no referencing cards", fact_id)
			}
			IntegrityViolation::DirtyRowSurvivedSync { table } => {
				write!(f, "table {} still has rows with usn = -1 after sync", table)
			}
			IntegrityViolation::DirtyMetadataSurvivedSync { kind } => {
				write!(f, "{} still has entries with usn = -1 after sync", kind)
			}
		}
	}
}

impl Error for IntegrityViolation {}

// vim: ts=4
