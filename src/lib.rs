//! # studysync — incremental two-sided flashcard-corpus synchronization
//!
//! A from-scratch reimplementation of the Anki-style sync protocol's
//! core: a five-step handshake that reconciles two corpora (a small
//! "client" and a "server") by exchanging a bounded change set, then
//! streaming the large tables in chunks, then cross-checking a sanity
//! vector before committing.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use studysync::corpus::InMemoryCorpus;
//! use studysync::local_transport::LocalTransport;
//! use studysync::session::SyncSession;
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Arc::new(Mutex::new(InMemoryCorpus::new()));
//!     let mut client = InMemoryCorpus::new();
//!     let transport = LocalTransport::new(server);
//!     let outcome = SyncSession::new(&mut client, &transport).run().await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```
//!
//! ## Using the builder
//!
//! ```rust,ignore
//! use studysync::sync::SyncBuilder;
//!
//! let outcome = SyncBuilder::new()
//!     .config(studysync::config::SessionConfig::from_env())
//!     .sync(&mut client, &transport)
//!     .await?;
//! ```

#![deny(unsafe_code)]
#![warn(dead_code)]

pub mod callbacks;
pub mod changes;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod error;
pub mod local_transport;
pub mod logging;
pub mod merge;
pub mod model;
pub mod sanity;
pub mod session;
pub mod sync;
pub mod usn;

// Re-export commonly used types and functions
pub use corpus::Corpus;
pub use error::{ConnectionError, IntegrityViolation, SyncError};
pub use sanity::SanityVector;
pub use session::{SyncOutcome, SyncSession, SyncTransport};
pub use usn::{Role, UsnPredicate};

// vim: ts=4
