//! Status-observation seam for [`crate::session::SyncSession`] (§4.1).
//!
//! A session reports which step it is on and how many rows moved in
//! each chunk; callers that care (a CLI spinner, a UI progress bar)
//! implement [`SyncStatusSink`] or assemble one from closures with
//! [`StatusSinkBuilder`]. The default is silence.

// Type aliases to reduce complexity
type PhaseFn = dyn Fn(SyncPhase) + Send + Sync;
type ChunkFn = dyn Fn(SyncPhase, usize) + Send + Sync;

/// Named steps of the protocol (§4.1): meta exchange, the small-object
/// change set, the two chunk-streaming directions, the sanity check,
/// and finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
	Meta,
	Changes,
	ServerToClient,
	ClientToServer,
	Sanity,
	Finalize,
}

/// Status-observation seam; a no-op by default.
pub trait SyncStatusSink: Send + Sync {
	/// Called once when the driver enters a new phase.
	fn on_phase(&self, _phase: SyncPhase) {}
	/// Called once per chunk exchanged during the two streaming phases.
	fn on_chunk(&self, _phase: SyncPhase, _rows_in_chunk: usize) {}
}

/// The default sink: observes nothing.
pub struct NullStatusSink;

impl SyncStatusSink for NullStatusSink {}

/// Builder for a [`SyncStatusSink`] assembled from closures, for
/// callers that want one-off reporting without naming a type.
pub struct StatusSinkBuilder {
	on_phase: Option<Box<PhaseFn>>,
	on_chunk: Option<Box<ChunkFn>>,
}

impl StatusSinkBuilder {
	pub fn new() -> Self {
		StatusSinkBuilder { on_phase: None, on_chunk: None }
	}

	pub fn on_phase<F>(mut self, callback: F) -> Self
	where
		F: Fn(SyncPhase) + Send + Sync + 'static,
	{
		self.on_phase = Some(Box::new(callback));
		self
	}

	pub fn on_chunk<F>(mut self, callback: F) -> Self
	where
		F: Fn(SyncPhase, usize) + Send + Sync + 'static,
	{
		self.on_chunk = Some(Box::new(callback));
		self
	}

	pub fn build(self) -> Box<dyn SyncStatusSink> {
		Box::new(ClosureStatusSink { on_phase: self.on_phase, on_chunk: self.on_chunk })
	}
}

impl Default for StatusSinkBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct ClosureStatusSink {
	on_phase: Option<Box<PhaseFn>>,
	on_chunk: Option<Box<ChunkFn>>,
}

impl SyncStatusSink for ClosureStatusSink {
	fn on_phase(&self, phase: SyncPhase) {
		if let Some(ref callback) = self.on_phase {
			callback(phase);
		}
	}

	fn on_chunk(&self, phase: SyncPhase, rows_in_chunk: usize) {
		if let Some(ref callback) = self.on_chunk {
			callback(phase, rows_in_chunk);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	#[test]
	fn closure_sink_only_invokes_set_callbacks() {
		let phases_seen = Arc::new(AtomicUsize::new(0));
		let counted = phases_seen.clone();
		let sink = StatusSinkBuilder::new()
			.on_phase(move |_phase| {
				counted.fetch_add(1, Ordering::SeqCst);
			})
			.build();

		sink.on_phase(SyncPhase::Meta);
		sink.on_phase(SyncPhase::Sanity);
		sink.on_chunk(SyncPhase::ServerToClient, 500); // no-op, no callback set

		assert_eq!(phases_seen.load(Ordering::SeqCst), 2);
	}
}

// vim: ts=4
