use std::error::Error;
use std::sync::Arc;

use clap::{Arg, Command};
use tokio::sync::Mutex;

use studysync::callbacks::{SyncPhase, SyncStatusSink};
use studysync::corpus::{Corpus, InMemoryCorpus};
use studysync::local_transport::LocalTransport;
use studysync::logging::{info, init_tracing};
use studysync::model::{CardRow, CorpusMeta, FactRow};
use studysync::session::SyncSession;

/// Prints each phase as the driver enters it; used by the `demo`
/// subcommand so a run is visible on stderr without `RUST_LOG`.
struct CliStatusSink;

impl SyncStatusSink for CliStatusSink {
	fn on_phase(&self, phase: SyncPhase) {
		println!("-- {:?}", phase);
	}

	fn on_chunk(&self, phase: SyncPhase, rows_in_chunk: usize) {
		println!("   {:?}: {} rows", phase, rows_in_chunk);
	}
}

/// Build a small demonstration corpus: one fact with one card.
fn seed_corpus(usn: i32, mtime: i64) -> InMemoryCorpus {
	let mut corpus = InMemoryCorpus::new();
	corpus.set_meta(CorpusMeta { mtime, scm: 1, usn, last_sync: 0, conf: serde_json::json!({}) });
	corpus.insert_fact(FactRow {
		id: 1,
		guid: "demo-fact".to_string(),
		model_id: 1,
		group_id: 1,
		mtime,
		usn,
		tags: String::new(),
		fields: "front\u{1f}back".to_string(),
		sort_field: String::new(),
		flags: 0,
		data: String::new(),
	});
	corpus.insert_card(CardRow {
		id: 1,
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
	});
	corpus
}

async fn run_demo() -> Result<(), Box<dyn Error>> {
	// Server already has usn=7; client will add a card locally, bumping
	// its mod time but keeping usn=-1 until synced (§3 lifecycle).
	let server = Arc::new(Mutex::new(seed_corpus(7, 1000)));
	let mut client = seed_corpus(7, 1000);
	client.insert_card(CardRow {
		id: 2,
		fact_id: 1,
		group_id: 1,
		ordinal: 1,
		mtime: 2000,
		usn: -1,
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
	});
	client.set_meta(CorpusMeta { mtime: 2000, ..client.meta() });

	let transport = LocalTransport::new(server.clone());
	let status = CliStatusSink;
	let mut session = SyncSession::with_status(&mut client, &transport, &status);
	let outcome = session.run().await?;

	info!(?outcome, "demo sync finished");
	println!("outcome: {:?}", outcome);
	println!("client usn after sync: {}", client.meta().usn);
	println!("server usn after sync: {}", server.lock().await.meta().usn);
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	init_tracing();

	let matches = Command::new("studysync")
		.version("0.1.0")
		.author("Szilard Hajba <szilard@symbion.hu>")
		.about("Incremental two-sided flashcard corpus synchronization")
		.subcommand_required(true)
		.arg(Arg::new("profile").short('p').long("profile").value_name("PROFILE").help("Profile"))
		.subcommand(Command::new("demo").about("Run a single in-process sync against a seeded corpus pair"))
		.get_matches();

	if matches.subcommand_matches("demo").is_some() {
		run_demo().await?;
	}

	Ok(())
}

// vim: ts=4
