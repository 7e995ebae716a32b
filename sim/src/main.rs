//! fhevote simulator: runs a scripted voting session end to end.
//!
//! The ledger and encryption service are the in-memory nullables, so a run
//! is self-contained: create features with encrypted votes, reveal some of
//! them, optionally lose a verification race to another party, then print
//! what the session ended up seeing.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use fhevote_coordinator::{init_logging, CoordinatorConfig, DerivedStats, Session};
use fhevote_nullables::{NullClock, NullEncryption, NullLedger};
use fhevote_types::{
    ContractAddress, EncryptedHandle, FeatureDraft, FeatureId, FeatureRecord, HistoryEntry,
    IdentityAddress, RandomIdGenerator, Timestamp,
};

const FEATURE_NAMES: &[(&str, &str)] = &[
    ("Dark Mode", "Night-friendly theme"),
    ("Export to CSV", "Download records as a spreadsheet"),
    ("Keyboard shortcuts", "Navigate without a mouse"),
    ("Two-factor login", "TOTP second factor"),
    ("Offline drafts", "Keep edits while disconnected"),
];

#[derive(Parser)]
#[command(name = "fhevote-sim", about = "Simulate an encrypted-vote session")]
struct Cli {
    /// Number of features to create.
    #[arg(long, default_value_t = 3, env = "FHEVOTE_FEATURES")]
    features: usize,

    /// How many of the created features to reveal (defaults to all).
    #[arg(long, env = "FHEVOTE_REVEAL")]
    reveal: Option<usize>,

    /// Seed a record from another identity and let that identity win its
    /// verification race.
    #[arg(long, env = "FHEVOTE_RACE")]
    race: bool,

    /// Print the final view as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics after the run.
    #[arg(long, env = "FHEVOTE_METRICS")]
    metrics: bool,

    /// Bound on each confirmation wait, in seconds.
    #[arg(long, env = "FHEVOTE_CONFIRMATION_TIMEOUT")]
    confirmation_timeout_secs: Option<u64>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "FHEVOTE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "FHEVOTE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunReport {
    contract: String,
    identity: String,
    stats: DerivedStats,
    records: Vec<FeatureRecord>,
    history: Vec<HistoryEntry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CoordinatorConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CoordinatorConfig::default(),
    };
    if let Some(level) = cli.log_level.clone() {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format.clone() {
        config.log_format = format;
    }
    if cli.confirmation_timeout_secs.is_some() {
        config.confirmation_timeout_secs = cli.confirmation_timeout_secs;
    }
    config.validate()?;

    init_logging(config.log_format()?, &config.log_level)?;
    tracing::info!(features = cli.features, race = cli.race, "starting simulation");

    let clock = Arc::new(NullClock::new(Timestamp::now().as_secs()));
    let contract = ContractAddress::from_bytes([0xfe; 20]);
    let identity = IdentityAddress::from_bytes([0xa1; 20]);
    let ledger = Arc::new(NullLedger::new(contract, identity.clone(), clock.clone()));
    let encryption = Arc::new(NullEncryption::new());
    let ids = Arc::new(RandomIdGenerator::new(config.id_prefix.clone(), clock.clone()));

    let foreign = if cli.race {
        let id = FeatureId::new("community-feature")?;
        let handle = b"community-handle".to_vec();
        encryption.register_ciphertext(&handle, 42);
        ledger.seed_record(
            &id,
            "Community pick",
            "Proposed by another identity",
            EncryptedHandle::new(handle),
            IdentityAddress::from_bytes([0xb0; 20]),
        );
        Some(id)
    } else {
        None
    };

    let session = Session::new(config, ledger.clone(), encryption, clock.clone(), ids);
    let report = session.connect(identity).await?;
    tracing::info!(loaded = report.loaded, "connected");
    session.check_availability().await?;

    let mut created = Vec::with_capacity(cli.features);
    for (i, (name, description)) in FEATURE_NAMES.iter().cycle().take(cli.features).enumerate() {
        let vote = (i as u64 + 1) * 3;
        let id = session
            .create_feature(FeatureDraft::new(*name, *description, vote))
            .await?;
        clock.advance(12);
        created.push(id);
    }

    let reveal = cli.reveal.unwrap_or(created.len()).min(created.len());
    for id in &created[..reveal] {
        let value = session.reveal_votes(id).await?;
        tracing::info!(feature_id = %id, ?value, "revealed");
    }

    if let Some(id) = foreign {
        ledger.race_verification(&id, 42);
        let value = session.reveal_votes(&id).await?;
        tracing::info!(feature_id = %id, ?value, "revealed after losing the race");
    }

    let store = session.store();
    let run = RunReport {
        contract: session.contract_address().to_string(),
        identity: session.identity().map(|i| i.to_string()).unwrap_or_default(),
        stats: store.stats(),
        records: store.records(),
        history: store.history(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_text(&run);
    }
    if cli.metrics {
        print!("{}", session.metrics().encode_text());
    }
    Ok(())
}

fn print_text(run: &RunReport) {
    println!("contract {}  identity {}", run.contract, run.identity);
    println!(
        "features: {}  verified: {}  total votes: {}  my actions: {}",
        run.stats.total, run.stats.verified, run.stats.total_votes, run.stats.history_len
    );
    println!();
    for record in &run.records {
        println!(
            "  {:<28} {:>8}  {}",
            record.name,
            record.tally.to_string(),
            record.id
        );
    }
    println!();
    for entry in &run.history {
        match entry {
            HistoryEntry::Create {
                feature_name,
                vote_plaintext,
                timestamp,
            } => println!("  [{}] create  {feature_name} (vote {vote_plaintext})", timestamp.as_secs()),
            HistoryEntry::Decrypt {
                feature_id,
                revealed_value,
                timestamp,
            } => println!("  [{}] decrypt {feature_id} = {revealed_value}", timestamp.as_secs()),
        }
    }
}
