//! `clockin`: offline-first RFID attendance scan agent.
//!
//! ```text
//! clockin run            read scans from stdin and deliver them
//! clockin sync           replay the offline queue once
//! clockin pending        list queued scans (--card to filter)
//! clockin export [PATH]  write queued scans to CSV
//! clockin clear --yes    delete every queued scan
//! clockin probe          check whether the server is reachable
//! ```
//!
//! Logs go to stderr; operator output goes to stdout.

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use clockin_agent::{Agent, AgentConfig, AgentEvent, SyncEngine};
use clockin_core::constants::WIRE_TIMESTAMP_FORMAT;
use clockin_network::{HttpAuthority, RemoteAuthority};
use clockin_storage::{
    Database, ExportOutcome, PendingScan, PendingScanRepository, SqlitePendingScanRepository,
    StorageResult, export_pending,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Offline-first RFID attendance scan agent
#[derive(Parser, Debug)]
#[command(name = "clockin", author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "CLOCKIN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (can be specified multiple times)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the agent, reading scans from standard input (default)
    Run {
        /// Start with automatic sync disabled
        #[arg(long)]
        no_auto_sync: bool,
    },

    /// Replay the offline queue once, regardless of auto-sync
    Sync,

    /// List queued scans, oldest first
    Pending {
        /// Only show scans of this card
        #[arg(long)]
        card: Option<String>,
    },

    /// Export queued scans to CSV
    Export {
        /// Output file (default: offline_records_<timestamp>.csv)
        path: Option<PathBuf>,
    },

    /// Delete every queued scan
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Check whether the attendance server is reachable
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AgentConfig::load(cli.config).context("Failed to load configuration")?;

    match cli.command.unwrap_or(Command::Run {
        no_auto_sync: false,
    }) {
        Command::Run { no_auto_sync } => run(config, no_auto_sync).await,
        Command::Sync => sync(config).await,
        Command::Pending { card } => pending(config, card).await,
        Command::Export { path } => export(config, path).await,
        Command::Clear { yes } => clear(config, yes).await,
        Command::Probe => probe(config).await,
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_database(config: &AgentConfig) -> Result<Database> {
    Database::new(config.database_config())
        .await
        .with_context(|| {
            format!(
                "Failed to open offline queue at {}",
                config.storage.database_path
            )
        })
}

fn authority(config: &AgentConfig) -> Result<HttpAuthority> {
    Ok(HttpAuthority::new(config.authority_config()?)?)
}

async fn run(config: AgentConfig, no_auto_sync: bool) -> Result<()> {
    let db = open_database(&config).await?;
    let authority = authority(&config)?;

    info!(
        server_url = %authority.server_url(),
        probe_url = %authority.probe_url(),
        database = %config.storage.database_path,
        "Starting clockin"
    );

    let mut runtime = config.runtime();
    if no_auto_sync {
        runtime.auto_sync = false;
    }

    let mut handle = Agent::new(runtime, &db, authority).start();
    handle.attach_reader(tokio::io::stdin());

    loop {
        tokio::select! {
            event = handle.recv() => match event {
                Some(event) => report(&event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        }
    }

    if let Ok(status) = handle.status().await {
        info!(%status, "Final status");
    }

    handle.shutdown().await?;
    db.close().await;
    Ok(())
}

fn report(event: &AgentEvent) {
    match event {
        AgentEvent::Scan { outcome, .. } => println!("{outcome}"),
        AgentEvent::SyncCompleted(summary) => println!("Sync: {summary}"),
        AgentEvent::SyncFailed { error } => println!("Sync failed: {error}"),
        AgentEvent::ConnectivityChanged { to, .. } => println!("Server {to}"),
        AgentEvent::AutoSyncToggled { enabled } => {
            println!("Auto-sync {}", if *enabled { "enabled" } else { "disabled" })
        }
    }
}

async fn sync(config: AgentConfig) -> Result<()> {
    let db = open_database(&config).await?;
    let engine = SyncEngine::new(
        SqlitePendingScanRepository::new(db.pool().clone()),
        Arc::new(authority(&config)?),
        config.runtime().sync_pause,
    );

    let summary = engine.sync_once().await?;
    println!("{summary}");

    db.close().await;
    Ok(())
}

async fn pending(config: AgentConfig, card: Option<String>) -> Result<()> {
    let db = open_database(&config).await?;
    let repo = SqlitePendingScanRepository::new(db.pool().clone());

    let scans = select_pending(&repo, card.as_deref()).await?;
    if scans.is_empty() {
        println!("No pending scans");
    } else {
        println!("{:>6}  {:<27}  {:<16}  ATTEMPTS", "ID", "SCANNED AT", "CARD");
        for scan in &scans {
            println!(
                "{:>6}  {:<27}  {:<16}  {}",
                scan.id,
                scan.observed_at.format(WIRE_TIMESTAMP_FORMAT),
                scan.card_number,
                scan.sync_attempts
            );
        }
        println!("{} pending", scans.len());
    }

    db.close().await;
    Ok(())
}

async fn select_pending(
    repo: &impl PendingScanRepository,
    card: Option<&str>,
) -> StorageResult<Vec<PendingScan>> {
    match card.map(str::trim) {
        Some(card) => repo.find_by_card_number(card).await,
        None => repo.list_pending().await,
    }
}

async fn export(config: AgentConfig, path: Option<PathBuf>) -> Result<()> {
    let db = open_database(&config).await?;
    let repo = SqlitePendingScanRepository::new(db.pool().clone());

    let path = path.unwrap_or_else(|| {
        PathBuf::from(
            chrono::Local::now()
                .format("offline_records_%Y%m%d_%H%M%S.csv")
                .to_string(),
        )
    });

    match export_pending(&repo, &path).await? {
        ExportOutcome::Empty => println!("No pending scans to export"),
        ExportOutcome::Written { path, rows } => {
            println!("Exported {rows} scans to {}", path.display())
        }
    }

    db.close().await;
    Ok(())
}

async fn clear(config: AgentConfig, yes: bool) -> Result<()> {
    let db = open_database(&config).await?;
    let repo = SqlitePendingScanRepository::new(db.pool().clone());

    if !yes {
        let count = repo.count().await?;
        db.close().await;
        bail!("Refusing to delete {count} queued scans without --yes");
    }

    let removed = repo.clear_all().await?;
    println!("Removed {removed} queued scans");

    db.close().await;
    Ok(())
}

async fn probe(config: AgentConfig) -> Result<()> {
    let authority = authority(&config)?;
    let outcome = authority.probe().await;

    println!("{}: {outcome}", authority.probe_url());
    if !outcome.is_reachable() {
        bail!("Attendance server is unreachable");
    }
    Ok(())
}
