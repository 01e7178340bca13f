//! staffpass reader/issuer command line.
//!
//! # Responsibility
//! - Issue codes for a subject and run decoded stdin lines through the
//!   reader pipeline, one scan at a time.
//! - Seed the SQLite authority database used by both.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use staffpass_core::db::{open_db, Schema, SharedConnection};
use staffpass_core::service::ActivityLevel;
use staffpass_core::{
    default_log_level, init_logging, AttendanceRecorder, Clock, CoreConfig, LegacyVerifier,
    RecentActivity, ScanProcessor, SqliteAttendanceStore, SqliteNonceLedger, Subject,
    SystemClock, TokenIssuer, TokenValidator, MIN_SECRET_BYTES,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const SECRET_ENV: &str = "STAFFPASS_SECRET";

/// staffpass - attendance check-in tooling
#[derive(Parser, Debug)]
#[command(name = "staffpass")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the authority SQLite database
    #[arg(long, default_value = "staffpass.db")]
    db: PathBuf,

    /// Optional JSON config file; missing fields keep defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when absent
    #[arg(long)]
    log_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue a signed code for a subject and print it
    Issue {
        /// Subject id
        subject: String,
    },

    /// Read decoded codes from stdin, one per line, and record attendance
    Scan {
        /// Unit this reader is installed at; overrides the config file
        #[arg(long)]
        unit: Option<String>,
    },

    /// Add or replace a subject in the directory
    SeedSubject {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        matricula: String,
        #[arg(long)]
        unit: String,
    },
}

impl Cli {
    fn effective_log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(default_log_level())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        init_logging(cli.effective_log_level(), log_dir).context("failed to start logging")?;
    }

    let config = load_config(cli.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Issue { subject } => issue(&config, &subject),
            Commands::Scan { unit } => scan(&cli.db, config, unit).await,
            Commands::SeedSubject {
                id,
                name,
                matricula,
                unit,
            } => seed_subject(
                &cli.db,
                Subject {
                    id,
                    display_name: name,
                    matricula,
                    unit_id: unit,
                },
            ),
        }
    })
}

fn load_config(path: Option<&Path>) -> Result<CoreConfig> {
    let Some(path) = path else {
        return Ok(CoreConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config `{}`", path.display()))?;
    CoreConfig::from_json_str(&raw).with_context(|| format!("invalid config `{}`", path.display()))
}

fn signing_secret() -> Result<Vec<u8>> {
    let secret = std::env::var(SECRET_ENV)
        .with_context(|| format!("{SECRET_ENV} must hold the signing secret"))?;
    if secret.len() < MIN_SECRET_BYTES {
        bail!("{SECRET_ENV} must be at least {MIN_SECRET_BYTES} bytes");
    }
    Ok(secret.into_bytes())
}

fn open_authority(path: &Path) -> Result<SharedConnection> {
    let conn = open_db(path, Schema::Authority)
        .with_context(|| format!("failed to open authority db `{}`", path.display()))?;
    Ok(SharedConnection::new(conn))
}

fn issue(config: &CoreConfig, subject_id: &str) -> Result<()> {
    let issuer = TokenIssuer::new(signing_secret()?, config.token_ttl(), Arc::new(SystemClock))?;
    let issued = issuer.issue(subject_id)?;
    println!("{}", issued.text);
    eprintln!("expires_at_ms={}", issued.token.expires_at);
    Ok(())
}

fn seed_subject(db: &Path, subject: Subject) -> Result<()> {
    let store = SqliteAttendanceStore::new(open_authority(db)?);
    store.upsert_subject(&subject)?;
    println!("subject {} saved", subject.id);
    Ok(())
}

async fn scan(db: &Path, mut config: CoreConfig, unit: Option<String>) -> Result<()> {
    if let Some(unit) = unit {
        config.reading_unit_id = unit;
    }
    if config.reading_unit_id.trim().is_empty() {
        bail!("reading unit is required: pass --unit or set reading_unit_id");
    }

    let conn = open_authority(db)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(SqliteAttendanceStore::new(conn.clone()));
    let ledger = Arc::new(SqliteNonceLedger::new(conn));

    let validator = TokenValidator::new(
        signing_secret()?,
        ledger,
        store.clone(),
        Arc::clone(&clock),
    )?;
    let legacy = LegacyVerifier::new(store.clone(), Arc::clone(&clock), config.legacy_max_age());
    let recorder = AttendanceRecorder::new(store, Arc::clone(&clock), &config);
    let processor = Arc::new(ScanProcessor::new(
        Arc::new(validator),
        legacy,
        recorder,
        Arc::new(RecentActivity::new(config.recent_activity_capacity)),
        clock,
        config.scan_cooldown(),
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if processor.handle_decoded(&line).await.is_none() {
            continue;
        }
        if let Some(entry) = processor.activity().entries().first() {
            let tag = match entry.level {
                ActivityLevel::Success => "OK   ",
                ActivityLevel::Warning => "WARN ",
                ActivityLevel::Error => "ERROR",
            };
            println!("{tag} {}", entry.message);
        }
    }
    processor.reset();
    Ok(())
}
