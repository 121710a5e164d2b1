//! # bazaar
//!
//! Operator scripts for the hosted backend.
//!
//! ```bash
//! # Add staff.auth_id and its index (exits 1 if it must be done by hand)
//! bazaar migrate
//!
//! # Load reference data into empty tables
//! bazaar seed --fixtures data/seed
//!
//! # Rehearse both against a local SQLite file
//! bazaar --local rehearsal.db migrate
//! bazaar --local rehearsal.db seed
//!
//! # Inspect an API key
//! bazaar decode-jwt "$SUPABASE_SERVICE_ROLE_KEY"
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bazaar_data::backend::{Backend, LocalBackend, RestBackend};
use bazaar_data::config::Config;
use bazaar_data::connection::Connection;
use bazaar_data::jwt;
use bazaar_data::migrate::{self, MigrationOutcome};
use bazaar_data::seed::{default_categories, Seeder, DEFAULT_FIXTURE_DIR};

#[derive(Parser, Debug)]
#[command(name = "bazaar", version, about = "Bazaar data migrations and seeding")]
struct Cli {
    /// Run against a local SQLite file instead of the hosted backend
    #[arg(long, global = true, value_name = "SQLITE_FILE")]
    local: Option<PathBuf>,

    /// Hosted backend base URL
    #[arg(long, global = true, env = "SUPABASE_URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add staff.auth_id and its index
    Migrate,
    /// Insert reference data into empty tables
    Seed {
        /// Directory holding one JSON fixture per table
        #[arg(long, default_value = DEFAULT_FIXTURE_DIR)]
        fixtures: PathBuf,
    },
    /// Print the payload of a JWT
    DecodeJwt { token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Command::DecodeJwt { token } = &cli.command {
        decode_jwt(token);
        return Ok(());
    }

    let mut config = Config::from_env();
    if cli.url.is_some() {
        config.supabase_url = cli.url.clone();
    }
    Connection::init_global(config.database_url.clone());

    let code = match &cli.local {
        Some(path) => {
            let backend = LocalBackend::open(path).await?;
            run(&backend, &cli.command).await?
        }
        None => {
            let backend = RestBackend::new(&config.remote()?)?;
            run(&backend, &cli.command).await?
        }
    };

    process::exit(code);
}

/// Runs a backend command and returns the process exit code
async fn run<B: Backend>(backend: &B, command: &Command) -> Result<i32> {
    match command {
        Command::Migrate => {
            let outcome = migrate::run(backend, &migrate::staff_auth_id()).await?;
            match &outcome {
                MigrationOutcome::Applied => info!("✅ Migration complete"),
                MigrationOutcome::AlreadyApplied => info!("✅ Nothing to do"),
                MigrationOutcome::ManualActionRequired { sql } => {
                    error!("❌ Run this SQL in the database console, then re-run:");
                    println!("{}", sql);
                }
                MigrationOutcome::Unverified { reason } => {
                    warn!("⚠️  Migration could not be verified: {}", reason)
                }
            }
            Ok(outcome.exit_code())
        }
        Command::Seed { fixtures } => {
            let report = Seeder::new(backend, fixtures.clone())
                .run(&default_categories())
                .await;
            for (table, outcome) in &report.entries {
                println!("{:<22} {}", table, outcome);
            }
            Ok(0)
        }
        Command::DecodeJwt { token } => {
            decode_jwt(token);
            Ok(0)
        }
    }
}

fn decode_jwt(token: &str) {
    println!("{}", jwt::describe(token));
    if let Ok(payload) = jwt::decode_payload(token) {
        if let Some(exp) = jwt::expires_at(&payload) {
            let state = if jwt::is_expired(&payload, Utc::now()) { "expired" } else { "valid" };
            println!("expires {} ({})", exp.to_rfc3339(), state);
        }
    }
}
