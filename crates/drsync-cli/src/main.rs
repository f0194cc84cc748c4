mod export;
mod sync;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use drsync_airtable::StoreError;
use drsync_core::{AppConfig, ConfigError};
use drsync_scraper::ScraperError;
use tracing_subscriber::EnvFilter;

use crate::sync::Source;

#[derive(Debug, Parser)]
#[command(name = "drsync")]
#[command(about = "Pull daily DRS orders and upsert them into Airtable")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Collect one day's orders, normalize them and upsert them into the store
    Sync {
        /// Target date (YYYY-MM-DD); defaults to today
        #[arg(long, env = "DATE")]
        date: Option<String>,
        /// Where the orders come from
        #[arg(long, value_enum, default_value = "browser")]
        source: Source,
        /// Base URL of a deployed relay, required with `--source relay`
        #[arg(long, env = "RELAY_URL")]
        relay_url: Option<String>,
        /// Print normalized records instead of writing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Download the DRS daily CSV export
    Export {
        /// Target date (YYYY-MM-DD); defaults to today
        #[arg(long, env = "DATE")]
        date: Option<String>,
        /// Directory the CSV is written into
        #[arg(long, env = "OUT_DIR", default_value = ".")]
        out: PathBuf,
        /// Accepted for compatibility; the HTTP driver never shows a window
        #[arg(
            long,
            env = "HEADLESS",
            default_value = "true",
            action = clap::ArgAction::Set,
            value_parser = clap::builder::FalseyValueParser::new()
        )]
        headless: bool,
    },
}

fn resolve_date(raw: Option<&str>) -> Result<NaiveDate, ConfigError> {
    match raw {
        Some(raw) => drsync_core::parse_iso_date("DATE", raw),
        None => Ok(Local::now().date_naive()),
    }
}

/// Exit code and `kind` label for a fatal error.
fn classify(err: &anyhow::Error) -> (u8, &'static str) {
    for cause in err.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return (2, "configuration");
        }
        if let Some(e) = cause.downcast_ref::<ScraperError>() {
            return match e {
                ScraperError::AuthenticationFailed { .. } => (1, "authentication"),
                _ => (1, "scraper"),
            };
        }
        if cause.downcast_ref::<StoreError>().is_some() {
            return (1, "store");
        }
    }
    (1, "runtime")
}

fn fatal_line(kind: &str, err: &anyhow::Error) -> String {
    serde_json::json!({
        "level": "fatal",
        "kind": kind,
        "error": format!("{err:#}"),
    })
    .to_string()
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = drsync_core::load_app_config()?;
    init_tracing(&config)?;

    match cli.command {
        Commands::Sync {
            date,
            source,
            relay_url,
            dry_run,
        } => {
            let date = resolve_date(date.as_deref())?;
            sync::run_sync(&config, date, source, relay_url.as_deref(), dry_run).await
        }
        Commands::Export {
            date,
            out,
            headless,
        } => {
            let date = resolve_date(date.as_deref())?;
            let path = export::run_export(&config, date, &out, headless).await?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let (code, kind) = classify(&err);
            eprintln!("{}", fatal_line(kind, &err));
            ExitCode::from(code)
        }
    }
}
