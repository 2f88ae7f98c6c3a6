//! CLI binary for scout.
//!
//! Diagnostics go to stderr; stdout carries only the JSON payload.

use clap::{CommandFactory, Parser, Subcommand};
use scout::{Credentials, PlanOverrides, ScoutConfig, SourceKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Scout: multi-source research queries with ranked, de-duplicated results.
#[derive(Parser)]
#[command(name = "scout", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run a query against every source it enables.
    Search {
        /// Query text.
        #[arg(required = true)]
        query: Vec<String>,

        /// Extra instrument symbol (repeatable).
        #[arg(long = "symbol")]
        symbols: Vec<String>,

        /// Force the company profile source on.
        #[arg(long)]
        profile: bool,

        /// Force procurement and notice sources on.
        #[arg(long)]
        notices: bool,

        /// Drop notices whose deadline has passed.
        #[arg(long)]
        open_only: bool,

        /// Maximum records returned.
        #[arg(long)]
        limit: Option<usize>,

        /// Maximum sources queried at once.
        #[arg(long)]
        workers: Option<usize>,

        /// Per-source timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Overall budget in milliseconds.
        #[arg(long)]
        budget_ms: Option<u64>,

        /// Pretty-print the JSON payload.
        #[arg(long)]
        pretty: bool,
    },

    /// List sources with their trust and whether they are switched on.
    Sources,

    /// Write the default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scout=info,scout_aggregate=info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(ScoutConfig::default_config_path);

    match cli.command {
        Some(Command::Search {
            query,
            symbols,
            profile,
            notices,
            open_only,
            limit,
            workers,
            timeout,
            budget_ms,
            pretty,
        }) => {
            let mut config = load_config(&config_path, cli.config.is_some())?;
            if open_only {
                config.aggregate.open_only = true;
            }
            if let Some(limit) = limit {
                config.aggregate.result_limit = limit;
            }
            if let Some(workers) = workers {
                config.aggregate.max_workers = workers;
            }
            if let Some(secs) = timeout {
                config.aggregate.per_source_timeout_secs = secs;
            }
            let overrides = PlanOverrides {
                symbols,
                force_profile: profile,
                force_notices: notices,
                budget: budget_ms.map(Duration::from_millis),
            };
            let text = query.join(" ");
            let payload =
                scout::search(&text, &config, &Credentials::from_env(), &overrides).await?;
            let value = payload.to_value();
            let out = if pretty {
                serde_json::to_string_pretty(&value)?
            } else {
                serde_json::to_string(&value)?
            };
            println!("{out}");
            Ok(())
        }
        Some(Command::Sources) => {
            let config = load_config(&config_path, cli.config.is_some())?;
            list_sources(&config);
            Ok(())
        }
        Some(Command::InitConfig { force }) => init_config(&config_path, force),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

/// Load the config file, falling back to defaults when the default path
/// does not exist. An explicitly given path must exist.
fn load_config(path: &Path, explicit: bool) -> anyhow::Result<ScoutConfig> {
    let mut config = if explicit || path.exists() {
        tracing::debug!(path = %path.display(), "loading config");
        ScoutConfig::from_file(path)?
    } else {
        ScoutConfig::default()
    };
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

fn list_sources(config: &ScoutConfig) {
    for kind in SourceKind::all() {
        let on = match kind {
            SourceKind::WebSearch => config.web.enabled,
            SourceKind::Quotes => config.quotes.enabled,
            SourceKind::Profile => config.profile.enabled,
            SourceKind::Procurement => config.procurement.enabled,
            SourceKind::Nipa => config.notices.nipa,
            SourceKind::Bizinfo => config.notices.bizinfo,
            SourceKind::NoticeWeb => config.notices.web,
        };
        let trust = config
            .aggregate
            .trust
            .get(kind)
            .copied()
            .unwrap_or_else(|| kind.trust());
        println!(
            "{:<12} trust {trust:.2}  {}",
            kind.name(),
            if on { "on" } else { "off" }
        );
    }
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    ScoutConfig::default().save_to_file(path)?;
    eprintln!("wrote {}", path.display());
    Ok(())
}
