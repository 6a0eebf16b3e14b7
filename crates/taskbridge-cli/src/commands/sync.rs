//! The `sync` command: wire config, lock, link store, and the two
//! managers into one engine run, then map the outcome onto the exit-code
//! contract (0 clean, 1 partial apply, 2 configuration or lock error).

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::{Args, ValueEnum};

use taskbridge_core::VaultId;
use taskbridge_store::{
    AppConfig, Direction, LinkStore, MarkdownVault, OsascriptGateway, StoreLock, SyncEngine,
    SyncOptions, SyncReport,
};

#[derive(Args)]
pub(crate) struct SyncArgs {
    /// Apply the plan (default is a dry-run)
    #[arg(long)]
    apply: bool,

    /// Which way changes may flow
    #[arg(long, value_enum, default_value = "both")]
    direction: DirectionArg,

    /// Vault id or name (optional when exactly one vault is configured)
    #[arg(long)]
    vault: Option<String>,

    /// Skip duplicate detection
    #[arg(long)]
    no_dedup: bool,

    /// Keep the first member of each duplicate cluster, delete the rest
    #[arg(long)]
    dedup_auto_apply: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (default: the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    Both,
    ObsToRem,
    RemToObs,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Both => Self::Both,
            DirectionArg::ObsToRem => Self::ObsToRem,
            DirectionArg::RemToObs => Self::RemToObs,
        }
    }
}

pub(crate) fn run_sync(args: &SyncArgs) -> i32 {
    init_tracing(args.verbose);
    match execute(args) {
        Ok(report) => {
            print!("{}", report.render());
            report.exit_code()
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            2
        }
    }
}

fn execute(args: &SyncArgs) -> Result<SyncReport> {
    let config_path = args.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path)?;
    let vault_config = config.select_vault(args.vault.as_deref())?;

    let links_path = vault_config.links_path(&config.state_dir());
    let _lock = StoreLock::acquire(&links_path)?;
    let mut links = LinkStore::open(&links_path)?;

    let mut vault = MarkdownVault::new(&vault_config.path);
    let mut gateway = OsascriptGateway::new(config.settings.gateway_timeout_secs);

    let mut options = SyncOptions::from_settings(&config.settings, Utc::now());
    options.apply = args.apply;
    options.direction = args.direction.into();
    if args.no_dedup {
        options.dedup = false;
    }
    if args.dedup_auto_apply {
        options.dedup_auto_apply = true;
    }

    let mut engine = SyncEngine::new(
        &mut vault,
        &mut gateway,
        &mut links,
        VaultId::from(vault_config.id.as_str()),
        vault_config.routes(),
    );
    Ok(engine.sync(&options)?)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
