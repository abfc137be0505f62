use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cybind::{
    AppState,
    build::{BuildOptions, lock::BuildLock, stop::StopSwitch},
    config::BuildConfig,
    db::{build_run_repo, task_repo, zone_repo},
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, rename_all = "kebab-case")]
struct Cli {
    /// Path to the TOML build configuration
    #[arg(long, value_name = "PATH", global = true, default_value = "/etc/cybind/build.toml")]
    config: PathBuf,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Command {
    /// Build zone files and config, validate them and publish
    Build {
        /// Walk every zone even if no build task is queued
        #[arg(long)]
        force: bool,
        /// Stop after staging and validation; publish nothing
        #[arg(long)]
        stage_only: bool,
        /// Push even when more lines changed than the configured ceiling
        #[arg(long)]
        no_sanity_check: bool,
    },
    /// Show the effective configuration and the state of the build system
    Status,
    /// Queue a rebuild of one zone
    Schedule {
        /// Zone name, e.g. example.com
        #[arg(value_name = "ZONE")]
        zone: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = BuildConfig::load(&cli.config)?;

    match cli.command {
        Command::Build {
            force,
            stage_only,
            no_sanity_check,
        } => {
            let state = AppState::init(config).await?;
            let opts = BuildOptions {
                force,
                stage_only,
                sanity_check: !no_sanity_check,
            };
            let run = state
                .orchestrator()
                .run(&opts)
                .await
                .context("DNS build failed")?;
            info!(
                run_id = %run.run_id,
                outcome = run.outcome.as_str(),
                rebuilt = run.zones_rebuilt,
                unchanged = run.zones_unchanged,
                without_data = run.zones_without_data,
                files = run.files_written,
                "build finished"
            );
        }
        Command::Status => {
            let lock = BuildLock::new(&config.lock_file);
            let stop = StopSwitch::new(&config.stop_file, config.stop_file_notify_interval());
            for (key, value) in config.summary() {
                println!("{key} = {value}");
            }
            match lock.holder() {
                Some(holder) => println!("is_locked = true ({holder})"),
                None => println!("is_locked = false"),
            }
            println!("stop_file_exists = {}", stop.is_engaged());
            println!("stage_dir_exists = {}", config.stage_dir.exists());
            println!("prod_dir_exists = {}", config.prod_dir.exists());

            let state = AppState::init(config).await?;
            println!("pending_tasks = {}", task_repo::count(&state.db).await?);
            if let Some((run_id, outcome)) = build_run_repo::latest(&state.db).await? {
                println!("last_run = {run_id} ({outcome})");
            }
        }
        Command::Schedule { zone } => {
            let state = AppState::init(config).await?;
            let Some(root) = zone_repo::find_zone_by_name(&state.db, &zone).await? else {
                bail!("no such zone '{zone}'");
            };
            let id = task_repo::enqueue(&state.db, root.id).await?;
            info!(zone = %root.name, task = id, "rebuild scheduled");
        }
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
