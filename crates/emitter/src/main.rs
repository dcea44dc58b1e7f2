//! emitterctl: drive an emitter from the command line.
//!
//! Usage: emitterctl [--base-dir <dir>] <send|flush|run|status>
//!
//! Settings come from `<base-dir>/emitter.json` and `EMITTER_*` variables;
//! flags override both.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use emitter::{EmitterBuilder, Payload, TickReport};
use emitter_config::{init_logging_for_service, HttpMethod, Paths, StoreKind, TrackerSettings};
use event_store::SqliteEventStore;
use std::io::Read;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Batching telemetry emitter.
#[derive(Parser, Debug)]
#[command(name = "emitterctl")]
#[command(about = "Queue and deliver telemetry events to a collector")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "EMITTER_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Base directory for settings, store and logs. Defaults to ~/.emitter
    #[arg(long, env = "EMITTER_HOME", global = true)]
    base_dir: Option<PathBuf>,

    /// Collector endpoint, overriding settings
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// HTTP method (GET or POST), overriding settings
    #[arg(long, global = true)]
    method: Option<HttpMethod>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Queue events from a JSON Lines file (or stdin) and flush them
    Send {
        /// One JSON object per line; `-` reads stdin
        #[arg(short, long, default_value = "-")]
        file: String,

        /// Queue in memory instead of the on-disk store
        #[arg(long)]
        memory: bool,
    },
    /// Deliver everything currently queued
    Flush,
    /// Run the background loop until interrupted
    Run,
    /// Show queue depth and active settings
    Status,
}

fn read_payloads(file: &str) -> anyhow::Result<Vec<Payload>> {
    let content = if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading {file}"))?
    };

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(line)
                .with_context(|| format!("line {}: expected a JSON object", n + 1))?;
            Ok(Payload::from(map))
        })
        .collect()
}

fn print_report(report: &TickReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let mut settings = TrackerSettings::load(&paths)?;
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    if let Some(endpoint) = cli.endpoint {
        settings.network.endpoint = endpoint;
    }
    if let Some(method) = cli.method {
        settings.network.method = method;
    }

    paths.ensure_dirs()?;
    init_logging_for_service("emitterctl", &settings.log_level, Some(paths.log_file()));

    match cli.command {
        Commands::Send { file, memory } => {
            if memory {
                settings.store.kind = StoreKind::Memory;
            }
            let payloads = read_payloads(&file)?;
            let emitter = EmitterBuilder::from_settings(&settings, &paths)
                .await?
                .build()?;

            let mut queued = 0;
            for payload in payloads {
                match emitter.submit(payload).await {
                    Ok(_) => queued += 1,
                    Err(e) => warn!(error = %e, "Event not queued"),
                }
            }
            info!(queued, "Events queued");

            let report = emitter.flush_now().await;
            print_report(&report)?;
            if report.store_error.is_some() {
                bail!("store failure during delivery");
            }
        }
        Commands::Flush => {
            let emitter = EmitterBuilder::from_settings(&settings, &paths)
                .await?
                .build()?;
            let report = emitter.flush_now().await;
            print_report(&report)?;
        }
        Commands::Run => {
            let emitter = EmitterBuilder::from_settings(&settings, &paths)
                .await?
                .build()?;
            let mut reports = emitter.subscribe();
            emitter.start(settings.flush_interval()).await?;
            info!(
                endpoint = %settings.network.endpoint,
                method = %settings.network.method,
                interval_ms = settings.flush_interval_ms,
                "Emitter running"
            );

            loop {
                tokio::select! {
                    received = reports.recv() => match received {
                        Ok(report) => print_report(&report)?,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "Report stream lagged");
                        }
                        Err(e) => {
                            error!(error = %e, "Report stream closed");
                            break;
                        }
                    },
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received shutdown signal, exiting...");
                        break;
                    }
                }
            }
            emitter.shutdown().await;
        }
        Commands::Status => {
            let queued = match settings.store.kind {
                StoreKind::Sqlite => Some(
                    SqliteEventStore::inspect(&settings.store.database_path(&paths))
                        .await?
                        .unwrap_or_default(),
                ),
                StoreKind::Memory => None,
            };
            let status = serde_json::json!({
                "base_dir": paths.base_dir(),
                "queued": queued,
                "settings": settings,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
