//! `upcoming` - list, store, remove, and wait on upcoming events.
//!
//! ```bash
//! # Everything due before midnight, across two stores
//! upcoming ls --addresses cache-a:6379,cache-b:6379 --within today
//!
//! # Custom output
//! upcoming ls --sources calendar --format '{humanize}: {title}'
//!
//! # Store, then block until it fires (Ctrl+C cancels)
//! upcoming put --source test --id 1 --title "Tea" --in 4m
//! upcoming wait --source test --id 1
//!
//! # Remove one event, or a whole source
//! upcoming rm --source test --id 1
//! upcoming rm --source test
//! ```
//!
//! The store address and key prefix default to `UPCOMING_ADDRESS` and
//! `UPCOMING_PREFIX`, which may also be set in a `.env` file. Logs go to stderr and are filtered with `RUST_LOG`
//! (default `warn`).

mod args;
mod duration;
mod template;

use anyhow::{Context, bail};
use args::{Cli, Command, LsArgs, PutArgs, RmArgs, WaitArgs};
use chrono::{Local, Utc};
use clap::Parser;
use std::io::Write;
use template::Template;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upcoming_core::{
    Event, ListOptions, UpcomingClient, UpcomingConfig, UpcomingError, WaitOutcome, format_event,
    sort_by_when,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads its env-backed flags
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.prefix);

    match cli.command {
        Command::Ls(args) => ls(&config, args).await,
        Command::Rm(args) => rm(&config, args).await,
        Command::Put(args) => put(&config, args).await,
        Command::Wait(args) => wait(&config, args).await,
    }
}

/// Configuration from the environment, with the `--prefix` flag on top.
fn load_config(prefix: Option<String>) -> UpcomingConfig {
    let config = UpcomingConfig::from_env();
    match prefix {
        Some(prefix) => config.with_prefix(prefix),
        None => config,
    }
}

/// Initialize tracing to stderr, keeping stdout for command output.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn connect(config: &UpcomingConfig, address: Option<String>) -> anyhow::Result<UpcomingClient> {
    let config = config.clone().with_address(address.unwrap_or_default());
    upcoming_redis::connect(&config)
        .await
        .with_context(|| format!("Failed to connect to {}", config.address))
}

async fn ls(config: &UpcomingConfig, args: LsArgs) -> anyhow::Result<()> {
    // Parse before touching any store so a bad template fails fast.
    let template = args
        .format
        .as_deref()
        .map(Template::parse)
        .transpose()
        .context("Invalid --format template")?;

    let mut options = ListOptions::default();
    for source in args.sources.into_iter().filter(|s| !s.is_empty()) {
        options = options.with_source(source);
    }
    if let Some(within) = args.within {
        let horizon = within
            .resolve(&Local::now())
            .context("Local midnight does not exist today")?;
        options = options.within(horizon);
    }

    let mut addresses: Vec<String> = args.addresses.into_iter().filter(|a| !a.is_empty()).collect();
    if addresses.is_empty() {
        addresses.push(config.address.clone());
    }

    let mut events = Vec::new();
    for address in addresses {
        let client = connect(config, Some(address.clone())).await?;
        let listed = client
            .list(&options)
            .await
            .with_context(|| format!("Failed to list events from {address}"))?;
        info!(address = %address, count = listed.len(), "Listed events");
        events.extend(listed);
    }
    sort_by_when(&mut events);

    let now = Utc::now();
    let mut out = std::io::stdout().lock();
    for event in &events {
        let line = match &template {
            Some(template) => template.render(event, now),
            None => format_event(event, now),
        };
        writeln!(out, "{line}")?;
    }
    Ok(())
}

async fn rm(config: &UpcomingConfig, args: RmArgs) -> anyhow::Result<()> {
    let client = connect(config, args.address).await?;

    match args.id {
        Some(id) => {
            let existed = client.remove(&args.source, &id).await?;
            if !existed {
                warn!(source = %args.source, source_id = %id, "No such event");
            }
        }
        None => {
            let deleted = client.remove_all(&args.source).await?;
            info!(source = %args.source, deleted = deleted, "Removed events");
        }
    }
    Ok(())
}

async fn put(config: &UpcomingConfig, args: PutArgs) -> anyhow::Result<()> {
    let delay = chrono::Duration::from_std(args.fires_in).context("--in is too large")?;
    let when = Utc::now()
        .checked_add_signed(delay)
        .context("--in is too large")?;
    if delay.is_zero() {
        warn!("An event firing now is already gone; nothing stored");
    }

    let event = Event::new(args.source, args.id, args.title, when).with_invoke_manual(args.invoke_manual);
    let client = connect(config, args.address).await?;
    client.put(&event).await?;
    Ok(())
}

async fn wait(config: &UpcomingConfig, args: WaitArgs) -> anyhow::Result<()> {
    let client = connect(config, args.address).await?;
    let event = match client.get(&args.source, &args.id).await {
        Ok(event) => event,
        Err(e) if e.is_not_found() => bail!("No upcoming event {}/{}", args.source, args.id),
        Err(e) => return Err(e.into()),
    };

    match client.wait(event, wait_for_signal()).await {
        Ok(WaitOutcome::Fired(event)) => {
            println!("{}", format_event(&event, client.now()));
            Ok(())
        }
        Ok(WaitOutcome::Removed(event)) => {
            bail!("{}/{} was removed before it fired", event.source, event.source_id)
        }
        Err(UpcomingError::Cancelled { last_known, .. }) => {
            bail!("Cancelled; {} was due in {}", last_known.title, last_known.humanize_until(client.now()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolve on Ctrl+C or SIGTERM.
///
/// If no handler can be installed the future never resolves.
async fn wait_for_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => info!("Received Ctrl+C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c.await;
                info!("Received Ctrl+C");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl+C");
    }
}
