//! Command-line arguments.

use crate::duration::{Within, parse_duration};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

/// Track upcoming events stored in Redis.
#[derive(Parser, Debug)]
#[command(name = "upcoming", version, about)]
pub struct Cli {
    /// Key prefix shared by every event and the notification channel
    #[arg(long, global = true, env = "UPCOMING_PREFIX")]
    pub prefix: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List upcoming events, soonest first
    Ls(LsArgs),

    /// Remove one event, or every event of a source
    Rm(RmArgs),

    /// Store an event firing after a delay
    Put(PutArgs),

    /// Block until an event fires, following updates
    Wait(WaitArgs),
}

/// Arguments for `upcoming ls`.
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Comma-separated store addresses to merge results from
    #[arg(long, value_delimiter = ',', env = "UPCOMING_ADDRESS")]
    pub addresses: Vec<String>,

    /// Comma-separated sources to list (default: all)
    #[arg(long, value_delimiter = ',')]
    pub sources: Vec<String>,

    /// Only list events firing within this duration, or "today"
    #[arg(long, value_name = "DURATION|today")]
    pub within: Option<Within>,

    /// Output template, e.g. "{humanize}\t{title}". Placeholders: {source},
    /// {sourceId}, {title}, {invokeManual}, {when}, {humanize}
    #[arg(long)]
    pub format: Option<String>,
}

/// Arguments for `upcoming rm`.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Source to remove from
    #[arg(long)]
    pub source: String,

    /// Remove only this identifier instead of the whole source
    #[arg(long)]
    pub id: Option<String>,

    /// Store address
    #[arg(long, env = "UPCOMING_ADDRESS")]
    pub address: Option<String>,
}

/// Arguments for `upcoming put`.
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Producing source
    #[arg(long)]
    pub source: String,

    /// Identifier within the source
    #[arg(long)]
    pub id: String,

    /// Human-readable title
    #[arg(long)]
    pub title: String,

    /// Command that does the upcoming thing early
    #[arg(long, default_value = "")]
    pub invoke_manual: String,

    /// Delay until the event fires, e.g. "90s" or "1h30m"
    #[arg(long = "in", value_name = "DURATION", value_parser = parse_duration)]
    pub fires_in: Duration,

    /// Store address
    #[arg(long, env = "UPCOMING_ADDRESS")]
    pub address: Option<String>,
}

/// Arguments for `upcoming wait`.
#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Source of the event
    #[arg(long)]
    pub source: String,

    /// Identifier within the source
    #[arg(long)]
    pub id: String,

    /// Store address
    #[arg(long, env = "UPCOMING_ADDRESS")]
    pub address: Option<String>,
}
