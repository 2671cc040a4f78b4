use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cellar",
    about = "Cellar -- namespaced object store with live subscriptions",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base directory; objects and logs live underneath it
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML settings file with [store] and [log] tables
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the object stored at a slot
    Get(SlotArgs),
    /// Store a JSON value at a slot
    Put(PutArgs),
    /// Remove the object at a slot
    Rm(SlotArgs),
    /// Remove every object in a namespace
    Clear(NamespaceArgs),
    /// List the keys in a namespace
    Keys(NamespaceArgs),
    /// Observe a slot and print its changes
    Watch(WatchArgs),
    /// Append to or drain an append log
    Log(LogArgs),
}

#[derive(Args)]
pub struct SlotArgs {
    pub namespace: String,
    pub key: String,
}

#[derive(Args)]
pub struct PutArgs {
    pub namespace: String,
    pub key: String,
    /// Value as JSON text
    pub json: String,
}

#[derive(Args)]
pub struct NamespaceArgs {
    pub namespace: String,
}

#[derive(Args)]
pub struct WatchArgs {
    pub namespace: String,
    pub key: String,
    /// Stop after this many items (the initial value counts)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
    /// Read JSON lines from stdin and write each to the slot; an empty line
    /// removes it
    #[arg(long)]
    pub feed: bool,
}

#[derive(Args)]
pub struct LogArgs {
    #[command(subcommand)]
    pub action: LogAction,
}

#[derive(Subcommand)]
pub enum LogAction {
    /// Append a JSON record
    Append { name: String, json: String },
    /// Print and remove every record
    Flush {
        name: String,
        /// Print undecoded frames as hex
        #[arg(long)]
        raw: bool,
    },
}
