use std::path::PathBuf;

use cdir_types::Actor;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cdir",
    about = "Content directory: typed classes, linked entities, atomic batches",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty state file
    Init(InitArgs),
    /// Create a class from a JSON definition
    DefineClass(DefineClassArgs),
    /// Apply a JSON batch of operations atomically
    Apply(ApplyArgs),
    /// Print an entity as a JSON record
    Show(ShowArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args)]
pub struct InitArgs {
    pub state: PathBuf,
}

#[derive(Args)]
pub struct DefineClassArgs {
    pub state: PathBuf,
    pub definition: PathBuf,
    #[arg(long, default_value = "lead")]
    pub actor: Actor,
}

#[derive(Args)]
pub struct ApplyArgs {
    pub state: PathBuf,
    pub batch: PathBuf,
    /// `lead`, `member:<id>` or `curator:<group>:<id>`
    #[arg(long, default_value = "lead")]
    pub actor: Actor,
}

#[derive(Args)]
pub struct ShowArgs {
    pub state: PathBuf,
    pub entity: u64,
    /// Inline referenced entities one level deep
    #[arg(long)]
    pub resolve: bool,
}
