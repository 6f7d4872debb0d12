use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use mitsuke_api::ExternalId;

/// Match anime media filenames against AniList.
#[derive(Parser, Debug)]
#[command(name = "mitsuke", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file to use instead of the user config.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Also write logs to a daily rolling file in the data directory.
    #[arg(long, global = true)]
    pub log_file: bool,

    /// Verbose output (repeat for more detail). `RUST_LOG` takes precedence.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show every search candidate derived from each filename, offline.
    Normalize(NormalizeArgs),

    /// Resolve filenames to AniList ids.
    Resolve(ResolveArgs),

    /// Fetch full records for known AniList ids.
    Fetch(FetchArgs),

    /// List every AniList entry matching a title, for manual identification.
    Search(SearchArgs),

    /// Print the config file path and the effective config.
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    /// Filenames without extension.
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,

    /// Partial retries to plan for. Defaults to the configured value.
    #[arg(long, value_name = "N")]
    pub max_partial: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Filenames without extension. Resolved concurrently.
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,

    /// Constrain every search to this release year.
    ///
    /// Without it, a bracketed year in the filename (e.g. "[2021]") is used.
    #[arg(long, value_name = "YEAR", conflicts_with = "no_year")]
    pub year: Option<u32>,

    /// Ignore years found in filenames.
    #[arg(long)]
    pub no_year: bool,

    /// Fetch the matched record and print it as JSON.
    #[arg(long)]
    pub fetch: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// AniList media ids.
    #[arg(required = true, value_name = "ID")]
    pub ids: Vec<ExternalId>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Title to search for, sent as given.
    #[arg(value_name = "TITLE")]
    pub title: String,

    /// AniList id already known for this item; its record is listed first.
    #[arg(long, value_name = "ID")]
    pub id: Option<ExternalId>,

    /// Print the candidates as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Write the built-in defaults to the user config file if it is missing.
    #[arg(long)]
    pub init: bool,
}

impl GlobalArgs {
    /// Filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "mitsuke=info",
            1 => "mitsuke=debug",
            _ => "mitsuke=trace",
        }
    }
}
