use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tapfeed_api::ApiKind;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Fetch, cache and verify package metadata API files",
    arg_required_else_help = true
)]
pub struct Args {
    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only show errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Use a custom configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Proxy for all requests, e.g. http://proxy.local:3128
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Override the User-Agent header
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch an endpoint over the network, bypassing the cache files
    Fetch {
        /// Endpoint relative to the API domain, e.g. formula/wget.json
        #[arg(required = true)]
        endpoint: String,

        /// Print the document for this platform, merging its variations
        #[arg(long)]
        merge: bool,
    },

    /// Fetch an endpoint through its cache file, refreshing it when stale
    #[command(name = "fetch-file")]
    FetchFile {
        #[arg(required = true)]
        endpoint: String,

        /// Cache file to use instead of <cache>/api/<endpoint>
        #[arg(short, long)]
        target: Option<PathBuf>,

        /// Seconds after which the cache file is refreshed
        #[arg(short, long)]
        stale_secs: Option<u64>,

        /// Behave like an automatic background update, honouring the staleness window
        #[arg(short, long)]
        auto_update: bool,
    },

    /// Verify a signed envelope file and print its payload
    Verify {
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Merge the variations of a JSON document for a platform
    Merge {
        #[arg(required = true)]
        file: PathBuf,

        /// Platform tag, e.g. arm64_sonoma; defaults to the running platform
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Refresh a catalogue and its names file, then print the names
    Names {
        #[arg(value_enum, default_value_t = Kind::Formula)]
        kind: Kind,

        /// Behave like an automatic background update, honouring the staleness window
        #[arg(short, long)]
        auto_update: bool,
    },

    /// Print the repository a file in the API source cache came from
    Origin {
        #[arg(required = true)]
        path: PathBuf,
    },

    /// Print the resolved environment
    Env,

    /// Print the configuration in effect
    Config,

    /// Write the default configuration file
    #[command(name = "defconfig")]
    DefConfig,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Kind {
    Formula,
    Cask,
}

impl From<Kind> for ApiKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Formula => ApiKind::Formula,
            Kind::Cask => ApiKind::Cask,
        }
    }
}
