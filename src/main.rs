use std::{collections::BTreeSet, time::Duration};

use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use spotetl::{
    cli,
    config::{self, Config, Resource, TopItemsPhase, WriteMode},
    error, utils,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with Spotify API
    Auth,

    /// Extract listening data and load it into the database
    Run(RunArgs),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Only fetch these resources (comma separated, e.g. playlists,saved-tracks)
    #[clap(long, value_parser = utils::parse_resources)]
    pub only: Option<BTreeSet<Resource>>,

    /// Skip these resources (comma separated)
    #[clap(long, value_parser = utils::parse_resources)]
    pub skip: Option<BTreeSet<Resource>>,

    /// Append to existing tables or replace them
    #[clap(long, default_value = "append")]
    pub mode: WriteMode,

    /// Fetch top items with the independent fetches or as a separate phase
    #[clap(long, default_value = "with-independent")]
    pub top_items_phase: TopItemsPhase,

    /// Maximum number of requests in flight
    #[clap(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: Option<u64>,

    /// Retries after a rate-limited response before giving up
    #[clap(long)]
    pub max_retries: Option<u32>,

    /// Per-request timeout in seconds
    #[clap(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Fetch and normalize, but do not write to the database
    #[clap(long)]
    pub dry_run: bool,
}

impl From<RunArgs> for cli::RunOptions {
    fn from(args: RunArgs) -> Self {
        cli::RunOptions {
            resources: utils::select_resources(args.only.as_ref(), args.skip.as_ref()),
            write_mode: args.mode,
            top_items_phase: args.top_items_phase,
            max_concurrency: args.concurrency.map(|n| n as usize),
            max_retries: args.max_retries,
            request_timeout: args.timeout.map(Duration::from_secs),
            dry_run: args.dry_run,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spotetl=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

async fn load_config() -> Config {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    match Config::from_env() {
        Ok(config) => config,
        Err(e) => error!("{}", e),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Auth => {
            let config = load_config().await;
            cli::auth(&config).await;
        }
        Command::Run(args) => {
            let config = load_config().await;
            cli::run(&config, args.into()).await;
        }
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
