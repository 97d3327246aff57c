use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::{Duration, Instant},
};

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Table as TextTable;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{Config, PipelineConfig, Resource, TopItemsPhase, WriteMode},
    error,
    error::Result,
    info,
    management::TokenManager,
    normalize::Table,
    pipeline::{Pipeline, Tables},
    spotify::transport::ReqwestTransport,
    store::{SqlLoader, load_tables},
    success,
    types::TableSummaryRow,
    utils, warning,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything `spotetl run` can be told on the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub resources: BTreeSet<Resource>,
    pub write_mode: WriteMode,
    pub top_items_phase: TopItemsPhase,
    pub max_concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub request_timeout: Option<Duration>,
    pub dry_run: bool,
}

impl RunOptions {
    pub fn pipeline_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            max_concurrency: self.max_concurrency.unwrap_or(defaults.max_concurrency),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            resources: self.resources.clone(),
            top_items_phase: self.top_items_phase,
            write_mode: self.write_mode,
            ..defaults
        }
    }
}

pub async fn run(config: &Config, opts: RunOptions) {
    let started = Instant::now();

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warning!("Interrupted, cancelling outstanding requests...");
                cancel.cancel();
            }
        })
    };

    let result = execute(config, &opts, cancel).await;
    interrupt.abort();

    let elapsed = started.elapsed();
    tracing::info!(
        elapsed_ms = elapsed.as_millis() as u64,
        ok = result.is_ok(),
        "run finished"
    );

    match result {
        Ok(rows) => {
            if rows.is_empty() {
                warning!("Nothing was selected to fetch.");
            } else {
                println!("{}", TextTable::new(rows));
            }
            if opts.dry_run {
                info!("Dry run, nothing was written to the database.");
            }
            success!("Run finished in {}", utils::format_duration(elapsed));
        }
        Err(e) if e.is_cancelled() => {
            error!("Run cancelled after {}", utils::format_duration(elapsed))
        }
        Err(e) => error!(
            "Run failed after {}: {}",
            utils::format_duration(elapsed),
            e
        ),
    }
}

async fn execute(
    config: &Config,
    opts: &RunOptions,
    cancel: CancellationToken,
) -> Result<Vec<TableSummaryRow>> {
    let mut tokens = TokenManager::load(config).await?;
    let token = tokens.get_valid_token().await?;

    let transport = Arc::new(ReqwestTransport::new(CONNECT_TIMEOUT)?);
    let pipeline = Pipeline::new(transport, &config.api_url, opts.pipeline_config(), cancel);

    let pb = spinner("Fetching listening data...");
    let tables = pipeline.run(&token).await;
    pb.finish_and_clear();
    let tables = tables?;

    if opts.dry_run {
        return Ok(summarize(&tables, None));
    }

    let pb = spinner("Loading tables...");
    let written = match SqlLoader::connect(&config.database_url).await {
        Ok(loader) => load_tables(&loader, &tables, opts.write_mode).await,
        Err(e) => Err(e),
    };
    pb.finish_and_clear();
    let written: BTreeMap<Table, u64> = written?.into_iter().collect();

    Ok(summarize(&tables, Some(&written)))
}

fn summarize(tables: &Tables, written: Option<&BTreeMap<Table, u64>>) -> Vec<TableSummaryRow> {
    tables
        .iter()
        .map(|(table, records)| TableSummaryRow {
            table: table.name().to_string(),
            fetched: records.len(),
            written: match written {
                None => "-".to_string(),
                Some(written) => written.get(&table).copied().unwrap_or(0).to_string(),
            },
        })
        .collect()
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}
