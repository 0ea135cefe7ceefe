#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
mod arg_parse;
mod common;
mod config;
mod feeds;
mod github;
mod pipeline;
mod sender;
mod storage;
mod summarizer;
mod vacuum;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    arg_parse::{CmdArgs, Operation},
    common::prelude::*,
    config::AppConfig,
    feeds::prelude::SourceFetcher,
    pipeline::{DigestPipeline, RunOutcome},
    storage::{identifier, HistoryStore},
    summarizer::ChatSummarizer,
    vacuum::Vacuum,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    dotenvy::dotenv().ok();

    let args = CmdArgs::parse(std::env::args().collect())?;
    let mut config = AppConfig::from_file(&args.config)?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;

    let today = chrono::Local::now().date_naive();

    let dry_run = match args.get_action() {
        Operation::Prune => {
            let removed = Vacuum::new(&config).run(today)?;
            println!("Pruned history entries: {removed}");
            return Ok(());
        }
        Operation::Digest { dry_run } => dry_run,
    };

    let fetcher = SourceFetcher::new(&config.fetch)?;
    let summarizer = ChatSummarizer::new(&config.summarizer)?;
    let sender = config.get_sender(dry_run);
    let mut pipeline = DigestPipeline::new(
        &config,
        &fetcher,
        &summarizer,
        &sender,
        config.recipients(dry_run),
        today,
    );
    if dry_run {
        pipeline = pipeline.without_persist();
    }

    // a failed history save is logged by the pipeline; exit non-zero
    let report = pipeline.run().await?;

    match report.outcome {
        RunOutcome::NothingNew => info!(sources = report.sources_ok, "Nothing new to send"),
        RunOutcome::SummaryFailed => info!(items = report.items, "No digest this time"),
        RunOutcome::Delivered => info!(
            items = report.items,
            sources_ok = report.sources_ok,
            sources_failed = report.sources_failed,
            delivered = report.delivered.len(),
            failed = report.failed_recipients.len(),
            "Digest done"
        ),
    }

    Ok(())
}
