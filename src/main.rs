#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::too_many_lines)]

use anyhow::{Context, Result};
use clap::Parser;

use kubehist::cli::{read_audit_log, Args};
use kubehist::config::InspectionConfig;
use kubehist::history::HistoryBuilder;
use kubehist::pipeline::tasks::run_inspection;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let logs = read_audit_log(&args.audit_log)?;
    tracing::info!(log_count = logs.len(), path = %args.audit_log.display(), "loaded audit log");

    let config = match &args.config {
        Some(path) => InspectionConfig::load(path)?,
        None => InspectionConfig::default(),
    };

    let history_builder = run_inspection(logs, config, args.dry_run)
        .await
        .context("running inspection pipeline")?;

    print_summary(&history_builder);

    Ok(())
}

/// One line per touched resource path, sorted for deterministic output.
fn print_summary(history_builder: &HistoryBuilder) {
    let timelines = history_builder.timelines();
    let mut paths: Vec<&String> = timelines.keys().collect();
    paths.sort();

    if paths.is_empty() {
        println!("no resource history reconstructed from this log");
        return;
    }

    for path in paths {
        let timeline = &timelines[path];
        println!(
            "{path}: {} revision(s), {} event(s)",
            timeline.revisions.len(),
            timeline.events.len()
        );
    }
}
