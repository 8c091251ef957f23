//! znode-harvester - Concurrent Tree Harvester
//!
//! Entry point for the CLI harness: loads a fixture tree, traverses it
//! with the configured pool, and prints or exports the collected leaves.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use znode_harvester::config::{CliArgs, TraverseConfig};
use znode_harvester::progress::{print_header, print_summary, ProgressReporter};
use znode_harvester::store::{NodePath, StaticTreeClient};
use znode_harvester::traverse::{TraverseCoordinator, TraverseReport};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = TraverseConfig::from_args(&args).context("Invalid configuration")?;
    let roots = args.initial_paths().context("Invalid root paths")?;

    let client =
        StaticTreeClient::from_json_file(&args.fixture).context("Failed to load fixture")?;
    info!(
        fixture = %args.fixture.display(),
        nodes = client.node_count(),
        "Fixture loaded"
    );

    if config.show_progress {
        print_header(
            &args.fixture.display().to_string(),
            config.pool_size,
            &roots.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    let report = runtime.block_on(run_traversal(&args, &config, client, roots))?;

    if let Some(output) = &args.output {
        write_output(&report, output)?;
    }

    let output_str = args.output.as_ref().map(|p| p.display().to_string());
    print_summary(&report, output_str.as_deref());

    if !report.is_complete() {
        info!("Traversal was interrupted before completion");
    }
    if report.branches_pruned > 0 {
        info!(pruned = report.branches_pruned, "Traversal completed with pruned branches");
    }

    Ok(())
}

async fn run_traversal(
    args: &CliArgs,
    config: &TraverseConfig,
    client: StaticTreeClient,
    roots: Vec<NodePath>,
) -> Result<TraverseReport> {
    let mut coordinator = TraverseCoordinator::new(Arc::new(client), config.clone());

    if config.show_progress {
        let reporter = ProgressReporter::new();
        reporter.set_status("Traversing...");
        coordinator = coordinator.with_progress(reporter);
    }

    // Graceful shutdown on interrupt
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    coordinator
        .run(roots)
        .await
        .with_context(|| format!("Traversal of '{}' failed", args.fixture.display()))
}

/// Exported traversal results
#[derive(serde::Serialize)]
struct OutputDocument {
    leaves: Vec<String>,
    nodes_resolved: u64,
    branches_pruned: u64,
    duration_ms: u64,
}

/// Write collected leaf values to a JSON file (lossy UTF-8)
fn write_output(report: &TraverseReport, path: &std::path::Path) -> Result<()> {
    let document = OutputDocument {
        leaves: report.values.iter().map(|v| v.to_string_lossy()).collect(),
        nodes_resolved: report.nodes_resolved,
        branches_pruned: report.branches_pruned,
        duration_ms: report.duration.as_millis() as u64,
    };
    let json = serde_json::to_string_pretty(&document).context("Failed to serialize results")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write output to '{}'", path.display()))?;
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("znode_harvester=debug,warn")
    } else {
        EnvFilter::new("znode_harvester=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
