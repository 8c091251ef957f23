//! Progress reporting for the traversal
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::traverse::{TraverseOutcome, TraverseProgress, TraverseReport};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays traversal status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &TraverseProgress) {
        let bytes_str = format_size(progress.bytes, BINARY);
        let rate = progress.nodes_per_second();

        let msg = format!(
            "Nodes: {} | Leaves: {} | Data: {} | Rate: {:.0}/s | Outstanding: {} | Pool: {}",
            format_number(progress.resolved),
            format_number(progress.leaves),
            bytes_str,
            rate,
            progress.outstanding,
            progress.pool_size,
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the traversal results
pub fn print_summary(report: &TraverseReport, output: Option<&str>) {
    let bytes_str = format_size(report.bytes_collected, BINARY);
    let duration_secs = report.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        report.nodes_resolved as f64 / duration_secs
    } else {
        0.0
    };

    let headline = match report.outcome {
        TraverseOutcome::Completed => style("Traversal Complete").green().bold(),
        TraverseOutcome::Cancelled => style("Traversal Cancelled").yellow().bold(),
        TraverseOutcome::DeadlineExceeded => style("Traversal Deadline Exceeded").yellow().bold(),
    };

    println!();
    println!("{}", headline);
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Nodes:").bold(),
        format_number(report.nodes_resolved)
    );
    println!(
        "  {} {}",
        style("Leaves:").bold(),
        format_number(report.leaves_collected)
    );
    println!("  {} {}", style("Data:").bold(), bytes_str);
    println!(
        "  {} {:.2}s ({:.0} nodes/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if report.branches_pruned > 0 {
        println!(
            "  {} {}",
            style("Pruned:").yellow().bold(),
            format_number(report.branches_pruned)
        );
    }
    if report.skipped > 0 {
        println!(
            "  {} {}",
            style("Skipped:").bold(),
            format_number(report.skipped)
        );
    }
    if let Some(output) = output {
        println!("  {} {}", style("Output:").bold(), output);
    }
    println!();
}

/// Print a header at the start of the traversal
pub fn print_header(source: &str, workers: usize, roots: &[String]) {
    println!();
    println!(
        "{} {}",
        style("znode-harvester").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Source:").bold(), source);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Roots:").bold(), roots.join(", "));
    println!();
}
