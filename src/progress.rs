//! Progress reporting for the scene walker
//!
//! Progress is logged through `tracing` every N geometries. An optional
//! indicatif bar mirrors the same counter on an interactive terminal.

use crate::pipeline::ExportSummary;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use tracing::{info, warn};

/// Counts processed geometries and reports at a fixed interval
pub struct ProgressTracker {
    processed: u64,
    total: u64,
    interval: u64,
    bar: ProgressBar,
}

impl ProgressTracker {
    pub fn new(total: u64, interval: u64, show_bar: bool) -> Self {
        let bar = if show_bar {
            let bar = ProgressBar::new(total);
            if let Ok(bar_style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} shapes",
            ) {
                bar.set_style(bar_style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            processed: 0,
            total,
            interval: interval.max(1),
            bar,
        }
    }

    /// Tracker that only logs
    pub fn logging(total: u64, interval: u64) -> Self {
        Self::new(total, interval, false)
    }

    pub fn tick(&mut self) {
        self.processed += 1;
        if self.processed % self.interval == 0 {
            info!(
                "processed {} / {}",
                format_number(self.processed),
                format_number(self.total)
            );
            self.bar.set_position(self.processed);
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Finish and clear the progress display
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
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

/// Print a summary of the export results to stdout
pub fn print_summary(summary: &ExportSummary) {
    let stdout = io::stdout();
    if let Err(e) = write_summary(&mut stdout.lock(), summary) {
        warn!("Could not print summary: {}", e);
    }
}

/// Write the summary block shown after an interactive export
pub fn write_summary<W: Write>(out: &mut W, summary: &ExportSummary) -> io::Result<()> {
    let duration_secs = summary.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        summary.shapes as f64 / duration_secs
    } else {
        0.0
    };

    writeln!(out)?;
    writeln!(out, "{}", style("Export Complete").green().bold())?;
    writeln!(out, "{}", style("─".repeat(50)).dim())?;
    writeln!(out, "  {} {}", style("Models:").bold(), format_number(summary.models))?;
    writeln!(out, "  {} {}", style("Instances:").bold(), format_number(summary.instances))?;
    writeln!(out, "  {} {}", style("Shapes:").bold(), format_number(summary.shapes))?;
    writeln!(out, "  {} {}", style("Materials:").bold(), format_number(summary.materials))?;
    if summary.skipped_lines > 0 {
        writeln!(
            out,
            "  {} {}",
            style("Skipped lines:").yellow().bold(),
            format_number(summary.skipped_lines)
        )?;
    }
    writeln!(
        out,
        "  {} {:.1}s ({:.0} shapes/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    )?;
    writeln!(
        out,
        "  {} {} ({})",
        style("Output:").bold(),
        summary.path.display(),
        format_size(summary.file_size, BINARY)
    )?;
    writeln!(out)
}
