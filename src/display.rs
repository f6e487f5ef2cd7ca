//! Colored CLI display utilities for tracker output.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::logstream::StreamSummary;
use crate::service::{LogsUpdate, TrackerTotals};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to at most `max_len` characters, adding an ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// One-line summary of the lifetime counters.
#[must_use]
pub fn format_totals(totals: &TrackerTotals) -> String {
    let categories: Vec<String> = totals
        .categories
        .iter()
        .map(|(name, count)| format!("{name}={count}"))
        .collect();
    format!("all={} {}", totals.all, categories.join(" "))
        .trim_end()
        .to_string()
}

pub fn print_tracker_start(command: &str, config_path: Option<&str>) {
    println!(
        "{} {} {} {}",
        timestamp().dimmed(),
        "[TRACK]".blue().bold(),
        command.cyan(),
        config_path
            .map_or_else(|| "config=defaults".to_string(), |p| format!("config={p}"))
            .dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print the new lines of an update followed by the counters.
pub fn print_update(update: &LogsUpdate, raw_mode: bool) {
    let ts = timestamp();
    for line in &update.new_lines {
        println!("{} {}", ts.dimmed(), truncate(line, 200, raw_mode));
    }
    println!(
        "{} {} {}",
        ts.dimmed(),
        "[TOTALS]".magenta().bold(),
        format_totals(&update.totals)
    );
    let _ = io::stdout().flush();
}

pub fn print_tracker_stop(summary: Option<&StreamSummary>, totals: &TrackerTotals) {
    let exit = summary
        .and_then(|s| s.exit_code)
        .map_or_else(|| "-".to_string(), |code| code.to_string());
    println!(
        "{} {} {} {}",
        timestamp().dimmed(),
        "[STOP]".green().bold(),
        format_totals(totals),
        format!("exit={exit}").dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message.red());
}
