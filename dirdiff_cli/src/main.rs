use anyhow::Context;
use clap::{Parser, Subcommand};
use dirdiff_common::{ensure_config, load_config, ComparisonEntry, ComparisonReport, ComparisonSummary, Presence};
use dirdiff_core::ComparisonEngine;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const NAME_WIDTH: usize = 48;

#[derive(Parser)]
#[command(name = "dirdiff")]
#[command(author = "DirDiff Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Compare two directory trees and suggest related files for one-sided entries", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two directory trees
    Compare {
        /// Left directory path
        left: PathBuf,

        /// Right directory path
        right: PathBuf,

        /// Ignore patterns (can be specified multiple times)
        #[arg(short, long)]
        ignore: Vec<String>,

        /// Descend into symbolic links to directories
        #[arg(short = 'L', long)]
        follow_symlinks: bool,

        /// Maximum depth to walk below each root
        #[arg(long)]
        max_depth: Option<usize>,

        /// Hide entries present on both sides with nothing one-sided below them
        #[arg(short = 'd', long)]
        diff_only: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Disable ANSI colors in output
        #[arg(long)]
        no_color: bool,
    },

    /// Create the configuration file with defaults if needed and print its path
    Config {
        /// Use the portable location next to the executable
        #[arg(long)]
        portable: bool,
    },
}

struct CompareOptions {
    ignore: Vec<String>,
    follow_symlinks: bool,
    max_depth: Option<usize>,
    diff_only: bool,
    json: bool,
    no_color: bool,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays clean on stdout
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Compare {
            left,
            right,
            ignore,
            follow_symlinks,
            max_depth,
            diff_only,
            json,
            no_color,
        } => {
            let options = CompareOptions {
                ignore,
                follow_symlinks,
                max_depth,
                diff_only,
                json,
                no_color,
            };
            if let Err(e) = run_compare(&left, &right, options) {
                error!("Comparison failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Config { portable } => {
            if let Err(e) = run_config(portable) {
                error!("Configuration failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_config(portable: bool) -> anyhow::Result<()> {
    let loaded = ensure_config(portable).context("writing configuration")?;
    if loaded.exists {
        info!("Configuration already present");
    } else {
        info!("Wrote default configuration");
    }
    println!("{}", loaded.path.display());
    Ok(())
}

fn run_compare(left: &Path, right: &Path, options: CompareOptions) -> anyhow::Result<()> {
    for (side, root) in [("Left", left), ("Right", right)] {
        if !root.is_dir() {
            warn!("{} path is not a directory, treating it as empty: {}", side, root.display());
        }
    }

    let loaded = load_config(false).context("loading configuration")?;
    info!("Using configuration at {}", loaded.path.display());
    let mut config = loaded.config;

    config.ignore_patterns.extend(options.ignore);
    if options.follow_symlinks {
        config.follow_symlinks = true;
    }
    if options.max_depth.is_some() {
        config.max_depth = options.max_depth;
    }

    let engine = ComparisonEngine::new(config).context("building directory walker")?;
    let report = engine.compare(left, right).context("scanning directories")?;

    for warning in &report.warnings {
        warn!("Skipped {}: {}", warning.path.display(), warning.message);
    }

    if options.json {
        let output = serde_json::to_string_pretty(&build_json_report(&report, options.diff_only))?;
        println!("{output}");
        return Ok(());
    }

    let use_color = !options.no_color && std::io::stdout().is_terminal();
    println!("{}", "=".repeat(100));
    println!("Left:  {}", report.left_root.display());
    println!("Right: {}", report.right_root.display());
    println!("{}", "=".repeat(100));
    println!("{:<width$} {:^4} {}", "Name", "LR", "Related", width = NAME_WIDTH);
    println!("{}", "-".repeat(100));
    for line in render_entries(&report.entries, options.diff_only, use_color) {
        println!("{line}");
    }

    let summary = report.summary();
    println!("\n{}", "=".repeat(100));
    println!("Summary:");
    println!("  Total entries:     {}", summary.total);
    println!("  Both sides:        {}", summary.both);
    println!("  Left only:         {}", summary.left_only);
    println!("  Right only:        {}", summary.right_only);
    println!("  With suggestions:  {}", summary.with_suggestions);
    println!("  Warnings:          {}", report.warnings.len());
    println!("{}", "=".repeat(100));

    Ok(())
}

/// One line per visible entry: indented name, presence flag, suggestions
fn render_entries(entries: &[ComparisonEntry], diff_only: bool, use_color: bool) -> Vec<String> {
    let mut lines = Vec::new();
    render_level(entries, 0, diff_only, use_color, &mut lines);
    lines
}

fn render_level(
    entries: &[ComparisonEntry],
    depth: usize,
    diff_only: bool,
    use_color: bool,
    lines: &mut Vec<String>,
) {
    for entry in entries {
        if diff_only && !entry.has_differences() {
            continue;
        }

        let mut name = format!("{}{}", "  ".repeat(depth), entry.name);
        if entry.is_directory {
            name.push('/');
        }

        let (color, reset) = if use_color {
            let color = match entry.presence {
                Presence::Both => "\x1b[32m",      // Green
                Presence::LeftOnly => "\x1b[33m",  // Yellow
                Presence::RightOnly => "\x1b[34m", // Blue
            };
            (color, "\x1b[0m")
        } else {
            ("", "")
        };

        let line = format!(
            "{:<width$} {}{:^4}{} {}",
            truncate_name(&name, NAME_WIDTH),
            color,
            entry.flag(),
            reset,
            entry.suggestions_display(),
            width = NAME_WIDTH
        );
        lines.push(line.trim_end().to_string());

        render_level(&entry.children, depth + 1, diff_only, use_color, lines);
    }
}

#[derive(Serialize)]
struct JsonReport {
    left: String,
    right: String,
    summary: ComparisonSummary,
    entries: Vec<JsonEntry>,
    warnings: Vec<JsonWarning>,
}

#[derive(Serialize)]
struct JsonEntry {
    name: String,
    path: String,
    flag: &'static str,
    is_dir: bool,
    suggestions: Vec<String>,
    children: Vec<JsonEntry>,
}

#[derive(Serialize)]
struct JsonWarning {
    path: String,
    message: String,
}

fn build_json_report(report: &ComparisonReport, diff_only: bool) -> JsonReport {
    JsonReport {
        left: report.left_root.to_string_lossy().to_string(),
        right: report.right_root.to_string_lossy().to_string(),
        summary: report.summary(),
        entries: json_entries(&report.entries, diff_only),
        warnings: report
            .warnings
            .iter()
            .map(|w| JsonWarning {
                path: w.path.to_string_lossy().to_string(),
                message: w.message.clone(),
            })
            .collect(),
    }
}

fn json_entries(entries: &[ComparisonEntry], diff_only: bool) -> Vec<JsonEntry> {
    entries
        .iter()
        .filter(|entry| !diff_only || entry.has_differences())
        .map(|entry| JsonEntry {
            name: entry.name.clone(),
            path: entry.relative_path.clone(),
            flag: entry.flag(),
            is_dir: entry.is_directory,
            suggestions: entry.suggestions.iter().cloned().collect(),
            children: json_entries(&entry.children, diff_only),
        })
        .collect()
}

fn truncate_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        return name.to_string();
    }

    // Keep the end of the name visible
    let prefix = "...";
    let keep_len = max_len.saturating_sub(prefix.len());
    let skip_count = name.chars().count().saturating_sub(keep_len);
    let suffix: String = name.chars().skip(skip_count).collect();

    format!("{}{}", prefix, suffix)
}
