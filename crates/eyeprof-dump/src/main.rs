use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, error};

use eyeprof_core::fmt::format_decimal;
use eyeprof_core::report::{Headlines, headlines, render, render_report};
use eyeprof_core::snapshot::DiagnosticsSnapshot;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "eyeprof-dump", about = "Render saved request diagnostics snapshots", version = eyeprof_core::VERSION)]
struct Cli {
    /// Snapshot JSON file, or a directory of them (eyeprof-web --capture-dir)
    path: PathBuf,

    /// Application root stripped from resource and file paths
    #[arg(long, default_value = "")]
    root: String,

    /// Print the fragment without whitespace normalization
    #[arg(long)]
    raw: bool,

    /// Print the toolbar figures instead of the HTML fragment
    #[arg(long)]
    summary: bool,

    /// With --summary: output as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("eyeprof_dump=warn")),
        )
        .init();

    let files = match snapshot_files(&cli.path) {
        Ok(files) => files,
        Err(e) => {
            error!(path = %cli.path.display(), error = %e, "failed to read input");
            process::exit(1);
        }
    };
    if files.is_empty() {
        error!(path = %cli.path.display(), "no snapshot files found");
        process::exit(1);
    }

    let mut snapshots = Vec::with_capacity(files.len());
    for file in &files {
        match load_snapshot(file) {
            Ok(snapshot) => snapshots.push((file.clone(), snapshot)),
            Err(e) => {
                error!(file = %file.display(), error = %e, "invalid snapshot");
                process::exit(1);
            }
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = write_output(&mut out, &cli, &snapshots) {
        error!(error = %e, "failed to write output");
        process::exit(1);
    }
}

// ── Input ────────────────────────────────────────────────────────────────────

fn has_ext(path: &Path, ext: &str) -> bool {
    path.extension().and_then(OsStr::to_str) == Some(ext)
}

/// The file itself, or the `.json` files of a directory in name order.
fn snapshot_files(path: &Path) -> io::Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_ext(p, "json"))
        .collect();
    files.sort();
    debug!(dir = %path.display(), files = files.len(), "snapshot directory scanned");
    Ok(files)
}

fn load_snapshot(path: &Path) -> io::Result<DiagnosticsSnapshot> {
    DiagnosticsSnapshot::load(path)
}

// ── Formatting helpers ───────────────────────────────────────────────────────

fn fmt_ts(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

// ── JSON output types ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SummaryJson {
    file: String,
    captured_at: String,
    #[serde(flatten)]
    headlines: Headlines,
}

// ── Output ───────────────────────────────────────────────────────────────────

fn summary_text(file: &Path, snapshot: &DiagnosticsSnapshot) -> String {
    let h = headlines(snapshot);
    let sql_ms = format_decimal(snapshot.queries.total_elapsed_secs * 1000.0, 4);
    format!(
        "{}\n  captured: {}\n  route:    {}\n  memory:   {} kb ({}%, {:?})\n  time:     {} ms ({:?})\n  files:    {}\n  sql:      {} ({} ms)\n  errors:   {} ({:?})\n",
        file.display(),
        fmt_ts(snapshot.captured_at),
        h.router,
        h.memory.value,
        h.memory_percent,
        h.memory.severity,
        h.time.value,
        h.time.severity,
        h.files,
        h.sql,
        sql_ms,
        h.errors.value,
        h.errors.severity,
    )
}

fn write_output<W: Write>(
    out: &mut W,
    cli: &Cli,
    snapshots: &[(PathBuf, DiagnosticsSnapshot)],
) -> io::Result<()> {
    if cli.summary && cli.json {
        let summaries: Vec<SummaryJson> = snapshots
            .iter()
            .map(|(file, snapshot)| SummaryJson {
                file: file.display().to_string(),
                captured_at: fmt_ts(snapshot.captured_at),
                headlines: headlines(snapshot),
            })
            .collect();
        serde_json::to_writer_pretty(&mut *out, &summaries).map_err(io::Error::other)?;
        return writeln!(out);
    }

    for (file, snapshot) in snapshots {
        if cli.summary {
            write!(out, "{}", summary_text(file, snapshot))?;
        } else if cli.raw {
            write!(out, "{}", render(snapshot, &cli.root))?;
        } else {
            writeln!(out, "{}", render_report(snapshot, &cli.root))?;
        }
    }
    Ok(())
}
