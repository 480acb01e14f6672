//! Request diagnostics report.
//!
//! [`Reporter`] decides through the [`DiagnosticsGate`] whether the current
//! request gets a report, builds the [`DiagnosticsSnapshot`] from the
//! request's [`Profiler`] and writes the rendered HTML fragment to an output
//! stream. The pure renderers ([`render`], [`render_report`]) work on any
//! snapshot, including ones captured earlier and loaded from disk.
//!
//! The fragment has seven panels, each with a toolbar headline:
//!
//! | Panel   | Headline                              | Severity                  |
//! |---------|---------------------------------------|---------------------------|
//! | config  | -                                     | -                         |
//! | router  | `IndexController::IndexAction`        | -                         |
//! | memory  | used kb                               | % of ceiling: <30, <75    |
//! | time    | elapsed ms                            | <200 ms, <500 ms          |
//! | files   | loaded file count                     | -                         |
//! | sql     | statement count                       | -                         |
//! | errors  | error count                           | 0 good, otherwise bad     |

mod html;
mod sections;

use std::io;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::fmt::{collapse_whitespace, round_to, ucfirst};
use crate::gate::{DiagnosticsGate, GateDecision, Viewer};
use crate::profiler::Profiler;
use crate::severity::{Severity, memory_percent};
use crate::snapshot::{DiagnosticsSnapshot, RouteInfo};

pub use sections::{NO_ERRORS, NO_SQL, unaccounted_ms};

/// Separator appended after each titled section.
pub const SEPARATOR: &str = "<br/>";

/// A toolbar figure with its severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Headline<T> {
    pub severity: Severity,
    pub value: T,
}

/// Toolbar figures for a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headlines {
    /// `IndexController::IndexAction`
    pub router: String,
    /// Used memory in kb, rounded to 2 decimals.
    pub memory: Headline<f64>,
    /// Used memory as a rounded percentage of the ceiling.
    pub memory_percent: f64,
    /// Elapsed milliseconds, rounded to 2 decimals.
    pub time: Headline<f64>,
    pub files: usize,
    pub sql: u64,
    pub errors: Headline<usize>,
}

/// Computes the toolbar figures for `snapshot`.
pub fn headlines(snapshot: &DiagnosticsSnapshot) -> Headlines {
    let route = &snapshot.route;
    let percent = memory_percent(snapshot.memory_used, snapshot.memory_limit);
    let elapsed_ms = round_to(snapshot.elapsed_ms, 2);

    Headlines {
        router: format!(
            "{}Controller::{}Action",
            ucfirst(&route.controller),
            ucfirst(&route.action)
        ),
        memory: Headline {
            severity: Severity::from_memory_percent(percent),
            value: round_to(snapshot.memory_used as f64 / 1024.0, 2),
        },
        memory_percent: percent,
        time: Headline {
            severity: Severity::from_elapsed_ms(elapsed_ms),
            value: elapsed_ms,
        },
        files: snapshot.files.len(),
        sql: snapshot.queries.total_statements,
        errors: Headline {
            severity: Severity::from_error_count(snapshot.errors.len()),
            value: snapshot.errors.len(),
        },
    }
}

fn format_captured_at(ts: i64) -> Option<String> {
    if ts <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Renders the full fragment without whitespace normalization.
///
/// `root_path` is stripped from resource and file paths.
pub fn render(snapshot: &DiagnosticsSnapshot, root_path: &str) -> String {
    let heads = headlines(snapshot);
    let panels = html::Panels {
        config: sections::config(&snapshot.config),
        router: sections::router(&snapshot.route),
        memory: sections::memory(&snapshot.memory, root_path),
        time: sections::time(&snapshot.time, root_path, heads.time.value),
        files: sections::files(&snapshot.files, root_path),
        sql: sections::sql(&snapshot.queries),
        errors: sections::errors(&snapshot.errors),
    };
    let captured_at = format_captured_at(snapshot.captured_at);
    html::layout(&heads, &panels, captured_at.as_deref())
}

/// Renders the fragment with every whitespace run collapsed to one space.
pub fn render_report(snapshot: &DiagnosticsSnapshot, root_path: &str) -> String {
    collapse_whitespace(&render(snapshot, root_path))
}

/// Writes the diagnostics fragment for one request.
///
/// Holds typed references to everything the report reads: the gate built
/// from configuration, the configuration itself, the viewer, the routing
/// decision and the request's profiler (absent when collection is disabled).
pub struct Reporter<'a> {
    gate: &'a DiagnosticsGate,
    config: &'a AppConfig,
    viewer: &'a Viewer,
    route: &'a RouteInfo,
    profiler: Option<&'a Profiler>,
}

impl<'a> Reporter<'a> {
    pub fn new(
        gate: &'a DiagnosticsGate,
        config: &'a AppConfig,
        viewer: &'a Viewer,
        route: &'a RouteInfo,
        profiler: Option<&'a Profiler>,
    ) -> Self {
        Self {
            gate,
            config,
            viewer,
            route,
            profiler,
        }
    }

    pub fn decision(&self) -> GateDecision {
        self.gate
            .decide(self.profiler.is_some(), &self.route.controller, self.viewer)
    }

    /// Snapshot of the request as of now, if a profiler is present.
    pub fn snapshot(&self) -> Option<DiagnosticsSnapshot> {
        self.profiler.map(|p| {
            p.snapshot(
                self.config.to_tree(),
                self.route.clone(),
                self.config.memory_limit_bytes(),
            )
        })
    }

    /// The snapshot to report on, or `None` when the gate rejects the request.
    pub fn reportable(&self) -> Option<DiagnosticsSnapshot> {
        if let GateDecision::Skip(reason) = self.decision() {
            debug!(%reason, controller = %self.route.controller, "diagnostics report skipped");
            return None;
        }
        self.snapshot()
    }

    /// Writes the fragment for an already taken snapshot.
    pub fn write_snapshot<W: io::Write + ?Sized>(
        &self,
        snapshot: &DiagnosticsSnapshot,
        out: &mut W,
    ) -> io::Result<()> {
        let html = render_report(snapshot, &self.config.application.root_path);
        out.write_all(html.as_bytes())?;
        debug!(
            bytes = html.len(),
            queries = snapshot.queries.total_statements,
            errors = snapshot.errors.len(),
            "diagnostics report written"
        );
        Ok(())
    }

    /// Writes the report to `out` when the gate allows it.
    ///
    /// Returns whether anything was written. A rejected gate is not an error.
    pub fn write_to<W: io::Write + ?Sized>(&self, out: &mut W) -> io::Result<bool> {
        let Some(snapshot) = self.reportable() else {
            return Ok(false);
        };
        self.write_snapshot(&snapshot, out)?;
        Ok(true)
    }
}
