//! Request-scoped diagnostics collection.
//!
//! A [`Profiler`] lives for exactly one request. Handlers time work with
//! [`Profiler::start`] / [`Profiler::finish`], record loaded files, errors and
//! persistence statements, and the host turns it into a
//! [`DiagnosticsSnapshot`] once the response body is produced.
//!
//! Spans nest. A span records only its exclusive share: time and memory
//! spent in spans started inside it are attributed to those spans, so the
//! category figures never count the same work twice.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::trace;

use crate::memory::MemoryReader;
use crate::snapshot::{
    Breakdown, Category, DiagnosticsSnapshot, ErrorEntry, LoadedFile, QueryLog, QueryProfile,
    ResourceSample, RouteInfo,
};

/// An in-flight measurement returned by [`Profiler::start`].
#[must_use = "a span records nothing until passed to Profiler::finish"]
#[derive(Debug)]
pub struct Span {
    category: Category,
    resource: String,
    started: Instant,
    memory_before: u64,
    /// Position of this span's frame on the open-span stack, plus one.
    depth: usize,
}

/// Work done by spans nested inside an open span.
#[derive(Debug, Default, Clone, Copy)]
struct Frame {
    nested_time: Duration,
    nested_memory: u64,
}

/// Persistence statement log for one request.
#[derive(Debug, Default)]
pub struct QueryProfiler {
    profiles: Vec<QueryProfile>,
    active: Option<(String, Instant)>,
}

impl QueryProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a statement. A statement still in flight is
    /// finished first.
    pub fn start(&mut self, statement: impl Into<String>) {
        self.finish();
        self.active = Some((statement.into(), Instant::now()));
    }

    /// Finishes the statement started by [`QueryProfiler::start`], if any.
    pub fn finish(&mut self) {
        if let Some((statement, started)) = self.active.take() {
            self.record(statement, started.elapsed());
        }
    }

    /// Records a statement with an already measured duration.
    pub fn record(&mut self, statement: impl Into<String>, elapsed: Duration) {
        let statement = statement.into();
        trace!(elapsed_us = elapsed.as_micros() as u64, %statement, "query recorded");
        self.profiles.push(QueryProfile {
            statement,
            elapsed_secs: elapsed.as_secs_f64(),
        });
    }

    pub fn profiles(&self) -> &[QueryProfile] {
        &self.profiles
    }

    pub fn total_statements(&self) -> u64 {
        self.profiles.len() as u64
    }

    pub fn total_elapsed_secs(&self) -> f64 {
        self.profiles.iter().map(|p| p.elapsed_secs).sum()
    }

    pub fn log(&self) -> QueryLog {
        QueryLog::from_profiles(self.profiles.clone())
    }
}

pub struct Profiler {
    started: Instant,
    memory: Arc<dyn MemoryReader>,
    memory_samples: Breakdown,
    time_samples: Breakdown,
    files: Vec<LoadedFile>,
    errors: Vec<ErrorEntry>,
    queries: QueryProfiler,
    open: Vec<Frame>,
}

impl std::fmt::Debug for Profiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("started", &self.started)
            .field("files", &self.files.len())
            .field("errors", &self.errors.len())
            .field("queries", &self.queries.profiles.len())
            .field("open_spans", &self.open.len())
            .finish()
    }
}

/// Adds `value` to the sample for `resource`, creating it if needed.
fn accumulate(breakdown: &mut Breakdown, category: Category, resource: &str, value: f64) {
    let samples = breakdown.entry(category).or_default();
    match samples.iter_mut().find(|s| s.resource == resource) {
        Some(sample) => sample.value += value,
        None => samples.push(ResourceSample {
            resource: resource.to_string(),
            value,
        }),
    }
}

impl Profiler {
    /// Creates a profiler for a request that started at `started`.
    pub fn new(started: Instant, memory: Arc<dyn MemoryReader>) -> Self {
        Self {
            started,
            memory,
            memory_samples: Breakdown::new(),
            time_samples: Breakdown::new(),
            files: Vec::new(),
            errors: Vec::new(),
            queries: QueryProfiler::new(),
            open: Vec::new(),
        }
    }

    pub fn start(&mut self, category: Category, resource: impl Into<String>) -> Span {
        self.open.push(Frame::default());
        Span {
            category,
            resource: resource.into(),
            started: Instant::now(),
            memory_before: self.memory.current_usage(),
            depth: self.open.len(),
        }
    }

    /// Records the time and memory growth since `span` was started, minus
    /// what spans nested inside it already recorded.
    ///
    /// Spans started inside `span` and never finished are discarded.
    pub fn finish(&mut self, span: Span) {
        let elapsed = span.started.elapsed();
        let grown = self
            .memory
            .current_usage()
            .saturating_sub(span.memory_before);

        let nested = if self.open.len() >= span.depth {
            self.open.truncate(span.depth);
            self.open.pop().unwrap_or_default()
        } else {
            Frame::default()
        };
        if let Some(parent) = self.open.last_mut() {
            parent.nested_time += elapsed;
            parent.nested_memory = parent.nested_memory.saturating_add(grown);
        }

        self.record(
            span.category,
            &span.resource,
            elapsed.saturating_sub(nested.nested_time),
            grown.saturating_sub(nested.nested_memory),
        );
    }

    /// Records a sample directly. Repeated resources within a category accumulate.
    pub fn record(&mut self, category: Category, resource: &str, elapsed: Duration, memory_bytes: u64) {
        accumulate(&mut self.time_samples, category, resource, elapsed.as_secs_f64());
        accumulate(&mut self.memory_samples, category, resource, memory_bytes as f64);
    }

    pub fn record_file(&mut self, path: impl Into<String>, size: u64) {
        self.files.push(LoadedFile {
            path: path.into(),
            size,
        });
    }

    pub fn record_error(&mut self, message: impl Into<String>, trace: impl Into<String>) {
        self.errors.push(ErrorEntry {
            message: message.into(),
            trace: trace.into(),
        });
    }

    /// Records an error; its source chain becomes the trace, one `#n` frame per cause.
    pub fn record_error_chain(&mut self, error: &dyn std::error::Error) {
        let mut frames = Vec::new();
        let mut current = error.source();
        while let Some(cause) = current {
            frames.push(format!("#{} {}", frames.len(), cause));
            current = cause.source();
        }
        self.record_error(error.to_string(), frames.join(" "));
    }

    pub fn queries(&mut self) -> &mut QueryProfiler {
        &mut self.queries
    }

    pub fn query_log(&self) -> &QueryProfiler {
        &self.queries
    }

    pub fn memory_samples(&self) -> &Breakdown {
        &self.memory_samples
    }

    pub fn time_samples(&self) -> &Breakdown {
        &self.time_samples
    }

    pub fn files(&self) -> &[LoadedFile] {
        &self.files
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    /// Builds the snapshot for this request as of now.
    pub fn snapshot(
        &self,
        config: Map<String, Value>,
        route: RouteInfo,
        memory_limit: i64,
    ) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            config,
            route,
            memory_used: self.memory.current_usage(),
            memory_limit,
            elapsed_ms: self.started.elapsed().as_secs_f64() * 1000.0,
            memory: self.memory_samples.clone(),
            time: self.time_samples.clone(),
            files: self.files.clone(),
            queries: self.queries.log(),
            errors: self.errors.clone(),
            captured_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FixedMemoryReader;

    fn profiler_with(reader: Arc<FixedMemoryReader>) -> Profiler {
        Profiler::new(Instant::now(), reader)
    }

    #[derive(Debug)]
    struct Leaf;

    impl std::fmt::Display for Leaf {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl std::error::Error for Leaf {}

    #[derive(Debug)]
    struct Outer(Leaf);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("widget load failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_span_records_memory_growth() {
        let reader = Arc::new(FixedMemoryReader::new(1_000));
        let mut profiler = profiler_with(reader.clone());
        let span = profiler.start(Category::View, "index.html");
        reader.set(3_048);
        profiler.finish(span);

        let mem = &profiler.memory_samples()[&Category::View];
        assert_eq!(mem.len(), 1);
        assert_eq!(mem[0].resource, "index.html");
        assert_eq!(mem[0].value, 2_048.0);
        assert!(profiler.time_samples()[&Category::View][0].value >= 0.0);
    }

    #[test]
    fn test_memory_shrink_records_zero() {
        let reader = Arc::new(FixedMemoryReader::new(5_000));
        let mut profiler = profiler_with(reader.clone());
        let span = profiler.start(Category::Model, "Post");
        reader.set(1_000);
        profiler.finish(span);
        assert_eq!(profiler.memory_samples()[&Category::Model][0].value, 0.0);
    }

    #[test]
    fn test_nested_spans_record_exclusive_share() {
        let reader = Arc::new(FixedMemoryReader::new(1_000));
        let mut profiler = profiler_with(reader.clone());

        let outer = profiler.start(Category::Controller, "IndexController");
        let inner = profiler.start(Category::Model, "Blog");
        std::thread::sleep(Duration::from_millis(20));
        reader.set(3_000);
        profiler.finish(inner);
        reader.set(3_500);
        profiler.finish(outer);

        let model = profiler.time_samples()[&Category::Model][0].value;
        let controller = profiler.time_samples()[&Category::Controller][0].value;
        assert!(model >= 0.02);
        assert!(controller < model);
        assert_eq!(profiler.memory_samples()[&Category::Model][0].value, 2_000.0);
        assert_eq!(profiler.memory_samples()[&Category::Controller][0].value, 500.0);
    }

    #[test]
    fn test_categories_do_not_exceed_elapsed() {
        let mut profiler = profiler_with(Arc::new(FixedMemoryReader::new(0)));
        let controller = profiler.start(Category::Controller, "IndexController");
        for _ in 0..3 {
            let model = profiler.start(Category::Model, "Blog");
            std::thread::sleep(Duration::from_millis(5));
            profiler.finish(model);
        }
        let view = profiler.start(Category::View, "index.html");
        std::thread::sleep(Duration::from_millis(5));
        profiler.finish(view);
        profiler.finish(controller);

        let snapshot = profiler.snapshot(Map::new(), RouteInfo::default(), 0);
        let categorized_ms: f64 = snapshot
            .time
            .values()
            .flatten()
            .map(|s| s.value * 1000.0)
            .sum();
        assert!(categorized_ms <= snapshot.elapsed_ms);
        assert!(categorized_ms >= 20.0);
    }

    #[test]
    fn test_unfinished_nested_span_is_discarded() {
        let mut profiler = profiler_with(Arc::new(FixedMemoryReader::new(0)));
        let outer = profiler.start(Category::Controller, "IndexController");
        let _abandoned = profiler.start(Category::View, "index.html");
        profiler.finish(outer);

        assert!(profiler.time_samples().contains_key(&Category::Controller));
        assert!(!profiler.time_samples().contains_key(&Category::View));
        assert!(format!("{:?}", profiler).contains("open_spans: 0"));
    }

    #[test]
    fn test_same_resource_accumulates() {
        let mut profiler = profiler_with(Arc::new(FixedMemoryReader::new(0)));
        profiler.record(Category::Model, "Post", Duration::from_millis(10), 100);
        profiler.record(Category::Model, "Widget", Duration::from_millis(1), 1);
        profiler.record(Category::Model, "Post", Duration::from_millis(5), 50);

        let time = &profiler.time_samples()[&Category::Model];
        assert_eq!(time.len(), 2);
        assert_eq!(time[0].resource, "Post");
        assert!((time[0].value - 0.015).abs() < 1e-9);
        assert_eq!(profiler.memory_samples()[&Category::Model][0].value, 150.0);
        assert!(!profiler.time_samples().contains_key(&Category::Cache));
    }

    #[test]
    fn test_query_profiler_start_finish() {
        let mut queries = QueryProfiler::new();
        queries.start("SELECT 1");
        queries.start("SELECT 2");
        queries.finish();
        queries.finish();
        queries.record("SELECT 3", Duration::from_millis(2));

        let statements: Vec<_> = queries.profiles().iter().map(|p| p.statement.as_str()).collect();
        assert_eq!(statements, ["SELECT 1", "SELECT 2", "SELECT 3"]);
        assert_eq!(queries.total_statements(), 3);
        assert!(queries.total_elapsed_secs() >= 0.002);
    }

    #[test]
    fn test_record_error_chain() {
        let mut profiler = profiler_with(Arc::new(FixedMemoryReader::new(0)));
        profiler.record_error_chain(&Outer(Leaf));
        let entry = &profiler.errors()[0];
        assert_eq!(entry.message, "widget load failed");
        assert_eq!(entry.trace, "#0 connection refused");
    }

    #[test]
    fn test_snapshot_collects_everything() {
        let reader = Arc::new(FixedMemoryReader::new(4_096));
        let mut profiler = profiler_with(reader);
        profiler.record_file("/srv/eye/views/index.html", 512);
        profiler.record_error("boom", "#0 main");
        profiler.queries().record("SELECT * FROM widgets", Duration::from_millis(3));
        profiler.record(Category::Controller, "IndexController", Duration::from_millis(4), 64);

        let route = RouteInfo::new("core", "Index", "index");
        let snapshot = profiler.snapshot(Map::new(), route.clone(), 1024 * 1024);

        assert_eq!(snapshot.route, route);
        assert_eq!(snapshot.memory_used, 4_096);
        assert_eq!(snapshot.memory_limit, 1024 * 1024);
        assert!(snapshot.elapsed_ms >= 0.0);
        assert_eq!(snapshot.files.len(), 1);
        assert_eq!(snapshot.errors.len(), 1);
        assert_eq!(snapshot.queries.total_statements, 1);
        assert!(snapshot.time.contains_key(&Category::Controller));
        assert!(snapshot.captured_at > 0);
    }
}
