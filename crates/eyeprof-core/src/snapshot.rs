//! Per-request diagnostics data model.
//!
//! A [`DiagnosticsSnapshot`] is built once at the end of a request from the
//! request-scoped collectors, rendered once, then discarded. It is
//! serializable so a captured request can be re-rendered offline.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Instrumentation category under which time and memory are attributed.
///
/// Declaration order is the display order in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Controller,
    Model,
    View,
    Widget,
    Form,
    Helper,
    Plugin,
    Api,
    Cache,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Controller,
        Category::Model,
        Category::View,
        Category::Widget,
        Category::Form,
        Category::Helper,
        Category::Plugin,
        Category::Api,
        Category::Cache,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Controller => "controller",
            Category::Model => "model",
            Category::View => "view",
            Category::Widget => "widget",
            Category::Form => "form",
            Category::Helper => "helper",
            Category::Plugin => "plugin",
            Category::Api => "api",
            Category::Cache => "cache",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resource's figure within a category: bytes for memory, seconds for time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub resource: String,
    pub value: f64,
}

/// Category → samples in recording order. Empty categories are absent.
pub type Breakdown = BTreeMap<Category, Vec<ResourceSample>>;

/// Resolved routing decision plus raw request parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub module: String,
    pub controller: String,
    pub action: String,
    /// Name of the matched route, if any route matched.
    pub matched_route: Option<String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub form: BTreeMap<String, String>,
}

impl RouteInfo {
    pub fn new(
        module: impl Into<String>,
        controller: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            controller: controller.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn with_matched_route(mut self, name: impl Into<String>) -> Self {
        self.matched_route = Some(name.into());
        self
    }
}

/// A file loaded while serving the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedFile {
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

/// One executed persistence statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryProfile {
    pub statement: String,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryLog {
    pub profiles: Vec<QueryProfile>,
    pub total_statements: u64,
    pub total_elapsed_secs: f64,
}

impl QueryLog {
    /// Builds a log whose aggregates are computed from `profiles`.
    pub fn from_profiles(profiles: Vec<QueryProfile>) -> Self {
        let total_statements = profiles.len() as u64;
        let total_elapsed_secs = profiles.iter().map(|p| p.elapsed_secs).sum();
        Self {
            profiles,
            total_statements,
            total_elapsed_secs,
        }
    }

    /// The first statement with the greatest elapsed time.
    pub fn longest(&self) -> Option<&QueryProfile> {
        let mut longest: Option<&QueryProfile> = None;
        for profile in &self.profiles {
            match longest {
                Some(current) if profile.elapsed_secs <= current.elapsed_secs => {}
                _ => longest = Some(profile),
            }
        }
        longest
    }
}

/// A recorded error with its stack trace text (`#0 ...`, `#1 ...`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    pub trace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub config: Map<String, Value>,
    pub route: RouteInfo,
    /// Current process memory usage in bytes.
    pub memory_used: u64,
    /// Memory ceiling in bytes; zero or negative when malformed or unlimited.
    pub memory_limit: i64,
    /// Wall-clock milliseconds since the request started.
    pub elapsed_ms: f64,
    #[serde(default)]
    pub memory: Breakdown,
    #[serde(default)]
    pub time: Breakdown,
    #[serde(default)]
    pub files: Vec<LoadedFile>,
    #[serde(default)]
    pub queries: QueryLog,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
    /// Epoch seconds at which the snapshot was taken.
    #[serde(default)]
    pub captured_at: i64,
}

/// Keeps `[A-Za-z0-9_]`, replacing everything else with `_`.
fn file_safe(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

impl DiagnosticsSnapshot {
    /// Reads a snapshot written by [`DiagnosticsSnapshot::save_to_dir`].
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(io::Error::other)
    }

    /// File name stem: `<captured_at>-<module>-<controller>-<action>`.
    pub fn capture_stem(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.captured_at,
            file_safe(&self.route.module),
            file_safe(&self.route.controller),
            file_safe(&self.route.action)
        )
    }

    /// Writes the snapshot as pretty JSON into `dir` and returns the path.
    ///
    /// Existing captures are never overwritten; a numeric suffix is added
    /// instead. The file appears atomically via a `.tmp` rename.
    pub fn save_to_dir(&self, dir: &Path) -> io::Result<PathBuf> {
        let stem = self.capture_stem();
        let mut path = dir.join(format!("{}.json", stem));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{}-{}.json", stem, n));
            n += 1;
        }

        let tmp_path = path.with_extension("tmp");
        let mut out = BufWriter::new(fs::File::create(&tmp_path)?);
        serde_json::to_writer_pretty(&mut out, self).map_err(io::Error::other)?;
        out.flush()?;
        drop(out);
        fs::rename(&tmp_path, &path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(statement: &str, elapsed_secs: f64) -> QueryProfile {
        QueryProfile {
            statement: statement.into(),
            elapsed_secs,
        }
    }

    #[test]
    fn test_longest_prefers_first_on_ties() {
        let log = QueryLog::from_profiles(vec![
            profile("SELECT 1", 0.002),
            profile("SELECT 2", 0.005),
            profile("SELECT 3", 0.005),
        ]);
        assert_eq!(log.longest().unwrap().statement, "SELECT 2");
    }

    #[test]
    fn test_longest_empty() {
        assert!(QueryLog::default().longest().is_none());
    }

    #[test]
    fn test_from_profiles_aggregates() {
        let log = QueryLog::from_profiles(vec![profile("a", 0.25), profile("b", 0.5)]);
        assert_eq!(log.total_statements, 2);
        assert!((log.total_elapsed_secs - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_category_order_follows_declaration() {
        let mut sorted = Category::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, Category::ALL.to_vec());
    }

    #[test]
    fn test_snapshot_json_uses_category_names() {
        let mut snapshot = DiagnosticsSnapshot::default();
        snapshot.time.insert(
            Category::View,
            vec![ResourceSample {
                resource: "index.html".into(),
                value: 0.01,
            }],
        );
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["time"]["view"].is_array());
        let back: DiagnosticsSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_save_to_dir_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = DiagnosticsSnapshot {
            route: RouteInfo::new("blog", "Admin\\Index", "view"),
            captured_at: 1_700_000_000,
            queries: QueryLog::from_profiles(vec![profile("SELECT 1", 0.001)]),
            ..Default::default()
        };

        let first = snapshot.save_to_dir(dir.path()).unwrap();
        assert_eq!(
            first.file_name().unwrap().to_str().unwrap(),
            "1700000000-blog-Admin_Index-view.json"
        );
        let second = snapshot.save_to_dir(dir.path()).unwrap();
        assert_eq!(
            second.file_name().unwrap().to_str().unwrap(),
            "1700000000-blog-Admin_Index-view-1.json"
        );

        assert_eq!(DiagnosticsSnapshot::load(&first).unwrap(), snapshot);
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(DiagnosticsSnapshot::load(&path).is_err());
    }

    #[test]
    fn test_route_info_builder() {
        let route = RouteInfo::new("blog", "Index", "view").with_matched_route("blog-post");
        assert_eq!(route.matched_route.as_deref(), Some("blog-post"));
        assert!(route.query.is_empty());
    }
}
