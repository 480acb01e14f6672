//! Panel bodies, one function per report section.

use serde_json::{Map, Value};

use crate::fmt::{
    escape_html, format_decimal, format_kb, format_params, format_secs_as_ms, round_to,
    strip_root, ucfirst,
};
use crate::snapshot::{Breakdown, ErrorEntry, LoadedFile, QueryLog, RouteInfo};

use super::SEPARATOR;
use super::html::{Wrap, element, element_markup, title};

/// Text form of a configuration leaf.
fn leaf_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Configuration tree flattened to two levels below each top-level section.
///
/// Top-level scalars and empty sections are skipped. Children of a nested
/// section are rendered under their own key; anything deeper is dropped.
pub(crate) fn config(tree: &Map<String, Value>) -> String {
    let mut html = String::new();
    for (key, data) in tree {
        let Value::Object(section) = data else {
            continue;
        };
        if section.is_empty() {
            continue;
        }

        html.push_str(&title(&ucfirst(key)));
        for (key2, data2) in section {
            match data2 {
                Value::Object(nested) => {
                    for (key3, data3) in nested {
                        if !data3.is_object() {
                            html.push_str(&element(&ucfirst(key3), &leaf_text(data3), Wrap::Code));
                        }
                    }
                }
                leaf => html.push_str(&element(&ucfirst(key2), &leaf_text(leaf), Wrap::Code)),
            }
        }
        html.push_str(SEPARATOR);
    }
    html
}

pub(crate) fn router(route: &RouteInfo) -> String {
    let mut html = element("POST data", &format_params(&route.form), Wrap::Pre);
    html.push_str(&element("GET data", &format_params(&route.query), Wrap::Pre));
    html.push_str(&element("Module", &ucfirst(&route.module), Wrap::Code));
    html.push_str(&element("Controller", &ucfirst(&route.controller), Wrap::Code));
    html.push_str(&element("Action", &ucfirst(&route.action), Wrap::Code));
    if let Some(name) = &route.matched_route {
        html.push_str(&element("Matched Route", &ucfirst(name), Wrap::Code));
    }
    html
}

pub(crate) fn memory(breakdown: &Breakdown, root: &str) -> String {
    let mut html = String::new();
    for (category, samples) in breakdown {
        if samples.is_empty() {
            continue;
        }
        html.push_str(&title(&ucfirst(category.as_str())));
        for sample in samples {
            let kb = format_decimal(sample.value / 1024.0, 2);
            html.push_str(&element(
                &strip_root(&sample.resource, root),
                &format!("{} kb", kb),
                Wrap::Code,
            ));
        }
        html.push_str(SEPARATOR);
    }
    html
}

/// Milliseconds of `elapsed_ms` not attributed to any category.
///
/// Each sample is rounded to 2 decimals before being subtracted. The result
/// is negative when categories over-report.
pub fn unaccounted_ms(breakdown: &Breakdown, elapsed_ms: f64) -> f64 {
    breakdown
        .values()
        .flatten()
        .fold(elapsed_ms, |left, s| left - round_to(s.value * 1000.0, 2))
}

pub(crate) fn time(breakdown: &Breakdown, root: &str, elapsed_ms: f64) -> String {
    let mut html = String::new();
    for (category, samples) in breakdown {
        if samples.is_empty() {
            continue;
        }
        html.push_str(&title(&ucfirst(category.as_str())));
        for sample in samples {
            html.push_str(&element(
                &strip_root(&sample.resource, root),
                &format_secs_as_ms(sample.value, 2),
                Wrap::Code,
            ));
        }
        html.push_str(SEPARATOR);
    }

    let other = unaccounted_ms(breakdown, elapsed_ms);
    html.push_str(&title("Other"));
    html.push_str(&element(
        "Time from request received",
        &format!("{} ms", format_decimal(other, 2)),
        Wrap::Code,
    ));
    html.push_str(SEPARATOR);
    html
}

pub(crate) fn files(files: &[LoadedFile], root: &str) -> String {
    files
        .iter()
        .map(|f| element(&strip_root(&f.path, root), &format_kb(f.size), Wrap::Code))
        .collect()
}

/// Body text used when no statement was executed.
pub const NO_SQL: &str = "No Sql";

pub(crate) fn sql(log: &QueryLog) -> String {
    let Some(longest) = log.longest() else {
        return NO_SQL.to_string();
    };

    let mut html = element("Total count", &log.total_statements.to_string(), Wrap::Plain);
    html.push_str(&element(
        "Total time",
        &format_decimal(log.total_elapsed_secs * 1000.0, 4),
        Wrap::Plain,
    ));
    html.push_str(&element_markup(
        "Longest query",
        &format!(
            "<span class=\"code\">{}</span> ({} ms)<br/>",
            escape_html(&longest.statement),
            format_decimal(longest.elapsed_secs * 1000.0, 4)
        ),
        Wrap::Plain,
    ));

    for profile in &log.profiles {
        html.push_str(&element("SQL", &profile.statement, Wrap::Code));
        html.push_str(&element_markup(
            "Time",
            &format!("{}<br/>", format_secs_as_ms(profile.elapsed_secs, 4)),
            Wrap::Plain,
        ));
    }
    html
}

/// Body text used when no error was recorded.
pub const NO_ERRORS: &str = "No Errors";

/// Escapes a trace and breaks the line before every `#` frame marker.
fn format_trace(trace: &str) -> String {
    trace
        .split('#')
        .map(escape_html)
        .collect::<Vec<_>>()
        .join("<br/>#")
}

pub(crate) fn errors(errors: &[ErrorEntry]) -> String {
    if errors.is_empty() {
        return NO_ERRORS.to_string();
    }
    errors
        .iter()
        .map(|e| element_markup(&e.message, &format_trace(&e.trace), Wrap::Code))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Category, QueryProfile, ResourceSample};
    use serde_json::json;

    fn tree(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_config_flattens_two_levels() {
        let tree = tree(json!({
            "installed": true,
            "empty": {},
            "application": {
                "debug": true,
                "view": {
                    "cacheDir": "/tmp/views",
                    "deep": { "hidden": "three-levels-down" }
                }
            }
        }));
        let html = config(&tree);
        assert!(html.contains(">Application</div>"));
        assert!(html.contains("Debug:"));
        assert!(html.contains("<code>true</code>"));
        assert!(html.contains("CacheDir:"));
        assert!(html.contains("/tmp/views"));
        assert!(!html.contains("three-levels-down"));
        assert!(!html.contains("Hidden"));
        assert!(!html.contains("Deep"));
        assert!(!html.contains("Installed"));
        assert!(!html.contains("Empty"));
        assert!(html.ends_with(SEPARATOR));
    }

    #[test]
    fn test_config_leaf_text() {
        assert_eq!(leaf_text(&json!(null)), "");
        assert_eq!(leaf_text(&json!("x")), "x");
        assert_eq!(leaf_text(&json!(3306)), "3306");
        assert_eq!(leaf_text(&json!(["a", 1])), r#"["a",1]"#);
    }

    #[test]
    fn test_router_section() {
        let mut route = RouteInfo::new("blog", "index", "view").with_matched_route("blog-post");
        route.query.insert("page".into(), "2".into());
        let html = router(&route);
        assert!(html.contains("<pre>page =&gt; 2</pre>"));
        assert!(html.contains("<code>Blog</code>"));
        assert!(html.contains("<code>Index</code>"));
        assert!(html.contains("<code>View</code>"));
        assert!(html.contains("<code>Blog-post</code>"));
    }

    #[test]
    fn test_router_without_matched_route() {
        let html = router(&RouteInfo::new("core", "error", "notFound"));
        assert!(!html.contains("Matched Route"));
    }

    fn breakdown(category: Category, samples: &[(&str, f64)]) -> Breakdown {
        let mut b = Breakdown::new();
        b.insert(
            category,
            samples
                .iter()
                .map(|(r, v)| ResourceSample {
                    resource: r.to_string(),
                    value: *v,
                })
                .collect(),
        );
        b
    }

    #[test]
    fn test_memory_section_strips_root() {
        let b = breakdown(Category::View, &[("/srv/eye/views/index.html", 1536.0)]);
        let html = memory(&b, "/srv/eye");
        assert!(html.contains(">View</div>"));
        assert!(html.contains("/views/index.html:"));
        assert!(!html.contains("/srv/eye"));
        assert!(html.contains("<code>1.5 kb</code>"));
    }

    #[test]
    fn test_memory_section_skips_empty_categories() {
        let mut b = Breakdown::new();
        b.insert(Category::Cache, Vec::new());
        assert_eq!(memory(&b, ""), "");
    }

    #[test]
    fn test_time_section_reports_other() {
        let b = breakdown(Category::Model, &[("Post", 0.040), ("Widget", 0.010)]);
        let html = time(&b, "", 120.0);
        assert!(html.contains("<code>40 ms</code>"));
        assert!(html.contains("<code>10 ms</code>"));
        assert!(html.contains(">Other</div>"));
        assert!(html.contains("<code>70 ms</code>"));
    }

    #[test]
    fn test_unaccounted_time_can_go_negative() {
        let b = breakdown(Category::Controller, &[("Index", 0.300)]);
        assert!((unaccounted_ms(&b, 250.0) - -50.0).abs() < 1e-9);
        let html = time(&b, "", 250.0);
        assert!(html.contains("<code>-50 ms</code>"));
    }

    #[test]
    fn test_files_section() {
        let files_list = vec![LoadedFile {
            path: "/srv/eye/views/layout.html".into(),
            size: 2048,
        }];
        let html = files(&files_list, "/srv/eye");
        assert!(html.contains("/views/layout.html:"));
        assert!(html.contains("<code>2 kb</code>"));
    }

    #[test]
    fn test_sql_empty_is_no_sql() {
        assert_eq!(sql(&QueryLog::default()), "No Sql");
    }

    #[test]
    fn test_sql_longest_first_on_tie() {
        let log = QueryLog::from_profiles(vec![
            QueryProfile {
                statement: "SELECT a".into(),
                elapsed_secs: 0.004,
            },
            QueryProfile {
                statement: "SELECT b".into(),
                elapsed_secs: 0.004,
            },
        ]);
        let html = sql(&log);
        assert!(html.contains("<span class=\"code\">SELECT a</span> (4 ms)"));
        assert!(html.contains("Total count:</span>\n    2"));
        assert!(html.contains("Total time:</span>\n    8"));
        assert_eq!(html.matches("<code>SELECT").count(), 2);
    }

    #[test]
    fn test_sql_statement_is_escaped() {
        let log = QueryLog::from_profiles(vec![QueryProfile {
            statement: "SELECT * FROM t WHERE a < 1".into(),
            elapsed_secs: 0.001,
        }]);
        let html = sql(&log);
        assert!(html.contains("a &lt; 1"));
        assert!(!html.contains("a < 1"));
    }

    #[test]
    fn test_errors_section() {
        assert_eq!(errors(&[]), "No Errors");
        let html = errors(&[ErrorEntry {
            message: "Widget not found".into(),
            trace: "#0 render() #1 main()".into(),
        }]);
        assert!(html.contains("Widget not found:"));
        assert!(html.contains("<code><br/>#0 render() <br/>#1 main()</code>"));
    }

    #[test]
    fn test_trace_escaping_does_not_split_entities() {
        assert_eq!(format_trace("#0 it's"), "<br/>#0 it&#39;s");
    }
}
