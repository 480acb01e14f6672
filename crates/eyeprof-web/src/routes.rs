//! Route table mapping request paths to module/controller/action triples.
//!
//! axum does the actual dispatch; this table only names the route so the
//! diagnostics report and the admin-area check see the same controller the
//! handler belongs to.

use axum::http::Method;

use eyeprof_core::snapshot::RouteInfo;

struct RouteEntry {
    method: Option<Method>,
    segments: Vec<&'static str>,
    module: &'static str,
    controller: &'static str,
    action: &'static str,
    name: Option<&'static str>,
}

impl RouteEntry {
    fn matches(&self, method: &Method, path: &[&str]) -> bool {
        if let Some(m) = &self.method
            && m != method
        {
            return false;
        }
        self.segments.len() == path.len()
            && self
                .segments
                .iter()
                .zip(path)
                .all(|(pattern, seg)| (pattern.starts_with('{') && pattern.ends_with('}')) || pattern == seg)
    }
}

pub(crate) struct RouteTable {
    entries: Vec<RouteEntry>,
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl RouteTable {
    pub(crate) fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Adds a route. Earlier routes win.
    pub(crate) fn add(
        mut self,
        method: Option<Method>,
        pattern: &'static str,
        target: (&'static str, &'static str, &'static str),
        name: Option<&'static str>,
    ) -> Self {
        let (module, controller, action) = target;
        self.entries.push(RouteEntry {
            method,
            segments: split_path(pattern),
            module,
            controller,
            action,
            name,
        });
        self
    }

    /// Routes served by this host.
    pub(crate) fn standard() -> Self {
        Self::new()
            .add(Some(Method::GET), "/", ("core", "index", "index"), Some("home"))
            .add(Some(Method::GET), "/blog", ("blog", "index", "index"), Some("blog"))
            .add(Some(Method::POST), "/blog", ("blog", "index", "create"), Some("blog-create"))
            .add(Some(Method::GET), "/blog/{id}", ("blog", "index", "view"), Some("blog-post"))
            .add(
                Some(Method::GET),
                "/admin/module/blog",
                ("blog", "AdminIndex", "index"),
                Some("admin-blog"),
            )
            .add(None, "/api/v1/health", ("core", "api", "health"), None)
            .add(Some(Method::GET), "/api/v1/widgets", ("core", "api", "widgets"), None)
    }

    /// Resolves a request; unmatched requests go to the not-found action.
    pub(crate) fn resolve(&self, method: &Method, path: &str) -> RouteInfo {
        let segments = split_path(path);
        match self.entries.iter().find(|e| e.matches(method, &segments)) {
            Some(entry) => {
                let route = RouteInfo::new(entry.module, entry.controller, entry.action);
                match entry.name {
                    Some(name) => route.with_matched_route(name),
                    None => route,
                }
            }
            None => RouteInfo::new("core", "error", "notFound"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_named_route() {
        let table = RouteTable::standard();
        let route = table.resolve(&Method::GET, "/blog/42");
        assert_eq!(route.module, "blog");
        assert_eq!(route.controller, "index");
        assert_eq!(route.action, "view");
        assert_eq!(route.matched_route.as_deref(), Some("blog-post"));
    }

    #[test]
    fn test_resolve_by_method() {
        let table = RouteTable::standard();
        assert_eq!(table.resolve(&Method::POST, "/blog").action, "create");
        assert_eq!(table.resolve(&Method::GET, "/blog/").action, "index");
    }

    #[test]
    fn test_resolve_admin_controller() {
        let table = RouteTable::standard();
        assert_eq!(
            table.resolve(&Method::GET, "/admin/module/blog").controller,
            "AdminIndex"
        );
    }

    #[test]
    fn test_resolve_not_found() {
        let table = RouteTable::standard();
        let route = table.resolve(&Method::GET, "/missing/page");
        assert_eq!(route.controller, "error");
        assert_eq!(route.action, "notFound");
        assert!(route.matched_route.is_none());
        assert_eq!(table.resolve(&Method::DELETE, "/blog").action, "notFound");
    }
}
