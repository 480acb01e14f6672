//! Per-request diagnostics: bootstrap, profiler lifecycle and report injection.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use axum::body::{Body, HttpBody};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, info, warn};

use eyeprof_core::gate::Viewer;
use eyeprof_core::profiler::Profiler;
use eyeprof_core::report::Reporter;
use eyeprof_core::session::{LOCALE_KEY, Session};
use eyeprof_core::snapshot::{Category, DiagnosticsSnapshot};
use eyeprof_core::translate::Translator;
use eyeprof_core::widgets::WidgetMap;

use crate::state::SharedState;

/// Largest form body copied into the report. Matches axum's default body
/// limit, so the `Form` extractor rejects anything larger on its own.
const MAX_FORM_BYTES: usize = 2 * 1024 * 1024;

/// Largest HTML response buffered for report injection. Larger pages are
/// sent without a report.
const MAX_PAGE_BYTES: usize = 16 * 1024 * 1024;

// ============================================================
// Request extensions
// ============================================================

/// The request's profiler; empty when diagnostics are not collected.
#[derive(Clone, Default)]
pub(crate) struct RequestProfiler(Option<Arc<Mutex<Profiler>>>);

impl RequestProfiler {
    fn new(profiler: Option<Profiler>) -> Self {
        Self(profiler.map(|p| Arc::new(Mutex::new(p))))
    }

    #[cfg(test)]
    pub(crate) fn for_test() -> Self {
        Self::new(Some(Profiler::new(
            Instant::now(),
            Arc::new(eyeprof_core::memory::FixedMemoryReader::new(0)),
        )))
    }

    /// Runs `f` against the profiler, if there is one.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut Profiler) -> R) -> Option<R> {
        self.0
            .as_ref()
            .map(|p| f(&mut p.lock().unwrap_or_else(PoisonError::into_inner)))
    }

    /// Times `f` as `resource` within `category`.
    pub(crate) fn measure<R>(
        &self,
        category: Category,
        resource: &str,
        f: impl FnOnce() -> R,
    ) -> R {
        let span = self.with(|p| p.start(category, resource));
        let out = f();
        if let Some(span) = span {
            self.with(|p| p.finish(span));
        }
        out
    }

    /// Times `f` as one persistence statement.
    pub(crate) fn query<R>(&self, statement: &str, f: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let out = f();
        self.with(|p| p.queries().record(statement, started.elapsed()));
        out
    }
}

/// Services the bootstrap wired for this request.
#[derive(Clone)]
pub(crate) struct RequestContext {
    pub(crate) locale: String,
    pub(crate) translator: Arc<dyn Translator>,
    pub(crate) widgets: Option<Arc<WidgetMap>>,
}

impl RequestContext {
    pub(crate) fn t(&self, key: &str) -> String {
        self.translator.query(key, &[])
    }
}

// ============================================================
// Parsing helpers
// ============================================================

/// Session values carried in the `locale` cookie.
pub(crate) fn session_from_headers(headers: &HeaderMap) -> Session {
    let mut session = Session::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(s) = value.to_str() else {
            continue;
        };
        for part in s.split(';') {
            if let Some((name, value)) = part.trim().split_once('=')
                && name == LOCALE_KEY
            {
                session.insert(LOCALE_KEY, value);
            }
        }
    }
    session
}

pub(crate) fn parse_params(raw: &[u8]) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(raw).into_owned().collect()
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

pub(crate) fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"))
}

/// Whether `body` is known to be at most `limit` bytes long.
pub(crate) fn fits(body: &Body, limit: usize) -> bool {
    body.size_hint().upper().is_some_and(|n| n <= limit as u64)
}

// ============================================================
// Middleware
// ============================================================

pub(crate) async fn diagnostics_middleware(
    State(app): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let viewer = req
        .extensions()
        .get::<Viewer>()
        .cloned()
        .unwrap_or_else(Viewer::anonymous);
    let session = session_from_headers(req.headers());

    let services = match app.bootstrap(&session, &viewer) {
        Ok(services) => services,
        Err(e) => {
            error!(error = %e, "module bootstrap failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "bootstrap failed").into_response();
        }
    };
    req.extensions_mut().insert(RequestContext {
        locale: services.locale,
        translator: services.translator,
        widgets: services.widgets,
    });

    let mut route = app.routes.resolve(req.method(), req.uri().path());
    let decision = app
        .gate
        .decide(services.collect_diagnostics, &route.controller, &viewer);
    if !decision.allows() {
        debug!(?decision, controller = %route.controller, "diagnostics not collected");
        req.extensions_mut().insert(RequestProfiler::default());
        return next.run(req).await;
    }

    if let Some(query) = req.uri().query() {
        route.query = parse_params(query.as_bytes());
    }
    let (parts, body) = req.into_parts();
    let body = if is_form(&parts.headers) && fits(&body, MAX_FORM_BYTES) {
        match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
            Ok(bytes) => {
                route.form = parse_params(&bytes);
                Body::from(bytes)
            }
            Err(e) => {
                warn!(error = %e, "failed to read form body");
                return (StatusCode::BAD_REQUEST, "failed to read request body").into_response();
            }
        }
    } else {
        body
    };
    let mut req = Request::from_parts(parts, body);

    let profiler = RequestProfiler::new(Some(Profiler::new(started, Arc::clone(&app.memory))));
    req.extensions_mut().insert(profiler.clone());

    let response = next.run(req).await;
    if !is_html(response.headers()) {
        return response;
    }
    if !fits(response.body(), MAX_PAGE_BYTES) {
        debug!(controller = %route.controller, "response too large for a diagnostics report");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let page = match axum::body::to_bytes(body, MAX_PAGE_BYTES).await {
        Ok(page) => page,
        Err(e) => {
            error!(error = %e, "failed to buffer response body");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to read response body")
                .into_response();
        }
    };

    let mut out = page.to_vec();
    let reported = profiler
        .with(|p| {
            let reporter = Reporter::new(&app.gate, &app.config, &viewer, &route, Some(&*p));
            let snapshot = reporter.reportable()?;
            if let Err(e) = reporter.write_snapshot(&snapshot, &mut out) {
                warn!(error = %e, "failed to append diagnostics report");
            }
            Some(snapshot)
        })
        .flatten();

    if let (Some(dir), Some(snapshot)) = (&app.capture_dir, reported) {
        capture(dir.clone(), snapshot).await;
    }

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(out))
}

/// Saves a reported snapshot for later rendering with `eyeprof-dump`.
async fn capture(dir: PathBuf, snapshot: DiagnosticsSnapshot) {
    match tokio::task::spawn_blocking(move || snapshot.save_to_dir(&dir)).await {
        Ok(Ok(path)) => info!(path = %path.display(), "diagnostics snapshot captured"),
        Ok(Err(e)) => warn!(error = %e, "failed to capture diagnostics snapshot"),
        Err(e) => warn!(error = %e, "snapshot capture task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; locale=de"),
        );
        assert_eq!(session_from_headers(&headers).locale(), Some("de"));
        assert_eq!(session_from_headers(&HeaderMap::new()).locale(), None);
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params(b"title=Hello+world&tag=a%26b");
        assert_eq!(params["title"], "Hello world");
        assert_eq!(params["tag"], "a&b");
    }

    #[test]
    fn test_is_html() {
        let mut headers = HeaderMap::new();
        assert!(!is_html(&headers));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        assert!(is_html(&headers));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/css"));
        assert!(!is_html(&headers));
    }

    #[test]
    fn test_fits_uses_exact_body_length() {
        assert!(fits(&Body::from(vec![b'x'; 10]), 10));
        assert!(!fits(&Body::from(vec![b'x'; 11]), 10));
        assert!(fits(&Body::empty(), 0));
    }

    #[test]
    fn test_measure_without_profiler_runs_closure() {
        let profiler = RequestProfiler::default();
        assert_eq!(profiler.measure(Category::View, "index", || 7), 7);
        assert!(profiler.with(|_| ()).is_none());
    }

    #[test]
    fn test_measure_records_sample() {
        let profiler = RequestProfiler::for_test();
        profiler.measure(Category::Controller, "IndexController", || ());
        let recorded = profiler
            .with(|p| p.time_samples()[&Category::Controller][0].resource.clone())
            .unwrap();
        assert_eq!(recorded, "IndexController");
    }
}
