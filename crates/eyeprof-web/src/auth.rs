//! Viewer identification (Basic Auth) and access logging middleware.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use tracing::{debug, info, warn};

use eyeprof_core::gate::{Role, Viewer};

// ============================================================
// User table
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UserEntry {
    pub(crate) password: String,
    pub(crate) viewer: Viewer,
}

/// Accounts accepted by [`basic_auth_middleware`], keyed by name.
#[derive(Debug, Default)]
pub(crate) struct UserTable {
    users: HashMap<String, UserEntry>,
}

impl UserTable {
    /// Parses `name:password[:role]` entries. Ids are assigned in order from 1.
    pub(crate) fn from_entries(entries: &[String]) -> Result<Self, String> {
        let mut users = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            let mut parts = entry.splitn(3, ':');
            let name = parts.next().unwrap_or_default();
            let Some(password) = parts.next() else {
                return Err(format!("user entry '{}' must be name:password[:role]", name));
            };
            if name.is_empty() {
                return Err("user name must not be empty".to_string());
            }
            let role: Role = match parts.next() {
                Some(role) => role.parse()?,
                None => Role::User,
            };
            users.insert(
                name.to_string(),
                UserEntry {
                    password: password.to_string(),
                    viewer: Viewer::new(i as u64 + 1, name, role),
                },
            );
        }
        Ok(Self { users })
    }

    pub(crate) fn len(&self) -> usize {
        self.users.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub(crate) fn authenticate(&self, name: &str, password: &str) -> Option<&Viewer> {
        self.users
            .get(name)
            .filter(|entry| entry.password == password)
            .map(|entry| &entry.viewer)
    }
}

/// Splits a `Basic <base64(name:password)>` header value.
pub(crate) fn decode_basic(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_owned(), pass.to_owned()))
}

// ============================================================
// Basic Auth middleware
// ============================================================

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"eyeprof\"")],
        Body::from("Unauthorized"),
    )
        .into_response()
}

/// Inserts the request's [`Viewer`]. Requests without credentials are
/// anonymous; requests with bad credentials are rejected.
pub(crate) async fn basic_auth_middleware(
    State(users): State<Arc<UserTable>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_owned();

    let viewer = match req.headers().get(header::AUTHORIZATION) {
        None => Viewer::anonymous(),
        Some(value) => {
            let Some((user, pass)) = value.to_str().ok().and_then(decode_basic) else {
                warn!(path = %path, "auth failed: malformed authorization header");
                return unauthorized();
            };
            match users.authenticate(&user, &pass) {
                Some(viewer) => {
                    debug!(user = %user, role = ?viewer.role, path = %path, "authenticated");
                    viewer.clone()
                }
                None => {
                    warn!(user = %user, path = %path, "auth failed: invalid credentials");
                    return unauthorized();
                }
            }
        }
    };

    req.extensions_mut().insert(viewer);
    next.run(req).await
}

// ============================================================
// Access log layer (tower Layer + Service)
// ============================================================

/// What the access log prints about one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AccessEntry {
    method: Method,
    path: String,
    client: String,
    user: String,
}

impl AccessEntry {
    /// Reads the peer address and the authenticated viewer, `-` when unknown.
    pub(crate) fn from_request(req: &Request) -> Self {
        let ext = req.extensions();
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_owned(),
            client: ext
                .get::<ConnectInfo<SocketAddr>>()
                .map_or_else(|| "-".to_owned(), |ci| ci.0.ip().to_string()),
            user: ext
                .get::<Viewer>()
                .filter(|v| v.is_authenticated())
                .map_or_else(|| "-".to_owned(), |v| v.name.clone()),
        }
    }

    /// Static assets are served too often to be worth a line each.
    pub(crate) fn is_quiet(&self) -> bool {
        self.path.starts_with("/assets/") || self.path == "/favicon.ico"
    }

    fn log(&self, status: StatusCode, latency: Duration) {
        if self.is_quiet() {
            return;
        }
        info!(
            client = %self.client,
            user = %self.user,
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            "{} {}",
            self.method,
            self.path
        );
    }
}

#[derive(Clone)]
pub(crate) struct AccessLogLayer;

impl<S> tower::Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;
    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService { inner }
    }
}

#[derive(Clone)]
pub(crate) struct AccessLogService<S> {
    inner: S,
}

impl<S> tower::Service<Request> for AccessLogService<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let entry = AccessEntry::from_request(&req);
        let started = Instant::now();
        let mut inner = self.inner.clone();
        Box::pin(async move {
            let response = inner.call(req).await?;
            entry.log(response.status(), started.elapsed());
            Ok(response)
        })
    }
}
