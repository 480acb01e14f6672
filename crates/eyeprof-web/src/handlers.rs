//! HTTP request handlers: pages, health endpoint and static assets.

use axum::Extension;
use axum::Form;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Json, Response};
use rust_embed::Embed;
use serde::Deserialize;
use tracing::debug;

use eyeprof_core::error::StoreError;
use eyeprof_core::fmt::escape_html;
use eyeprof_core::gate::Viewer;
use eyeprof_core::snapshot::Category;
use eyeprof_core::widgets::WidgetMeta;

use crate::middleware::{RequestContext, RequestProfiler};
use crate::state::SharedState;
use crate::views::page;

// ============================================================
// Embedded static assets
// ============================================================

#[derive(Embed)]
#[folder = "assets"]
struct Assets;

// ============================================================
// Errors
// ============================================================

/// A blog post that does not exist.
#[derive(Debug)]
pub(crate) struct PostNotFound {
    id: u64,
    source: StoreError,
}

impl PostNotFound {
    fn new(id: u64) -> Self {
        Self {
            id,
            source: StoreError::Query(format!("no row in blog with id = {}", id)),
        }
    }
}

impl std::fmt::Display for PostNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Blog post {} not found", self.id)
    }
}

impl std::error::Error for PostNotFound {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

// ============================================================
// Health and metadata
// ============================================================

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

/// Widget metadata currently published in the registry.
pub(crate) async fn handle_widgets(State(app): State<SharedState>) -> Json<Vec<WidgetMeta>> {
    Json(app.registry.get().values().cloned().collect())
}

// ============================================================
// Pages
// ============================================================

pub(crate) async fn handle_home(
    Extension(ctx): Extension<RequestContext>,
    Extension(profiler): Extension<RequestProfiler>,
) -> Response {
    profiler.measure(Category::Controller, "IndexController", || {
        let heading = ctx.t("Home");
        page(
            StatusCode::OK,
            &heading,
            "index.html",
            &[
                ("heading", heading.as_str()),
                ("intro", "A small site running the diagnostics toolbar."),
            ],
            &ctx,
            &profiler,
        )
    })
}

pub(crate) async fn handle_blog_index(
    State(app): State<SharedState>,
    Extension(ctx): Extension<RequestContext>,
    Extension(profiler): Extension<RequestProfiler>,
) -> Response {
    profiler.measure(Category::Controller, "Blog\\IndexController", || {
        let posts: String = app
            .blog
            .find_all(&profiler)
            .iter()
            .map(|p| {
                format!(
                    "<li><a href=\"/blog/{}\">{}</a></li>\n",
                    p.id,
                    escape_html(&p.title)
                )
            })
            .collect();
        let heading = ctx.t("Latest posts");
        page(
            StatusCode::OK,
            &heading,
            "blog/index.html",
            &[("heading", heading.as_str()), ("posts", posts.as_str())],
            &ctx,
            &profiler,
        )
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewPost {
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
}

pub(crate) async fn handle_blog_create(
    State(app): State<SharedState>,
    Extension(ctx): Extension<RequestContext>,
    Extension(profiler): Extension<RequestProfiler>,
    Form(new_post): Form<NewPost>,
) -> Response {
    profiler.measure(Category::Controller, "Blog\\IndexController", || {
        let title = match new_post.title.trim() {
            "" => "Untitled",
            title => title,
        };
        let post = app.blog.insert(title, &new_post.body, &profiler);
        let id = post.id.to_string();
        page(
            StatusCode::CREATED,
            &post.title,
            "blog/created.html",
            &[("id", id.as_str()), ("title", post.title.as_str())],
            &ctx,
            &profiler,
        )
    })
}

pub(crate) async fn handle_blog_post(
    State(app): State<SharedState>,
    Extension(ctx): Extension<RequestContext>,
    Extension(profiler): Extension<RequestProfiler>,
    Path(id): Path<u64>,
) -> Response {
    profiler.measure(Category::Controller, "Blog\\IndexController", || {
        match app.blog.find(id, &profiler) {
            Some(post) => page(
                StatusCode::OK,
                &post.title,
                "blog/post.html",
                &[("title", post.title.as_str()), ("body", post.body.as_str())],
                &ctx,
                &profiler,
            ),
            None => {
                let err = PostNotFound::new(id);
                debug!(error = %err, "blog post lookup failed");
                profiler.with(|p| p.record_error_chain(&err));
                not_found_page(&format!("/blog/{}", id), &ctx, &profiler)
            }
        }
    })
}

pub(crate) async fn handle_admin_blog(
    State(app): State<SharedState>,
    Extension(viewer): Extension<Viewer>,
    Extension(ctx): Extension<RequestContext>,
    Extension(profiler): Extension<RequestProfiler>,
) -> Response {
    if !viewer.is_admin() {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    profiler.measure(Category::Controller, "Blog\\AdminIndexController", || {
        let count = app.blog.find_all(&profiler).len().to_string();
        page(
            StatusCode::OK,
            "Blog administration",
            "admin/blog.html",
            &[("count", count.as_str())],
            &ctx,
            &profiler,
        )
    })
}

fn not_found_page(path: &str, ctx: &RequestContext, profiler: &RequestProfiler) -> Response {
    let heading = ctx.t("Page not found");
    page(
        StatusCode::NOT_FOUND,
        &heading,
        "error/not_found.html",
        &[("heading", heading.as_str()), ("path", path)],
        ctx,
        profiler,
    )
}

// ============================================================
// Static assets and fallback
// ============================================================

pub(crate) async fn serve_fallback(
    uri: Uri,
    Extension(ctx): Extension<RequestContext>,
    Extension(profiler): Extension<RequestProfiler>,
) -> Response {
    let path = uri.path().trim_start_matches('/');

    if let Some(asset) = path.strip_prefix("assets/")
        && let Some(file) = Assets::get(asset)
    {
        let mime = mime_guess::from_path(asset).first_or_octet_stream();
        return (
            [(header::CONTENT_TYPE, mime.as_ref().to_owned())],
            Body::from(file.data.to_vec()),
        )
            .into_response();
    }

    profiler.measure(Category::Controller, "ErrorController", || {
        not_found_page(uri.path(), &ctx, &profiler)
    })
}
