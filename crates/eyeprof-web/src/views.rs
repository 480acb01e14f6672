//! Embedded page templates.
//!
//! Templates use `{{name}}` placeholders. Values are escaped unless the
//! placeholder is `{{{name}}}`, which inserts markup verbatim. Every template
//! rendered is recorded as a loaded file and timed under the view category.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;
use tracing::error;

use eyeprof_core::fmt::escape_html;
use eyeprof_core::snapshot::Category;

use crate::middleware::{RequestContext, RequestProfiler};

#[derive(Embed)]
#[folder = "views"]
struct Templates;

/// Path a template is reported under.
fn template_path(name: &str) -> String {
    format!("{}/views/{}", env!("CARGO_MANIFEST_DIR"), name)
}

pub(crate) fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{{{{{}}}}}}}", name), value);
        out = out.replace(&format!("{{{{{}}}}}", name), &escape_html(value));
    }
    out
}

/// Renders one template, or `None` if it is not embedded.
pub(crate) fn render(name: &str, vars: &[(&str, &str)], profiler: &RequestProfiler) -> Option<String> {
    let file = Templates::get(name)?;
    profiler.with(|p| p.record_file(template_path(name), file.data.len() as u64));
    let text = String::from_utf8_lossy(&file.data);
    Some(profiler.measure(Category::View, &template_path(name), || substitute(&text, vars)))
}

/// Renders `name` inside the site layout as an HTML response.
pub(crate) fn page(
    status: StatusCode,
    title: &str,
    name: &str,
    vars: &[(&str, &str)],
    ctx: &RequestContext,
    profiler: &RequestProfiler,
) -> Response {
    let Some(content) = render(name, vars, profiler) else {
        error!(template = name, "template not embedded");
        return (StatusCode::INTERNAL_SERVER_ERROR, "template missing").into_response();
    };
    let widgets = ctx.widgets.as_ref().map_or(0, |w| w.len()).to_string();
    let home = ctx.t("Home");
    let layout_vars = [
        ("title", title),
        ("locale", ctx.locale.as_str()),
        ("home", home.as_str()),
        ("widgets", widgets.as_str()),
        ("content", content.as_str()),
    ];
    let Some(html) = render("layout.html", &layout_vars, profiler) else {
        error!(template = "layout.html", "template not embedded");
        return (StatusCode::INTERNAL_SERVER_ERROR, "template missing").into_response();
    };
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response()
}
