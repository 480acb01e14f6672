//! Markup partials: section title, element row and the toolbar layout.

use crate::fmt::escape_html;

use super::Headlines;

/// How an element's value is wrapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Wrap {
    Code,
    Pre,
    Plain,
}

pub(crate) fn title(text: &str) -> String {
    format!(
        "<div class=\"profiler-title\">{}</div>\n",
        escape_html(text)
    )
}

/// Element row with a text value (escaped).
pub(crate) fn element(title: &str, value: &str, wrap: Wrap) -> String {
    element_markup(title, &escape_html(value), wrap)
}

/// Element row with a value that is already markup.
pub(crate) fn element_markup(title: &str, markup: &str, wrap: Wrap) -> String {
    let value = match wrap {
        Wrap::Code => format!("<code>{}</code>", markup),
        Wrap::Pre => format!("<pre>{}</pre>", markup),
        Wrap::Plain => markup.to_string(),
    };
    format!(
        "<div class=\"profiler-element\">\n    <span class=\"profiler-element-title\">{}:</span>\n    {}\n</div>\n",
        escape_html(title),
        value
    )
}

/// Rendered bodies of the seven panels.
pub(crate) struct Panels {
    pub(crate) config: String,
    pub(crate) router: String,
    pub(crate) memory: String,
    pub(crate) time: String,
    pub(crate) files: String,
    pub(crate) sql: String,
    pub(crate) errors: String,
}

const STYLE: &str = r#"
<style>
    .eye-profiler { position: fixed; bottom: 0; left: 0; right: 0; z-index: 9999; font: 12px/1.4 monospace; background: #f4f4f4; color: #222; border-top: 1px solid #aaa; }
    .eye-profiler .profiler-toolbar { display: flex; gap: 4px; padding: 2px 6px; }
    .eye-profiler .item { cursor: pointer; padding: 2px 8px; border-radius: 3px; }
    .eye-profiler .item-good { background: #cfe8cf; }
    .eye-profiler .item-normal { background: #f3e2b3; }
    .eye-profiler .item-bad { background: #f1c0c0; }
    .eye-profiler .profiler-panel { display: none; max-height: 40vh; overflow: auto; padding: 6px 10px; border-top: 1px solid #ddd; }
    .eye-profiler .profiler-title { font-weight: bold; margin-top: 4px; }
    .eye-profiler .profiler-element-title { color: #555; }
    .eye-profiler .code, .eye-profiler code { color: #036; }
    .eye-profiler pre { margin: 0; white-space: pre-wrap; }
    .eye-profiler .profiler-footer { color: #777; padding: 2px 6px; }
</style>
"#;

const SCRIPT: &str = r#"
<script>
    (function () {
        var root = document.getElementById('eye-profiler');
        if (!root) { return; }
        root.querySelectorAll('.profiler-toolbar .item').forEach(function (item) {
            item.addEventListener('click', function () {
                var name = item.getAttribute('data-panel');
                root.querySelectorAll('.profiler-panel').forEach(function (panel) {
                    var open = panel.getAttribute('data-panel') === name && panel.style.display !== 'block';
                    panel.style.display = open ? 'block' : 'none';
                });
            });
        });
    })();
</script>
"#;

fn toolbar_item(panel: &str, class: &str, label: &str) -> String {
    format!(
        "    <a class=\"item {}\" data-panel=\"{}\">{}</a>\n",
        class,
        panel,
        escape_html(label)
    )
}

fn panel(name: &str, body: &str) -> String {
    format!(
        "<div class=\"profiler-panel\" data-panel=\"{}\">\n{}\n</div>\n",
        name, body
    )
}

/// Assembles toolbar, panels and footer into the final fragment.
pub(crate) fn layout(headlines: &Headlines, panels: &Panels, captured_at: Option<&str>) -> String {
    let mut out = String::with_capacity(
        STYLE.len()
            + SCRIPT.len()
            + panels.config.len()
            + panels.router.len()
            + panels.memory.len()
            + panels.time.len()
            + panels.files.len()
            + panels.sql.len()
            + panels.errors.len()
            + 1024,
    );
    out.push_str("<div id=\"eye-profiler\" class=\"eye-profiler\">\n");
    out.push_str(STYLE);
    out.push_str("<div class=\"profiler-toolbar\">\n");
    out.push_str(&toolbar_item("config", "", "Config"));
    out.push_str(&toolbar_item("router", "", &headlines.router));
    out.push_str(&toolbar_item(
        "memory",
        headlines.memory.severity.css_class(),
        &format!("{} kb", headlines.memory.value),
    ));
    out.push_str(&toolbar_item(
        "time",
        headlines.time.severity.css_class(),
        &format!("{} ms", headlines.time.value),
    ));
    out.push_str(&toolbar_item("files", "", &format!("{} files", headlines.files)));
    out.push_str(&toolbar_item("sql", "", &format!("{} sql", headlines.sql)));
    out.push_str(&toolbar_item(
        "errors",
        headlines.errors.severity.css_class(),
        &format!("{} errors", headlines.errors.value),
    ));
    out.push_str("</div>\n");

    out.push_str(&panel("config", &panels.config));
    out.push_str(&panel("router", &panels.router));
    out.push_str(&panel("memory", &panels.memory));
    out.push_str(&panel("time", &panels.time));
    out.push_str(&panel("files", &panels.files));
    out.push_str(&panel("sql", &panels.sql));
    out.push_str(&panel("errors", &panels.errors));

    if let Some(ts) = captured_at {
        out.push_str(&format!(
            "<div class=\"profiler-footer\">Captured {}</div>\n",
            escape_html(ts)
        ));
    }
    out.push_str(SCRIPT);
    out.push_str("</div>\n");
    out
}
