//! Shared formatting helpers for the diagnostics report.
//!
//! All pure formatting functions (no markup layout) live here: rounding,
//! unit conversion, capitalization, path shortening, escaping and
//! whitespace normalization.

use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Round `value` to `places` decimal digits.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Format a rounded value without trailing zeros: `12.5`, `3`, `0.0042`.
///
/// Negative zero is printed as `0`.
pub fn format_decimal(value: f64, places: i32) -> String {
    let rounded = round_to(value, places);
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{}", rounded)
}

/// Format bytes as `"<kb> kb"`.
pub fn format_kb(bytes: u64) -> String {
    format!("{} kb", format_decimal(bytes as f64 / 1024.0, 2))
}

/// Format seconds as milliseconds with the given precision: `"1.25 ms"`.
pub fn format_secs_as_ms(secs: f64, places: i32) -> String {
    format!("{} ms", format_decimal(secs * 1000.0, places))
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Uppercase the first character, leave the rest untouched.
pub fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Remove every occurrence of the application root from a path.
pub fn strip_root(path: &str, root: &str) -> String {
    if root.is_empty() {
        path.to_string()
    } else {
        path.replace(root, "")
    }
}

/// Escape text for interpolation into HTML element content or attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Collapse every run of whitespace into a single space and trim the ends.
///
/// Applying it twice yields the same text as applying it once.
pub fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.trim().chars() {
        if ch.is_whitespace() {
            if !prev_space {
                result.push(' ');
            }
            prev_space = true;
        } else {
            result.push(ch);
            prev_space = false;
        }
    }
    result
}

/// Format request parameters as one `key => value` line each.
pub fn format_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{} => {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_decimal_drops_trailing_zeros() {
        assert_eq!(format_decimal(12.5, 2), "12.5");
        assert_eq!(format_decimal(3.0, 2), "3");
        assert_eq!(format_decimal(1.23456, 4), "1.2346");
        assert_eq!(format_decimal(-0.001, 2), "0");
    }

    #[test]
    fn test_format_kb() {
        assert_eq!(format_kb(2048), "2 kb");
        assert_eq!(format_kb(1536), "1.5 kb");
        assert_eq!(format_kb(1000), "0.98 kb");
    }

    #[test]
    fn test_format_secs_as_ms() {
        assert_eq!(format_secs_as_ms(0.0125, 4), "12.5 ms");
        assert_eq!(format_secs_as_ms(0.000_012_34, 4), "0.0123 ms");
    }

    #[test]
    fn test_ucfirst() {
        assert_eq!(ucfirst("application"), "Application");
        assert_eq!(ucfirst("Index"), "Index");
        assert_eq!(ucfirst(""), "");
        assert_eq!(ucfirst("élan"), "Élan");
    }

    #[test]
    fn test_strip_root() {
        assert_eq!(strip_root("/srv/app/views/index.html", "/srv/app"), "/views/index.html");
        assert_eq!(strip_root("/srv/app/x", ""), "/srv/app/x");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b\nc  "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_collapse_whitespace_idempotent() {
        let raw = "<div>\n    <b>Title</b>\t\t<span> x  y </span>\n</div>\n";
        let once = collapse_whitespace(raw);
        assert_eq!(collapse_whitespace(&once), once);
    }

    #[test]
    fn test_format_params() {
        let mut params = BTreeMap::new();
        params.insert("page".to_string(), "2".to_string());
        params.insert("q".to_string(), "rust".to_string());
        assert_eq!(format_params(&params), "page => 2\nq => rust");
        assert_eq!(format_params(&BTreeMap::new()), "");
    }
}
