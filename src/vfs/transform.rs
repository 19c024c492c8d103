//! Base-path rewriting for served HTML.
//!
//! Uploaded apps are built assuming deployment at the domain root. When one
//! is mounted under `/mini-tools-react/{slug}/` instead, its absolute
//! `src`/`href` references must be re-anchored or every asset request would
//! miss the mount entirely.

use std::sync::OnceLock;

use regex::{Captures, Regex};

fn attr_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"(src|href)=["'](/[^"']+)["']"#).unwrap())
}

fn is_html_name(name: &str) -> bool {
    name.ends_with(".html") || name.ends_with(".htm")
}

/// Rewrites absolute `src`/`href` attribute values in HTML content so they
/// resolve under `base_path`. Non-HTML entries and an empty base pass
/// through untouched. The literal root path `/` is never rewritten:
/// prefixing it would turn top-level navigation into a self-link.
pub fn rewrite_html(name: &str, content: Vec<u8>, base_path: &str) -> Vec<u8> {
    if base_path.is_empty() || !is_html_name(name) {
        return content;
    }
    let base = base_path.strip_suffix('/').unwrap_or(base_path);
    let html = String::from_utf8_lossy(&content);
    let rewritten = attr_pattern().replace_all(&html, |caps: &Captures| {
        let (attr, path) = (&caps[1], &caps[2]);
        if path == "/" || path.starts_with(base) {
            caps[0].to_owned()
        } else {
            format!(r#"{attr}="{base}{path}""#)
        }
    });
    rewritten.into_owned().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "/mini-tools-react/demo/";

    fn rewrite(html: &str) -> String {
        String::from_utf8(rewrite_html("index.html", html.as_bytes().to_vec(), BASE)).unwrap()
    }

    #[test]
    fn prefixes_absolute_script_and_link_paths() {
        let out = rewrite(
            r#"<script src="/assets/app.js"></script><link href="/styles.css" rel="stylesheet">"#,
        );
        assert_eq!(
            out,
            r#"<script src="/mini-tools-react/demo/assets/app.js"></script><link href="/mini-tools-react/demo/styles.css" rel="stylesheet">"#
        );
    }

    #[test]
    fn single_quoted_attributes_are_rewritten_too() {
        let out = rewrite(r#"<img src='/logo.png'>"#);
        assert_eq!(out, r#"<img src="/mini-tools-react/demo/logo.png">"#);
    }

    #[test]
    fn root_link_is_left_alone() {
        let html = r#"<a href="/">home</a><img src="/">"#;
        assert_eq!(rewrite(html), html);
    }

    #[test]
    fn already_prefixed_paths_are_left_alone() {
        let html = r#"<script src="/mini-tools-react/demo/assets/app.js"></script>"#;
        assert_eq!(rewrite(html), html);
    }

    #[test]
    fn relative_paths_are_left_alone() {
        let html = r#"<script src="assets/app.js"></script><a href="./about">x</a>"#;
        assert_eq!(rewrite(html), html);
    }

    #[test]
    fn htm_extension_counts_as_html() {
        let out = rewrite_html("page.htm", br#"<a href="/a.css">"#.to_vec(), BASE);
        assert_eq!(out, br#"<a href="/mini-tools-react/demo/a.css">"#);
    }

    #[test]
    fn non_html_bytes_pass_through_unchanged() {
        let css = b"body { background: url(\"/x.png\"); }".to_vec();
        assert_eq!(rewrite_html("styles.css", css.clone(), BASE), css);
    }

    #[test]
    fn empty_base_path_is_a_no_op() {
        let html = br#"<script src="/assets/app.js"></script>"#.to_vec();
        assert_eq!(rewrite_html("index.html", html.clone(), ""), html);
    }
}
