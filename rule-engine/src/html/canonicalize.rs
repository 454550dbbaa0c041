//! Content canonicalization: the exact bytes injected by each rule.
//!
//! Every function here is pure. Identical input always yields byte-identical
//! output, which keeps markers and re-synthesis reproducible.
//!
//! ## Pipeline
//!
//! ```text
//! banner:    rewrite_tracking_links → wrap(Banner) → inject_marker
//! signature: wrap(Signature) → inject_marker
//! emission:  escape
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use super::anchors::count_anchors;

/// Kind of injected content, which selects the wrapper container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Signature,
    Banner,
}

const SIGNATURE_WRAPPER_OPEN: &str =
    r#"<div style="margin-top:20px;padding-top:12px;border-top:1px solid #e0e0e0;">"#;
const BANNER_WRAPPER_OPEN: &str = r#"<div style="margin-bottom:20px;">"#;
const WRAPPER_CLOSE: &str = "</div>";

const MARKER_SPAN_OPEN: &str = r#"<span style="display:none;font-size:0;line-height:0;max-height:0;height:0;width:0;opacity:0;overflow:hidden;mso-hide:all;">"#;
const MARKER_SPAN_CLOSE: &str = "</span>";

const LINK_WRAPPER_STYLE: &str = "display:block;text-decoration:none;color:inherit;";

// Quoted attribute values may contain `>`.
static ANCHOR_OPEN_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<a\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("Invalid regex")
});
static HREF_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(\s)href\s*=\s*(?:"[^"]*"|'[^']*')"#).expect("Invalid regex")
});
static TARGET_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\starget\s*=").expect("Invalid regex"));

/// Wrap content in its presentational container.
pub fn wrap(kind: ContentKind, html: &str) -> String {
    let open = match kind {
        ContentKind::Signature => SIGNATURE_WRAPPER_OPEN,
        ContentKind::Banner => BANNER_WRAPPER_OPEN,
    };
    format!("{open}{html}{WRAPPER_CLOSE}")
}

/// Hidden span carrying a marker token as plain text.
pub fn marker_span(marker: &str) -> String {
    format!("{MARKER_SPAN_OPEN}{marker}{MARKER_SPAN_CLOSE}")
}

/// Insert the marker span as the first child of the wrapper.
///
/// Fragments without one of our wrappers get the span prepended.
pub fn inject_marker(html: &str, marker: &str) -> String {
    let span = marker_span(marker);

    for open in [SIGNATURE_WRAPPER_OPEN, BANNER_WRAPPER_OPEN] {
        if let Some(rest) = html.strip_prefix(open) {
            return format!("{open}{span}{rest}");
        }
    }

    format!("{span}{html}")
}

/// Point every anchor at `tracking_url`, or make the whole fragment a link.
///
/// Quoted `href` attributes are replaced and anchors without a `target` get
/// `target="_blank"`. A fragment with no anchor is wrapped in a single
/// block-level anchor.
pub fn rewrite_tracking_links(html: &str, tracking_url: &str) -> String {
    let url = tracking_url.replace('"', "%22");
    let anchors = count_anchors(html);

    if anchors == 0 {
        debug!(html_length = html.len(), "tracking_link_wrapped");
        return format!(
            r#"<a href="{url}" target="_blank" style="{LINK_WRAPPER_STYLE}">{html}</a>"#
        );
    }

    let rewritten = ANCHOR_OPEN_TAG.replace_all(html, |caps: &Captures| {
        let tag = HREF_ATTR.replace_all(&caps[0], |attr: &Captures| {
            format!(r#"{}href="{}""#, &attr[1], url)
        });

        if TARGET_ATTR.is_match(&tag) {
            tag.into_owned()
        } else {
            add_blank_target(&tag)
        }
    });

    debug!(anchors, html_length = html.len(), "tracking_links_rewritten");
    rewritten.into_owned()
}

fn add_blank_target(tag: &str) -> String {
    let cut = if tag.ends_with("/>") {
        tag.len() - 2
    } else {
        tag.len() - 1
    };
    format!(r#"{} target="_blank"{}"#, tag[..cut].trim_end(), &tag[cut..])
}

/// Characters PowerShell accepts as single-quote delimiters.
const SINGLE_QUOTES: [char; 5] = ['\'', '\u{2018}', '\u{2019}', '\u{201A}', '\u{201B}'];

/// Escape for a single-quoted literal by doubling every single-quote character.
pub fn escape(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    for c in html.chars() {
        if SINGLE_QUOTES.contains(&c) {
            out.push(c);
        }
        out.push(c);
    }
    out
}

/// Render a signature exactly as the rule injects it.
pub fn render_signature(signature_html: &str, marker: &str) -> String {
    inject_marker(&wrap(ContentKind::Signature, signature_html), marker)
}

/// Render a banner exactly as the rule injects it.
pub fn render_banner(banner_html: &str, tracking_url: Option<&str>, marker: &str) -> String {
    let linked = match tracking_url {
        Some(url) => rewrite_tracking_links(banner_html, url),
        None => banner_html.to_string(),
    };
    inject_marker(&wrap(ContentKind::Banner, &linked), marker)
}
