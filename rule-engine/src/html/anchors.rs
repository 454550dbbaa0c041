//! Anchor inspection for HTML fragments.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("Invalid selector"));
static ANCHOR_WITH_HREF: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Invalid selector"));

/// Count the anchor elements in an HTML fragment.
pub fn count_anchors(html: &str) -> usize {
    let fragment = Html::parse_fragment(html);
    let count = fragment.select(&ANCHOR).count();

    debug!(count, html_length = html.len(), "Counted anchors");
    count
}

/// Extract every `href` value in document order (not deduplicated).
#[cfg(test)]
pub(crate) fn extract_hrefs(html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(html);

    fragment
        .select(&ANCHOR_WITH_HREF)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.to_string())
        .collect()
}

/// Extract the `target` attribute of every anchor (None when missing).
#[cfg(test)]
pub(crate) fn extract_targets(html: &str) -> Vec<Option<String>> {
    let fragment = Html::parse_fragment(html);

    fragment
        .select(&ANCHOR)
        .map(|a| a.value().attr("target").map(|t| t.to_string()))
        .collect()
}
