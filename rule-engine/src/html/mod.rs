//! HTML handling for injected content.

pub mod anchors;
pub mod canonicalize;

pub use anchors::count_anchors;
#[cfg(test)]
pub(crate) use anchors::extract_hrefs;
pub use canonicalize::{
    escape, inject_marker, render_banner, render_signature, rewrite_tracking_links, wrap,
    ContentKind,
};
