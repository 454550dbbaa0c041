//! Click-tracking URL construction.
//!
//! The redirect endpoint itself lives outside this crate; only the URL that
//! banner anchors point at is built here.

use tracing::warn;
use url::Url;

use super::grouping::{ContentGroup, GroupingStrategy};

/// Build the URL banner clicks should go to, if the group has a click URL.
///
/// Without a configured endpoint the click URL is used directly. With one,
/// the endpoint receives `banner_id` and, under per-principal grouping, the
/// member address.
pub fn tracking_url(
    endpoint: Option<&str>,
    group: &ContentGroup,
    strategy: GroupingStrategy,
) -> Option<String> {
    let click_url = group.banner_click_url()?;

    let Some(endpoint) = endpoint else {
        return Some(click_url.to_string());
    };

    let Some(banner_id) = group.banner_id() else {
        warn!(
            user_id = %group.representative().user_id,
            "tracking_without_banner_id"
        );
        return Some(click_url.to_string());
    };

    let mut url = match Url::parse(endpoint) {
        Ok(url) => url,
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "tracking_endpoint_invalid");
            return Some(click_url.to_string());
        }
    };

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("banner_id", banner_id);
        if strategy == GroupingStrategy::PerPrincipal {
            query.append_pair("email", &group.representative().email);
        }
    }

    Some(url.into())
}
