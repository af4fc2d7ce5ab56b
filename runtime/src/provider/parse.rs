//! Validating parser for generator output.
//!
//! The generator is asked for a JSON array of `{site, topic}` objects but
//! answers in free text. Anything that does not fit that shape is dropped;
//! parsing never fails, it only yields fewer targets.

use super::catalog::find_site;
use super::BrowseTarget;
use serde::Deserialize;
use tracing::debug;

/// Upper bound on targets taken from one response.
pub const MAX_TARGETS: usize = 8;

#[derive(Debug, Deserialize)]
struct RawTarget {
    site: String,
    topic: String,
}

/// Extract browse targets from a generator response.
pub fn parse_targets(text: &str) -> Vec<BrowseTarget> {
    let Some(json) = extract_json_array(text) else {
        debug!("generator response contained no JSON array");
        return Vec::new();
    };

    let items: Vec<serde_json::Value> = match serde_json::from_str(json) {
        Ok(items) => items,
        Err(e) => {
            debug!("generator response was not a JSON array: {e}");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawTarget>(item).ok())
        .filter(|raw| !raw.topic.trim().is_empty())
        .filter_map(|raw| {
            let Some(site) = find_site(&raw.site) else {
                debug!("dropping unknown site '{}'", raw.site);
                return None;
            };
            let url = site.resolve(&raw.topic)?;
            Some(BrowseTarget {
                site: site.name.to_string(),
                url,
                topic: raw.topic.trim().to_string(),
            })
        })
        .take(MAX_TARGETS)
        .collect()
}

/// The outermost `[...]` span, which skips code fences and chatter.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}
