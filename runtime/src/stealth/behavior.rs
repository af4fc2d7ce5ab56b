//! Human-like behavior simulation.
//!
//! A reading pass scrolls through the page in uneven steps with pauses, and
//! sometimes gives up early. Link following picks one same-site link, never
//! one that leads into a login or signup flow.

use super::random::RandomSource;
use crate::metrics::extract_domain;
use crate::persona::{DelayRange, IntensityProfile};
use crate::renderer::{RenderContext, RenderError};
use crate::store::Settings;
use std::time::Duration;
use url::{Position, Url};

/// Scroll step bounds in pixels.
pub const SCROLL_STEP_MIN: u64 = 100;
pub const SCROLL_STEP_MAX: u64 = 400;

/// Anchors sampled per page when looking for a link to follow.
pub const LINK_SAMPLE: usize = 30;

const PAGE_HEIGHT_SCRIPT: &str = "document.body ? document.body.scrollHeight : 0";

/// Path fragments that suggest authentication or account flows.
const AUTH_PATH_MARKERS: &[&str] = &[
    "login", "signin", "sign-in", "signup", "sign-up", "register", "logout", "auth", "oauth",
    "account", "password",
];

/// Generate a random delay within `range`.
pub fn random_delay(rng: &dyn RandomSource, range: DelayRange) -> Duration {
    Duration::from_millis(rng.range_u64(range.min_ms, range.max_ms))
}

/// Sleep for a random delay within `range`.
pub async fn sleep_random(rng: &dyn RandomSource, range: DelayRange) {
    tokio::time::sleep(random_delay(rng, range)).await;
}

/// How a reading pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingReport {
    pub steps: u32,
    pub reached_bottom: bool,
}

/// Scroll through the current page like a reader.
///
/// Each step advances 100–400 px, pauses for the profile's scroll pause,
/// then leaves early with the profile's stop chance. The pass also ends at
/// the bottom of the page or as soon as the page dies.
pub async fn simulate_reading(
    context: &dyn RenderContext,
    profile: &IntensityProfile,
    rng: &dyn RandomSource,
) -> Result<ReadingReport, RenderError> {
    let height = context
        .execute_js(PAGE_HEIGHT_SCRIPT)
        .await?
        .as_f64()
        .unwrap_or(0.0)
        .max(0.0) as u64;

    let mut position = 0u64;
    let mut steps = 0u32;
    while position < height {
        if !context.is_alive() {
            break;
        }
        position += rng.range_u64(SCROLL_STEP_MIN, SCROLL_STEP_MAX);
        context
            .execute_js(&format!("window.scrollTo(0, {position})"))
            .await?;
        steps += 1;

        sleep_random(rng, profile.scroll_pause).await;

        if rng.chance(profile.stop_chance) {
            return Ok(ReadingReport {
                steps,
                reached_bottom: false,
            });
        }
    }

    Ok(ReadingReport {
        steps,
        reached_bottom: position >= height,
    })
}

/// Whether a URL path (and query) looks like an authentication or account flow.
pub fn looks_like_auth_path(path: &str) -> bool {
    let path = path.to_lowercase();
    AUTH_PATH_MARKERS.iter().any(|marker| path.contains(marker))
}

/// Keep hrefs that are safe to follow from a page on `domain`.
pub fn filter_follow_candidates(hrefs: &[String], domain: &str, settings: &Settings) -> Vec<String> {
    hrefs
        .iter()
        .take(LINK_SAMPLE)
        .filter(|href| {
            let Ok(url) = Url::parse(href) else {
                return false;
            };
            if !matches!(url.scheme(), "http" | "https") {
                return false;
            }
            let Some(host) = url.host_str() else {
                return false;
            };
            if !host.to_lowercase().contains(domain)
                || looks_like_auth_path(&url[Position::BeforePath..])
            {
                return false;
            }
            extract_domain(href).is_some_and(|d| settings.allows(&d))
        })
        .cloned()
        .collect()
}

/// Sample the page's anchors and return followable same-site links.
pub async fn collect_follow_candidates(
    context: &dyn RenderContext,
    domain: &str,
    settings: &Settings,
) -> Result<Vec<String>, RenderError> {
    let script = format!(
        "Array.from(document.querySelectorAll('a[href]')).slice(0, {LINK_SAMPLE}).map(a => a.href)"
    );
    let value = context.execute_js(&script).await?;
    let hrefs: Vec<String> = value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    Ok(filter_follow_candidates(&hrefs, domain, settings))
}

/// Pick one candidate uniformly.
pub fn pick_link<'a>(candidates: &'a [String], rng: &dyn RandomSource) -> Option<&'a String> {
    if candidates.is_empty() {
        return None;
    }
    candidates.get(rng.pick_index(candidates.len()))
}
