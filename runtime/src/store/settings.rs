//! User settings shared by the runner, scheduler and provider.

use serde::{Deserialize, Serialize};

/// Domains browsed by default. Empty would mean unrestricted.
pub const DEFAULT_SAFE_LIST: &[&str] = &[
    "wikipedia.org",
    "allrecipes.com",
    "bbc.com",
    "cnn.com",
    "medium.com",
    "amazon.com",
    "youtube.com",
    "reuters.com",
    "apnews.com",
    "npr.org",
    "pbs.org",
    "simplyrecipes.com",
    "budgetbytes.com",
    "seriouseats.com",
    "britannica.com",
    "howstuffworks.com",
    "wikihow.com",
    "instructables.com",
    "archive.org",
    "imdb.com",
    "dev.to",
    "duckduckgo.com",
    "weather.gov",
    "goodreads.com",
    "craigslist.org",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Credential for the text-generation service.
    pub api_key: String,
    /// Allowed domain substrings; empty means any domain.
    pub safe_list: Vec<String>,
    /// Forces every session off and blocks scheduled starts.
    pub kill_switch: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            safe_list: DEFAULT_SAFE_LIST.iter().map(|s| s.to_string()).collect(),
            kill_switch: false,
        }
    }
}

impl Settings {
    /// Whether `domain` may be visited under the safe list.
    pub fn allows(&self, domain: &str) -> bool {
        self.safe_list.is_empty()
            || self
                .safe_list
                .iter()
                .filter(|entry| !entry.trim().is_empty())
                .any(|entry| domain.contains(entry.trim()))
    }
}
