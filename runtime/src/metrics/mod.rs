//! Cover-traffic metrics: visit counters, a domain histogram, and the
//! Shannon-entropy "fog" score derived from it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// Aggregated visit statistics across all personas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metrics {
    pub total_queries: u64,
    pub unique_domains: BTreeSet<String>,
    pub entropy_score: f64,
    pub domain_visits: BTreeMap<String, u64>,
}

impl Metrics {
    /// Count one successful visit to `domain` and refresh the derived fields.
    pub fn record_visit(&mut self, domain: &str) {
        self.total_queries += 1;
        *self.domain_visits.entry(domain.to_string()).or_insert(0) += 1;
        self.unique_domains = self.domain_visits.keys().cloned().collect();
        self.entropy_score = shannon_entropy(self.domain_visits.values().copied());
    }
}

/// Shannon entropy, in bits, of the distribution implied by `counts`.
///
/// An empty (or all-zero) histogram has entropy 0.
pub fn shannon_entropy(counts: impl IntoIterator<Item = u64>) -> f64 {
    let counts: Vec<u64> = counts.into_iter().filter(|&c| c > 0).collect();
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let entropy = -counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p.log2()
        })
        .sum::<f64>();
    // A single domain yields -0.0.
    entropy.max(0.0)
}

/// Host of `url` with any leading `www.` removed.
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}
