//! Print the fog metrics.

use crate::cli::open_state;
use crate::cli::output::{self, Styled};
use crate::config::RuntimeConfig;
use crate::metrics::Metrics;
use anyhow::Result;

const TOP_DOMAINS: usize = 10;

pub async fn run() -> Result<()> {
    let state = open_state(&RuntimeConfig::from_env())?;
    let metrics = state.metrics();

    if output::is_json() {
        output::print_json(&serde_json::to_value(&metrics)?);
        return Ok(());
    }

    let s = Styled::new();
    output::print_header(&s);
    output::print_section(&s, "Fog");
    output::print_check(s.info_sym(), "Visits:", &metrics.total_queries.to_string());
    output::print_check(
        s.info_sym(),
        "Domains:",
        &metrics.unique_domains.len().to_string(),
    );
    output::print_check(
        s.info_sym(),
        "Entropy:",
        &format!("{:.2} bits", metrics.entropy_score),
    );
    eprintln!();

    let top = top_domains(&metrics, TOP_DOMAINS);
    if !top.is_empty() {
        output::print_section(&s, "Top domains");
        for (domain, count) in top {
            let share = count as f64 / metrics.total_queries.max(1) as f64;
            eprintln!(
                "    {:<28} {} {count}",
                domain,
                s.cyan(&output::share_bar(share, 20))
            );
        }
        eprintln!();
    }
    Ok(())
}

/// Most visited domains, ties broken by name.
pub fn top_domains(metrics: &Metrics, limit: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = metrics
        .domain_visits
        .iter()
        .map(|(d, c)| (d.clone(), *c))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(limit);
    entries
}
