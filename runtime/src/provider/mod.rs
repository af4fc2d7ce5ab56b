//! Target provider: turns a persona's interests into browse targets.
//!
//! Targets come from the text-generation service when it is available.
//! Every failure mode (no credential, rate limit, bad output, transport
//! error) yields an empty list, and the runner falls back to the static
//! catalog.

pub mod catalog;
pub mod gate;
pub mod generator;
pub mod parse;

use crate::store::SharedState;
use gate::RateLimitGate;
use generator::{GenerationError, TextGenerator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One page to visit, consumed once by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseTarget {
    /// Catalog site name, or `fallback`.
    pub site: String,
    pub url: String,
    /// What the visit is "about", for logs and activity details.
    pub topic: String,
}

pub struct TargetProvider {
    generator: Arc<dyn TextGenerator>,
    state: SharedState,
    gate: RateLimitGate,
}

impl TargetProvider {
    pub fn new(generator: Arc<dyn TextGenerator>, state: SharedState) -> Self {
        Self {
            generator,
            state,
            gate: RateLimitGate::new(),
        }
    }

    /// Ask the generator for targets matching `interests`.
    ///
    /// The result is advisory and may be empty.
    pub async fn generate_targets(&self, interests: &[String]) -> Vec<BrowseTarget> {
        if let Some(wait) = self.gate.remaining() {
            debug!(
                "generation rate limited, {}s until next request",
                wait.as_secs().max(1)
            );
            return Vec::new();
        }

        let Some(credential) = self.state.api_key() else {
            debug!("no generation credential configured");
            return Vec::new();
        };

        let prompt = build_prompt(interests);
        match self.generator.generate(&credential, &prompt).await {
            Ok(text) => {
                let targets = parse::parse_targets(&text);
                debug!(count = targets.len(), "generated browse targets");
                targets
            }
            Err(GenerationError::RateLimited {
                message,
                retry_after,
            }) => {
                let backoff = gate::backoff_for(&message, retry_after);
                self.gate.trip(backoff);
                info!("generation rate limited, backing off for {}s", backoff.as_secs());
                Vec::new()
            }
            Err(e) => {
                warn!("target generation failed: {e}");
                Vec::new()
            }
        }
    }

    /// Time until the rate-limit gate reopens, if it is closed.
    pub fn rate_limited_for(&self) -> Option<std::time::Duration> {
        self.gate.remaining()
    }
}

/// Prompt listing the interests and the closed site catalog.
pub fn build_prompt(interests: &[String]) -> String {
    let interests = if interests.is_empty() {
        "everyday news and general knowledge".to_string()
    } else {
        interests.join(", ")
    };

    let sites: String = catalog::SITE_CATALOG
        .iter()
        .map(|site| format!("- {}: {}\n", site.name, site.hint))
        .collect();

    format!(
        "You plan casual web browsing for someone interested in: {interests}.\n\
         Pick 3 to 5 things they might read today, each on one of these sites:\n\
         {sites}\n\
         Vary the sites and keep topics natural and specific.\n\
         Respond with only a JSON array of objects with string fields \"site\" and \"topic\", \
         for example [{{\"site\": \"wikipedia\", \"topic\": \"Tidal locking\"}}]."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned responses and counts calls.
    struct ScriptedGenerator {
        responses: Mutex<Vec<Result<String, GenerationError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<String, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _credential: &str, _prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok("[]".to_string())
            } else {
                responses.remove(0)
            }
        }
    }

    fn state_with_key() -> SharedState {
        let state = SharedState::in_memory().unwrap();
        state.update_settings(|s| s.api_key = "k".into()).unwrap();
        state
    }

    fn rate_limited(message: &str) -> Result<String, GenerationError> {
        Err(GenerationError::RateLimited {
            message: message.to_string(),
            retry_after: None,
        })
    }

    #[tokio::test]
    async fn test_targets_from_generator() {
        let generator = ScriptedGenerator::new(vec![Ok(
            r#"[{"site":"goodreads","topic":"Dune"}]"#.to_string()
        )]);
        let provider = TargetProvider::new(generator.clone(), state_with_key());
        let targets = provider.generate_targets(&["sci-fi".into()]).await;
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].url, "https://www.goodreads.com/search?q=Dune");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_circuit_breaker() {
        let generator = ScriptedGenerator::new(vec![
            rate_limited("Please retry in 10s"),
            Ok(r#"[{"site":"bbc","topic":"weather"}]"#.to_string()),
        ]);
        let provider = TargetProvider::new(generator.clone(), state_with_key());

        assert!(provider.generate_targets(&[]).await.is_empty());
        assert_eq!(generator.calls(), 1);
        assert_eq!(provider.rate_limited_for(), Some(Duration::from_secs(15)));

        tokio::time::advance(Duration::from_secs(14)).await;
        assert!(provider.generate_targets(&[]).await.is_empty());
        assert_eq!(generator.calls(), 1, "no request while the gate is closed");

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(provider.generate_targets(&[]).await.len(), 1);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_errors_fail_open_to_empty() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::Malformed),
            Ok("not json at all".to_string()),
        ]);
        let provider = TargetProvider::new(generator.clone(), state_with_key());
        assert!(provider.generate_targets(&[]).await.is_empty());
        assert!(provider.generate_targets(&[]).await.is_empty());
        assert!(provider.rate_limited_for().is_none());
    }

    #[tokio::test]
    async fn test_missing_credential_skips_generator() {
        let generator = ScriptedGenerator::new(Vec::new());
        let provider = TargetProvider::new(generator.clone(), SharedState::in_memory().unwrap());
        assert!(provider.generate_targets(&["chess".into()]).await.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[test]
    fn test_prompt_lists_interests_and_sites() {
        let prompt = build_prompt(&["gardening".into(), "jazz".into()]);
        assert!(prompt.contains("gardening, jazz"));
        assert!(prompt.contains("- wikipedia: encyclopedia article title"));
        assert!(prompt.contains("\"site\""));
    }
}
