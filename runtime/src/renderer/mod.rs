//! Browser rendering capability.
//!
//! The runner never talks to a browser engine directly. It asks a
//! [`Renderer`] for one isolated, persistent context per persona and drives
//! that context's single page through [`RenderContext`].

pub mod chromium;
#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of a successful navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// URL after redirects.
    pub final_url: String,
    /// Time until the DOM was ready, in milliseconds.
    pub load_time_ms: u64,
}

/// Errors reported by a browser context.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("browser context closed: {0}")]
    Closed(String),
    #[error("navigation timed out after {0}ms")]
    Timeout(u64),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("failed to launch browser context: {0}")]
    Launch(String),
}

impl RenderError {
    /// A fatal error means the context or page is gone and the session
    /// owning it cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RenderError::Closed(_))
    }

    /// Classify a navigation failure reported by the engine as text.
    pub fn navigation(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_closed_message(&message) {
            RenderError::Closed(message)
        } else {
            RenderError::Navigation(message)
        }
    }

    /// Classify a script failure reported by the engine as text.
    pub fn script(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_closed_message(&message) {
            RenderError::Closed(message)
        } else {
            RenderError::Script(message)
        }
    }
}

/// Engines surface a dead page or browser through their error text.
fn is_closed_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "target page",
        "has been closed",
        "target closed",
        "browser closed",
        "session closed",
        "no target with given id",
        "channel closed",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// What a renderer needs to know to open a persona's context.
#[derive(Debug, Clone)]
pub struct ProfileSpec {
    /// Persona id; also names the on-disk profile directory.
    pub persona_id: String,
    /// Languages advertised by `navigator.languages`.
    pub languages: Vec<String>,
}

impl ProfileSpec {
    pub fn new(persona_id: impl Into<String>) -> Self {
        Self {
            persona_id: persona_id.into(),
            languages: vec!["en-US".to_string(), "en".to_string()],
        }
    }
}

/// Launches isolated browsing contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a persistent context scoped to one persona, with one page ready.
    ///
    /// Cookies and storage live in that persona's profile only.
    async fn launch(&self, profile: &ProfileSpec) -> Result<Arc<dyn RenderContext>, RenderError>;
}

/// A live browsing context owning a single page.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate and wait for DOM content, bounded by `timeout_ms`.
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<NavigationResult, RenderError>;

    /// Evaluate a script in the page and return its JSON value
    /// (`Null` for `undefined`).
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value, RenderError>;

    /// Current page URL.
    async fn get_url(&self) -> Result<String, RenderError>;

    /// Whether the page can still be driven.
    fn is_alive(&self) -> bool;

    /// Close the context. Closing twice is harmless.
    async fn close(&self) -> Result<(), RenderError>;
}
