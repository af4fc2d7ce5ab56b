//! Scriptable in-memory renderer for unit tests.

use super::{NavigationResult, ProfileSpec, RenderContext, RenderError, Renderer};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// How a navigation to a given URL should end.
#[derive(Debug, Clone)]
pub enum NavOutcome {
    Ok,
    Transient,
    /// Fails as closed and kills the page.
    Fatal,
}

pub struct FakeContext {
    pub scroll_height: f64,
    pub anchors: Mutex<Vec<String>>,
    outcomes: Mutex<HashMap<String, NavOutcome>>,
    pub visited: Mutex<Vec<String>>,
    pub scrolls: Mutex<Vec<f64>>,
    alive: AtomicBool,
    pub closes: AtomicUsize,
    /// Page-height reads that fail with a script error before reads succeed.
    pub failing_reads: AtomicUsize,
}

impl FakeContext {
    pub fn new(scroll_height: f64) -> Arc<Self> {
        Arc::new(Self {
            scroll_height,
            anchors: Mutex::new(Vec::new()),
            outcomes: Mutex::new(HashMap::new()),
            visited: Mutex::new(Vec::new()),
            scrolls: Mutex::new(Vec::new()),
            alive: AtomicBool::new(true),
            closes: AtomicUsize::new(0),
            failing_reads: AtomicUsize::new(0),
        })
    }

    pub fn with_anchors(self: Arc<Self>, anchors: &[&str]) -> Arc<Self> {
        *self.anchors.lock().unwrap() = anchors.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn fail(&self, url: &str, outcome: NavOutcome) {
        self.outcomes.lock().unwrap().insert(url.to_string(), outcome);
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn scrolls(&self) -> Vec<f64> {
        self.scrolls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<NavigationResult, RenderError> {
        if !self.is_alive() {
            return Err(RenderError::Closed("page has been closed".into()));
        }
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(NavOutcome::Ok);
        match outcome {
            NavOutcome::Ok => {
                self.visited.lock().unwrap().push(url.to_string());
                Ok(NavigationResult {
                    final_url: url.to_string(),
                    load_time_ms: 1,
                })
            }
            NavOutcome::Transient => Err(RenderError::Timeout(timeout_ms)),
            NavOutcome::Fatal => {
                self.kill();
                Err(RenderError::navigation("Target page, context or browser has been closed"))
            }
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value, RenderError> {
        if !self.is_alive() {
            return Err(RenderError::Closed("page has been closed".into()));
        }
        if script.contains("scrollHeight") {
            let failing = self
                .failing_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if failing.is_ok() {
                return Err(RenderError::script("Execution context was destroyed"));
            }
            return Ok(serde_json::json!(self.scroll_height));
        }
        if script.contains("querySelectorAll") {
            return Ok(serde_json::json!(*self.anchors.lock().unwrap()));
        }
        if let Some(rest) = script.strip_prefix("window.scrollTo(0, ") {
            let y: f64 = rest.trim_end_matches(')').parse().unwrap_or(-1.0);
            self.scrolls.lock().unwrap().push(y);
        }
        Ok(serde_json::Value::Null)
    }

    async fn get_url(&self) -> Result<String, RenderError> {
        Ok(self.visited.lock().unwrap().last().cloned().unwrap_or_default())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), RenderError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.kill();
        Ok(())
    }
}

/// Hands out one prepared context per persona id.
#[derive(Default)]
pub struct FakeRenderer {
    contexts: Mutex<HashMap<String, Arc<FakeContext>>>,
    pub launches: AtomicUsize,
    pub fail_launch: AtomicBool,
}

impl FakeRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn prepare(&self, persona_id: &str, context: Arc<FakeContext>) {
        self.contexts
            .lock()
            .unwrap()
            .insert(persona_id.to_string(), context);
    }

    pub fn context(&self, persona_id: &str) -> Option<Arc<FakeContext>> {
        self.contexts.lock().unwrap().get(persona_id).cloned()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn launch(&self, profile: &ProfileSpec) -> Result<Arc<dyn RenderContext>, RenderError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(RenderError::Launch("no browser".into()));
        }
        let context = self
            .contexts
            .lock()
            .unwrap()
            .entry(profile.persona_id.clone())
            .or_insert_with(|| FakeContext::new(0.0))
            .clone();
        Ok(context as Arc<dyn RenderContext>)
    }
}
