//! Chromium renderer backed by chromiumoxide.
//!
//! Every persona gets its own browser process with a persistent
//! `--user-data-dir`, so cookies and storage never cross personas.

use super::{NavigationResult, ProfileSpec, RenderContext, RenderError, Renderer};
use crate::stealth::fingerprint;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const READY_POLL: Duration = Duration::from_millis(100);

/// Launches one Chromium process per persona profile.
pub struct ChromiumRenderer {
    profiles_dir: PathBuf,
    executable: Option<PathBuf>,
    headless: bool,
}

impl ChromiumRenderer {
    pub fn new(profiles_dir: PathBuf, executable: Option<PathBuf>, headless: bool) -> Self {
        Self {
            profiles_dir,
            executable,
            headless,
        }
    }

    fn config_for(&self, profile: &ProfileSpec) -> Result<BrowserConfig, RenderError> {
        let user_data_dir = self.profiles_dir.join(&profile.persona_id);
        std::fs::create_dir_all(&user_data_dir).map_err(|e| {
            RenderError::Launch(format!("creating profile {}: {e}", user_data_dir.display()))
        })?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(user_data_dir)
            .window_size(1280, 720);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(RenderError::Launch)
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn launch(&self, profile: &ProfileSpec) -> Result<Arc<dyn RenderContext>, RenderError> {
        let config = self.config_for(profile)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let alive = Arc::new(AtomicBool::new(true));
        let handler_alive = Arc::clone(&alive);
        let persona_id = profile.persona_id.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(persona = %persona_id, "cdp handler: {e}");
                }
            }
            // The connection is gone: the browser exited or was closed.
            handler_alive.store(false, Ordering::SeqCst);
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let mut browser = browser;
                let _ = browser.close().await;
                handler_task.abort();
                return Err(RenderError::Launch(e.to_string()));
            }
        };

        let patch = fingerprint::stealth_script(&profile.languages);
        if let Err(e) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(patch))
            .await
        {
            debug!(persona = %profile.persona_id, "fingerprint patch not installed: {e}");
        }

        info!(persona = %profile.persona_id, "browser context launched");

        Ok(Arc::new(ChromiumContext {
            browser: Mutex::new(Some(browser)),
            page,
            alive,
            handler_task: std::sync::Mutex::new(Some(handler_task)),
        }))
    }
}

/// A Chromium process and its single driven page.
pub struct ChromiumContext {
    browser: Mutex<Option<Browser>>,
    page: Page,
    alive: Arc<AtomicBool>,
    handler_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ChromiumContext {
    async fn wait_for_dom(&self) -> Result<(), RenderError> {
        loop {
            let state = self.execute_js("document.readyState").await?;
            if matches!(state.as_str(), Some("interactive") | Some("complete")) {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<NavigationResult, RenderError> {
        if !self.is_alive() {
            return Err(RenderError::Closed("page has been closed".into()));
        }

        let started = Instant::now();
        let navigation = async {
            let response = self
                .page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| RenderError::navigation(e.to_string()))?;
            if let Some(error_text) = response.result.error_text.clone() {
                return Err(RenderError::navigation(error_text));
            }
            // Content loaded, not full load.
            self.wait_for_dom().await
        };

        tokio::time::timeout(Duration::from_millis(timeout_ms), navigation)
            .await
            .map_err(|_| RenderError::Timeout(timeout_ms))??;

        let final_url = self.get_url().await.unwrap_or_else(|_| url.to_string());
        Ok(NavigationResult {
            final_url,
            load_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value, RenderError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| RenderError::script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn get_url(&self) -> Result<String, RenderError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| RenderError::script(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), RenderError> {
        self.alive.store(false, Ordering::SeqCst);

        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        let closed = browser.close().await;
        let _ = browser.wait().await;

        let handler_task = self
            .handler_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = handler_task {
            task.abort();
        }

        closed
            .map(|_| ())
            .map_err(|e| RenderError::Closed(e.to_string()))
    }
}
