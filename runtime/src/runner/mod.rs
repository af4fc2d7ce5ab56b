//! Session runner: one browsing loop per active persona.
//!
//! `start_session` launches an isolated browser context and spawns the
//! loop as its own task. Loops cancel cooperatively: at every checkpoint a
//! loop checks that the registry still holds its epoch, that the kill
//! switch is off and that its page is alive.

pub mod events;
pub mod session;

use crate::metrics::extract_domain;
use crate::persona::{IntensityProfile, Persona};
use crate::provider::catalog::fallback_batch;
use crate::provider::{BrowseTarget, TargetProvider};
use crate::renderer::{ProfileSpec, RenderError, Renderer};
use crate::scheduler::SessionControl;
use crate::stealth::behavior::{collect_follow_candidates, pick_link, simulate_reading, sleep_random};
use crate::stealth::random::RandomSource;
use crate::store::SharedState;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use events::{ActivityEvent, ActivityKind, EventBus};
use session::{Session, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Bound on each navigation.
    pub nav_timeout_ms: u64,
    /// Pause after a non-fatal iteration error.
    pub error_cooldown: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            nav_timeout_ms: 30_000,
            error_cooldown: Duration::from_secs(5),
        }
    }
}

/// Why a loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Exit {
    /// Deregistered by `stop_session` or replaced by a newer session.
    Cancelled,
    KillSwitch,
    BrowserClosed(String),
}

impl Exit {
    fn details(&self) -> String {
        match self {
            Exit::Cancelled => "Session stopped".to_string(),
            Exit::KillSwitch => "Kill switch engaged".to_string(),
            Exit::BrowserClosed(reason) => format!("Browser closed: {reason}"),
        }
    }
}

/// What became of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Loaded,
    Failed,
    /// Filtered out before navigation.
    Skipped,
}

/// Owns every active session. Cheap to clone.
#[derive(Clone)]
pub struct SessionRunner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    renderer: Arc<dyn Renderer>,
    provider: Arc<TargetProvider>,
    state: SharedState,
    rng: Arc<dyn RandomSource>,
    options: RunnerOptions,
    registry: SessionRegistry,
    events: EventBus,
}

impl SessionRunner {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        provider: Arc<TargetProvider>,
        state: SharedState,
        rng: Arc<dyn RandomSource>,
        options: RunnerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                renderer,
                provider,
                state,
                rng,
                options,
                registry: SessionRegistry::new(),
                events: EventBus::new(),
            }),
        }
    }

    /// Receive activity events from every session.
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_active(&self, persona_id: &str) -> bool {
        self.inner.registry.contains(persona_id)
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.inner.registry.ids()
    }

    /// Start a session for `persona`. A no-op if one is already running.
    ///
    /// Fails only if the browser context cannot be launched, in which case
    /// the registration is rolled back.
    pub async fn start_session(&self, persona: &Persona) -> Result<()> {
        let inner = &self.inner;
        let Some(epoch) = inner.registry.reserve(&persona.id, &persona.name) else {
            debug!(persona = %persona.id, "session already running");
            return Ok(());
        };

        self.emit(
            &persona.id,
            &persona.name,
            ActivityKind::Start,
            format!("Session started for {}", persona.name),
        );

        let context = match inner.renderer.launch(&ProfileSpec::new(&persona.id)).await {
            Ok(context) => context,
            Err(e) => {
                inner.registry.remove_if_current(&persona.id, epoch);
                warn!(persona = %persona.id, "failed to launch browser: {e}");
                self.emit(
                    &persona.id,
                    &persona.name,
                    ActivityKind::Stop,
                    format!("Failed to launch browser: {e}"),
                );
                return Err(anyhow!(e).context(format!("starting session for {}", persona.name)));
            }
        };

        if !inner.registry.attach(&persona.id, epoch, context.clone()) {
            // Stopped while the browser was starting.
            let _ = context.close().await;
            return Ok(());
        }

        info!(persona = %persona.id, name = %persona.name, "session started");
        let session = Session::new(persona.clone(), epoch, context);
        let runner = self.clone();
        tokio::spawn(async move { runner.run_loop(session).await });
        Ok(())
    }

    /// Stop the session for `persona_id`. A no-op if none is running.
    ///
    /// The loop notices at its next checkpoint.
    pub async fn stop_session(&self, persona_id: &str) {
        let Some(entry) = self.inner.registry.remove(persona_id) else {
            return;
        };
        if let Some(context) = entry.context {
            if let Err(e) = context.close().await {
                debug!(persona = %persona_id, "close after stop: {e}");
            }
        }
        info!(persona = %persona_id, "session stopped");
        self.emit(
            persona_id,
            &entry.persona_name,
            ActivityKind::Stop,
            Exit::Cancelled.details(),
        );
    }

    fn emit(&self, persona_id: &str, persona_name: &str, kind: ActivityKind, details: String) {
        self.inner
            .events
            .emit(ActivityEvent::new(persona_id, persona_name, kind, details));
    }

    fn emit_for(&self, session: &Session, kind: ActivityKind, details: String) {
        self.emit(session.id(), session.name(), kind, details);
    }

    fn checkpoint(&self, session: &Session) -> Option<Exit> {
        if !self.inner.registry.is_current(session.id(), session.epoch) {
            Some(Exit::Cancelled)
        } else if self.inner.state.kill_switch() {
            Some(Exit::KillSwitch)
        } else if !session.context.is_alive() {
            Some(Exit::BrowserClosed("page is no longer usable".to_string()))
        } else {
            None
        }
    }

    async fn run_loop(self, mut session: Session) {
        let profile = session.persona.intensity.profile();
        let rng = self.inner.rng.clone();

        let exit = loop {
            if let Some(exit) = self.checkpoint(&session) {
                break exit;
            }
            match self.run_batch(&mut session, &profile).await {
                Ok(()) => {
                    if self.checkpoint(&session).is_none() {
                        sleep_random(rng.as_ref(), profile.breathing_room()).await;
                    }
                }
                Err(e) if e.is_fatal() => break Exit::BrowserClosed(e.to_string()),
                Err(e) => {
                    warn!(persona = %session.id(), "session iteration failed: {e}");
                    tokio::time::sleep(self.inner.options.error_cooldown).await;
                }
            }
        };

        match exit {
            Exit::Cancelled => debug!(persona = %session.id(), "session loop exited"),
            exit => self.terminate(&session, exit).await,
        }
    }

    /// Tear down a session that ended on its own.
    async fn terminate(&self, session: &Session, exit: Exit) {
        let inner = &self.inner;
        if inner
            .registry
            .remove_if_current(session.id(), session.epoch)
            .is_none()
        {
            return;
        }
        if let Err(e) = session.context.close().await {
            debug!(persona = %session.id(), "close after termination: {e}");
        }
        info!(persona = %session.id(), name = %session.name(), "session ended: {}", exit.details());
        self.emit_for(session, ActivityKind::Stop, exit.details());

        if let Err(e) = inner.state.personas().set_active(session.id(), false) {
            warn!(persona = %session.id(), "failed to persist inactive flag: {e}");
        }
    }

    async fn run_batch(&self, session: &mut Session, profile: &IntensityProfile) -> Result<(), RenderError> {
        let rng = self.inner.rng.clone();
        let generated = self
            .inner
            .provider
            .generate_targets(&session.persona.interests)
            .await;

        let batch = if generated.is_empty() {
            session.record_empty_generation();
            debug!(
                persona = %session.id(),
                failures = session.consecutive_failures(),
                "no generated targets, using fallback"
            );
            fallback_batch(profile.batch_size, rng.as_ref())
        } else {
            session.reset_failures();
            generated
        };

        let (mut loaded, mut failed) = (0usize, 0usize);
        for target in &batch {
            if self.checkpoint(session).is_some() {
                return Ok(());
            }
            match self.visit_target(session, target, profile).await? {
                Visit::Loaded => loaded += 1,
                Visit::Failed => failed += 1,
                Visit::Skipped => {}
            }
            sleep_random(rng.as_ref(), profile.delay).await;
        }
        if loaded == 0 && failed > 0 {
            return Err(RenderError::Navigation(format!(
                "none of {failed} targets could be loaded"
            )));
        }
        Ok(())
    }

    /// Visit one target. Only fatal errors propagate.
    async fn visit_target(
        &self,
        session: &Session,
        target: &BrowseTarget,
        profile: &IntensityProfile,
    ) -> Result<Visit, RenderError> {
        let Some(domain) = extract_domain(&target.url) else {
            debug!(url = %target.url, "skipping target without a host");
            return Ok(Visit::Skipped);
        };
        if !self.inner.state.settings().allows(&domain) {
            debug!(url = %target.url, "skipping target outside the safe list");
            return Ok(Visit::Skipped);
        }

        self.emit_for(
            session,
            ActivityKind::Search,
            format!("Searching: \"{}\" on {}", target.topic, target.site),
        );

        match session
            .context
            .navigate(&target.url, self.inner.options.nav_timeout_ms)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(persona = %session.id(), "failed to load {}: {e}", target.url);
                return Ok(Visit::Failed);
            }
        }

        match self.read_page(session, &domain, profile).await {
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!(persona = %session.id(), "reading cut short on {domain}: {e}"),
            Ok(()) => {}
        }

        let rng = self.inner.rng.as_ref();
        if rng.chance(profile.link_follow_chance) {
            match self.follow_link(session, &domain, profile).await {
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!(persona = %session.id(), "link follow skipped: {e}"),
                Ok(()) => {}
            }
        }
        Ok(Visit::Loaded)
    }

    /// Record a visit to the current page and read it.
    async fn read_page(
        &self,
        session: &Session,
        domain: &str,
        profile: &IntensityProfile,
    ) -> Result<(), RenderError> {
        self.inner.state.record_visit(domain);
        self.emit_for(session, ActivityKind::Visit, format!("Visiting: {domain}"));
        self.emit_for(session, ActivityKind::Scroll, format!("Reading page on {domain}"));
        simulate_reading(session.context.as_ref(), profile, self.inner.rng.as_ref()).await?;
        Ok(())
    }

    async fn follow_link(
        &self,
        session: &Session,
        domain: &str,
        profile: &IntensityProfile,
    ) -> Result<(), RenderError> {
        let settings = self.inner.state.settings();
        let candidates = collect_follow_candidates(session.context.as_ref(), domain, &settings).await?;
        let Some(link) = pick_link(&candidates, self.inner.rng.as_ref()) else {
            return Ok(());
        };
        session
            .context
            .navigate(link, self.inner.options.nav_timeout_ms)
            .await?;
        let followed = extract_domain(link).unwrap_or_else(|| domain.to_string());
        self.read_page(session, &followed, profile).await
    }
}

#[async_trait]
impl SessionControl for SessionRunner {
    async fn start_session(&self, persona: &Persona) -> Result<()> {
        SessionRunner::start_session(self, persona).await
    }

    async fn stop_session(&self, persona_id: &str) {
        SessionRunner::stop_session(self, persona_id).await
    }

    fn is_active(&self, persona_id: &str) -> bool {
        SessionRunner::is_active(self, persona_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{Intensity, PersonaDraft};
    use crate::provider::catalog::FALLBACK_URLS;
    use crate::provider::generator::{GenerationError, TextGenerator};
    use crate::renderer::fake::{FakeContext, FakeRenderer, NavOutcome};
    use crate::stealth::random::SequenceRandom;
    use crate::store::KvStore;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    /// Replays canned generator output; empty once exhausted.
    struct Canned(Mutex<Vec<String>>);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _credential: &str, _prompt: &str) -> Result<String, GenerationError> {
            let mut responses = self.0.lock().unwrap();
            if responses.is_empty() {
                Ok(String::new())
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    struct Harness {
        runner: SessionRunner,
        renderer: Arc<FakeRenderer>,
        state: SharedState,
        persona: Persona,
    }

    /// Runner with a fake browser, draws pinned to 0.999 (no link follows,
    /// no early stops, fallback order unchanged) and a stored persona.
    fn harness(intensity: Intensity, responses: Vec<&str>) -> Harness {
        harness_on(
            SharedState::in_memory().unwrap(),
            intensity,
            responses,
            Arc::new(SequenceRandom::constant(0.999)),
        )
    }

    fn harness_on(
        state: SharedState,
        intensity: Intensity,
        responses: Vec<&str>,
        rng: Arc<dyn RandomSource>,
    ) -> Harness {
        if !responses.is_empty() {
            state.update_settings(|s| s.api_key = "k".into()).unwrap();
        }
        let generator = Arc::new(Canned(Mutex::new(
            responses.into_iter().map(String::from).collect(),
        )));
        let provider = Arc::new(TargetProvider::new(generator, state.clone()));
        let renderer = FakeRenderer::new();
        let runner = SessionRunner::new(
            renderer.clone(),
            provider,
            state.clone(),
            rng,
            RunnerOptions::default(),
        );
        let persona = state
            .personas()
            .save(PersonaDraft {
                name: Some("Alice".into()),
                interests: Some(vec!["baking".into()]),
                intensity: Some(intensity),
                ..Default::default()
            })
            .unwrap();
        Harness {
            runner,
            renderer,
            state,
            persona,
        }
    }

    /// Keeps the fallback order (11 shuffle draws), follows a link on the
    /// first target, picks the first candidate, then waits the longest delay.
    fn follow_first_link() -> Arc<dyn RandomSource> {
        let mut draws = vec![0.999; 11];
        draws.extend([0.0, 0.0, 0.999]);
        Arc::new(SequenceRandom::new(draws))
    }

    async fn next_of(rx: &mut broadcast::Receiver<ActivityEvent>, kind: ActivityKind) -> ActivityEvent {
        tokio::time::timeout(Duration::from_secs(24 * 3600), async {
            loop {
                let event = rx.recv().await.unwrap();
                if event.kind == kind {
                    return event;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_launches_once() {
        let h = harness(Intensity::Medium, vec![]);
        h.runner.start_session(&h.persona).await.unwrap();
        h.runner.start_session(&h.persona).await.unwrap();

        assert_eq!(h.renderer.launches(), 1);
        assert_eq!(h.runner.active_ids(), vec![h.persona.id.clone()]);
        h.runner.stop_session(&h.persona.id).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failure_rolls_back() {
        let h = harness(Intensity::Medium, vec![]);
        h.renderer.fail_launch.store(true, Ordering::SeqCst);
        let mut rx = h.runner.subscribe();

        assert!(h.runner.start_session(&h.persona).await.is_err());
        assert!(!h.runner.is_active(&h.persona.id));
        assert_eq!(rx.recv().await.unwrap().kind, ActivityKind::Start);
        assert_eq!(rx.recv().await.unwrap().kind, ActivityKind::Stop);

        h.renderer.fail_launch.store(false, Ordering::SeqCst);
        h.runner.start_session(&h.persona).await.unwrap();
        assert!(h.runner.is_active(&h.persona.id));
        h.runner.stop_session(&h.persona.id).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_in_causal_order() {
        let h = harness(Intensity::Medium, vec![]);
        let mut rx = h.runner.subscribe();
        h.runner.start_session(&h.persona).await.unwrap();

        let kinds: Vec<ActivityKind> = {
            let mut kinds = Vec::new();
            for _ in 0..4 {
                kinds.push(rx.recv().await.unwrap().kind);
            }
            kinds
        };
        assert_eq!(
            kinds,
            vec![
                ActivityKind::Start,
                ActivityKind::Search,
                ActivityKind::Visit,
                ActivityKind::Scroll
            ]
        );
        h.runner.stop_session(&h.persona.id).await;
        assert_eq!(next_of(&mut rx, ActivityKind::Stop).await.details, "Session stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_batch_matches_intensity() {
        let h = harness(Intensity::Low, vec![]);
        let context = FakeContext::new(0.0);
        h.renderer.prepare(&h.persona.id, context.clone());
        let mut rx = h.runner.subscribe();
        h.runner.start_session(&h.persona).await.unwrap();

        for _ in 0..3 {
            next_of(&mut rx, ActivityKind::Visit).await;
        }
        h.runner.stop_session(&h.persona.id).await;
        next_of(&mut rx, ActivityKind::Stop).await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(context.visited(), FALLBACK_URLS[..3].to_vec());
        assert_eq!(h.state.metrics().total_queries, 3);
        assert_eq!(context.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_targets_preferred() {
        let h = harness(
            Intensity::High,
            vec![r#"[{"site":"wikipedia","topic":"Sourdough"}]"#],
        );
        let context = FakeContext::new(0.0);
        h.renderer.prepare(&h.persona.id, context.clone());
        let mut rx = h.runner.subscribe();
        h.runner.start_session(&h.persona).await.unwrap();

        let search = next_of(&mut rx, ActivityKind::Search).await;
        assert!(search.details.contains("Sourdough"));
        next_of(&mut rx, ActivityKind::Visit).await;
        h.runner.stop_session(&h.persona.id).await;

        assert_eq!(
            context.visited(),
            vec!["https://en.wikipedia.org/wiki/Sourdough".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_moves_to_next_target() {
        let h = harness(Intensity::Medium, vec![]);
        let context = FakeContext::new(0.0);
        context.fail(FALLBACK_URLS[0], NavOutcome::Transient);
        h.renderer.prepare(&h.persona.id, context.clone());
        let mut rx = h.runner.subscribe();
        h.runner.start_session(&h.persona).await.unwrap();

        let visit = next_of(&mut rx, ActivityKind::Visit).await;
        assert_eq!(visit.details, "Visiting: bbc.com");
        assert!(h.runner.is_active(&h.persona.id));
        h.runner.stop_session(&h.persona.id).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_tears_down_session() {
        let h = harness(Intensity::Medium, vec![]);
        h.state.personas().set_active(&h.persona.id, true).unwrap();
        let context = FakeContext::new(0.0);
        context.fail(FALLBACK_URLS[0], NavOutcome::Fatal);
        h.renderer.prepare(&h.persona.id, context.clone());
        let mut rx = h.runner.subscribe();
        h.runner.start_session(&h.persona).await.unwrap();

        let stop = next_of(&mut rx, ActivityKind::Stop).await;
        assert!(stop.details.starts_with("Browser closed"));
        assert!(!h.runner.is_active(&h.persona.id));
        assert!(context.visited().is_empty());
        assert_eq!(context.closes.load(Ordering::SeqCst), 1);
        assert!(!h.state.personas().get(&h.persona.id).unwrap().unwrap().is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_switch_ends_session() {
        let h = harness(Intensity::High, vec![]);
        h.state.personas().set_active(&h.persona.id, true).unwrap();
        let mut rx = h.runner.subscribe();
        h.runner.start_session(&h.persona).await.unwrap();

        next_of(&mut rx, ActivityKind::Visit).await;
        h.state.update_settings(|s| s.kill_switch = true).unwrap();

        let stop = next_of(&mut rx, ActivityKind::Stop).await;
        assert_eq!(stop.details, "Kill switch engaged");
        assert!(h.runner.active_ids().is_empty());
        assert!(!h.state.personas().get(&h.persona.id).unwrap().unwrap().is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safe_list_gates_targets() {
        let h = harness(Intensity::Medium, vec![]);
        h.state
            .update_settings(|s| s.safe_list = vec!["npr.org".into()])
            .unwrap();
        let context = FakeContext::new(0.0);
        h.renderer.prepare(&h.persona.id, context.clone());
        let mut rx = h.runner.subscribe();
        h.runner.start_session(&h.persona).await.unwrap();

        let visit = next_of(&mut rx, ActivityKind::Visit).await;
        assert_eq!(visit.details, "Visiting: npr.org");
        h.runner.stop_session(&h.persona.id).await;
        assert_eq!(context.visited(), vec!["https://www.npr.org".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let h = harness(Intensity::Medium, vec![]);
        let mut rx = h.runner.subscribe();
        h.runner.stop_session("nobody").await;
        h.runner.start_session(&h.persona).await.unwrap();
        h.runner.stop_session(&h.persona.id).await;
        h.runner.stop_session(&h.persona.id).await;

        let mut stops = 0;
        while let Ok(event) = rx.try_recv() {
            if event.kind == ActivityKind::Stop {
                stops += 1;
            }
        }
        assert_eq!(stops, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reading_failure_does_not_abort_batch() {
        let h = harness(Intensity::Low, vec![]);
        let context = FakeContext::new(0.0);
        context.failing_reads.store(1, Ordering::SeqCst);
        h.renderer.prepare(&h.persona.id, context.clone());
        let mut rx = h.runner.subscribe();
        h.runner.start_session(&h.persona).await.unwrap();

        for _ in 0..3 {
            next_of(&mut rx, ActivityKind::Visit).await;
        }
        h.runner.stop_session(&h.persona.id).await;

        assert_eq!(context.visited(), FALLBACK_URLS[..3].to_vec());
        assert_eq!(h.state.metrics().total_queries, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_followed_link_is_read_and_counted() {
        let h = harness_on(
            SharedState::in_memory().unwrap(),
            Intensity::Medium,
            vec![],
            follow_first_link(),
        );
        let context = FakeContext::new(0.0).with_anchors(&[
            "https://en.wikipedia.org/w/index.php?title=Special:UserLogin",
            "https://www.bbc.com/news",
            "https://en.wikipedia.org/wiki/Bread",
        ]);
        h.renderer.prepare(&h.persona.id, context.clone());
        let mut rx = h.runner.subscribe();
        h.runner.start_session(&h.persona).await.unwrap();

        let mut events = Vec::new();
        for _ in 0..6 {
            let event = rx.recv().await.unwrap();
            events.push((event.kind, event.details));
        }
        h.runner.stop_session(&h.persona.id).await;

        let kinds: Vec<ActivityKind> = events.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActivityKind::Start,
                ActivityKind::Search,
                ActivityKind::Visit,
                ActivityKind::Scroll,
                ActivityKind::Visit,
                ActivityKind::Scroll,
            ]
        );
        assert_eq!(events[4].1, "Visiting: en.wikipedia.org");
        assert_eq!(
            context.visited(),
            vec![
                FALLBACK_URLS[0].to_string(),
                "https://en.wikipedia.org/wiki/Bread".to_string()
            ]
        );
        let metrics = h.state.metrics();
        assert_eq!(metrics.total_queries, 2);
        assert_eq!(metrics.domain_visits.get("en.wikipedia.org"), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_follow_keeps_batch_going() {
        let h = harness_on(
            SharedState::in_memory().unwrap(),
            Intensity::Medium,
            vec![],
            follow_first_link(),
        );
        let context = FakeContext::new(0.0).with_anchors(&["https://en.wikipedia.org/wiki/Bread"]);
        context.fail("https://en.wikipedia.org/wiki/Bread", NavOutcome::Transient);
        h.renderer.prepare(&h.persona.id, context.clone());
        let mut rx = h.runner.subscribe();
        h.runner.start_session(&h.persona).await.unwrap();

        assert_eq!(
            next_of(&mut rx, ActivityKind::Visit).await.details,
            "Visiting: en.wikipedia.org"
        );
        assert_eq!(next_of(&mut rx, ActivityKind::Visit).await.details, "Visiting: bbc.com");
        assert!(h.runner.is_active(&h.persona.id));
        h.runner.stop_session(&h.persona.id).await;

        assert_eq!(context.visited(), FALLBACK_URLS[..2].to_vec());
        assert_eq!(h.state.metrics().total_queries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_cools_down_and_resumes() {
        let h = harness(Intensity::Low, vec![]);
        let context = FakeContext::new(0.0);
        for url in FALLBACK_URLS {
            context.fail(url, NavOutcome::Transient);
        }
        h.renderer.prepare(&h.persona.id, context.clone());
        let mut rx = h.runner.subscribe();
        let started = tokio::time::Instant::now();
        h.runner.start_session(&h.persona).await.unwrap();

        for _ in 0..4 {
            next_of(&mut rx, ActivityKind::Search).await;
        }
        let elapsed = started.elapsed();

        // Three ~15 s target delays, then the 5 s cooldown instead of the
        // ~45 s breathing room.
        assert!(elapsed >= Duration::from_secs(49), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(60), "{elapsed:?}");
        assert!(h.runner.is_active(&h.persona.id));
        assert!(context.visited().is_empty());
        h.runner.stop_session(&h.persona.id).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_switch_set_by_another_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fogcover.db");
        let open = || SharedState::load(Arc::new(KvStore::open(&path).unwrap()), None).unwrap();
        let h = harness_on(
            open(),
            Intensity::High,
            vec![],
            Arc::new(SequenceRandom::constant(0.999)),
        );
        let cli = open();
        cli.personas().set_active(&h.persona.id, true).unwrap();
        let mut rx = h.runner.subscribe();
        h.runner.start_session(&h.persona).await.unwrap();

        next_of(&mut rx, ActivityKind::Visit).await;
        cli.update_settings(|s| s.kill_switch = true).unwrap();

        let stop = next_of(&mut rx, ActivityKind::Stop).await;
        assert_eq!(stop.details, "Kill switch engaged");
        assert!(h.runner.active_ids().is_empty());
        assert!(!cli.personas().get(&h.persona.id).unwrap().unwrap().is_active);
    }
}
