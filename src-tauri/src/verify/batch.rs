//! Batch Validation
//!
//! Runs every locator of the active POM against its snapshot, one lookup at
//! a time. A session owns the rendering context of the active POM and an
//! explicit state:
//!
//! `Idle → LoadingSnapshot → WaitingForVerifier → Verifying(i) → Done`
//!
//! Every selection and every snapshot replacement bumps a generation counter. Work started under an older
//! generation never commits its results; it reports `Superseded` instead.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::context::{ContextLoader, SnapshotContext, ThreadContextLoader, VerifyOutcome};
use super::poll::{poll_bounded, PollPolicy, PollResult, Probe};
use super::selector::selector_for;
use crate::domain::{DomainError, DomainResult, Pom, PomElement, SnapshotFingerprint};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub found: usize,
    /// Includes indeterminate lookups
    pub not_found: usize,
    /// Elements without a usable selector
    pub skipped: usize,
    /// Lookups that failed (invalid selector, timeout)
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ValidationState {
    Idle,
    LoadingSnapshot { attempt: u32 },
    WaitingForVerifier { attempt: u32 },
    Verifying { index: usize, total: usize },
    Done(BatchSummary),
    Failed { message: String },
}

/// Result of a completed run: element id → found, `None` when indeterminate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub pom_id: u32,
    pub statuses: BTreeMap<u32, Option<bool>>,
    pub summary: BatchSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed(BatchReport),
    /// Another POM was selected, its snapshot was replaced, or another run
    /// started before this one finished
    Superseded,
}

/// What the UI shows for the active POM
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub pom_id: Option<u32>,
    pub state: ValidationState,
    pub statuses: BTreeMap<u32, Option<bool>>,
}

struct ActivePom {
    id: u32,
    elements: Vec<PomElement>,
    html: Option<String>,
}

struct SessionInner {
    generation: u64,
    active: Option<ActivePom>,
    context: Option<Arc<dyn SnapshotContext>>,
    state: ValidationState,
    statuses: BTreeMap<u32, Option<bool>>,
}

enum Interrupted {
    Superseded,
    Failed(DomainError),
}

/// Whether waiting for the context is shown as the session state. Only a
/// batch run drives the state machine; single lookups wait silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Report,
    Quiet,
}

/// Validation state of the active POM
pub struct ValidationSession<L: ContextLoader = ThreadContextLoader> {
    loader: L,
    policy: PollPolicy,
    inner: Mutex<SessionInner>,
}

impl<L: ContextLoader> ValidationSession<L> {
    pub fn new(loader: L, policy: PollPolicy) -> Self {
        Self {
            loader,
            policy,
            inner: Mutex::new(SessionInner {
                generation: 0,
                active: None,
                context: None,
                state: ValidationState::Idle,
                statuses: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `f` only if no newer selection or run happened
    fn commit<T>(&self, generation: u64, f: impl FnOnce(&mut SessionInner) -> T) -> Option<T> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return None;
        }
        Some(f(&mut inner))
    }

    /// Make `pom` the active POM. Drops the current context and all results.
    pub fn select_pom(&self, pom: Option<&Pom>) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.active = pom.map(|p| ActivePom {
            id: p.id,
            elements: p.elements.clone(),
            html: p.html_content.clone(),
        });
        inner.context = None;
        inner.state = ValidationState::Idle;
        inner.statuses.clear();
        log::debug!("Validation session now tracks POM {:?}", pom.map(|p| p.id));
    }

    /// Refresh the active POM after a save or upload. A replaced snapshot
    /// discards the results gathered against the old one, including those of
    /// a run still in flight.
    pub fn pom_updated(&self, pom: &Pom) {
        let mut inner = self.lock();
        let Some(active) = inner.active.as_mut().filter(|a| a.id == pom.id) else {
            return;
        };

        let snapshot_replaced = active.html != pom.html_content;
        active.elements = pom.elements.clone();
        active.html = pom.html_content.clone();

        if snapshot_replaced {
            inner.generation += 1;
            inner.context = None;
            inner.statuses.clear();
            inner.state = ValidationState::Idle;
            log::debug!("Snapshot of POM {} replaced; earlier results discarded", pom.id);
        } else {
            let ids: Vec<u32> = pom.elements.iter().map(|e| e.id).collect();
            inner.statuses.retain(|id, _| ids.contains(id));
        }
    }

    pub fn active_pom_id(&self) -> Option<u32> {
        self.lock().active.as_ref().map(|a| a.id)
    }

    pub fn state(&self) -> ValidationState {
        self.lock().state.clone()
    }

    pub fn statuses(&self) -> BTreeMap<u32, Option<bool>> {
        self.lock().statuses.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            pom_id: inner.active.as_ref().map(|a| a.id),
            state: inner.state.clone(),
            statuses: inner.statuses.clone(),
        }
    }

    /// Validate every element of the active POM
    pub async fn run(&self) -> DomainResult<BatchOutcome> {
        let (generation, pom_id, elements, html) = {
            let mut inner = self.lock();
            let (pom_id, elements, html) = active_with_snapshot(&inner)?;
            inner.generation += 1;
            inner.statuses.clear();
            (inner.generation, pom_id, elements, html)
        };
        log::info!("Validating {} elements of POM {}", elements.len(), pom_id);

        let context = match self.prepare(generation, &html, Progress::Report).await {
            Ok(context) => context,
            Err(Interrupted::Superseded) => return Ok(BatchOutcome::Superseded),
            Err(Interrupted::Failed(e)) => return Err(e),
        };

        let total = elements.len();
        let mut summary = BatchSummary::default();
        let mut statuses = BTreeMap::new();

        for (index, element) in elements.iter().enumerate() {
            let selector = selector_for(element);
            if selector.is_empty() {
                summary.skipped += 1;
                continue;
            }

            let entered = self.commit(generation, |inner| {
                inner.state = ValidationState::Verifying { index, total };
            });
            if entered.is_none() {
                return Ok(BatchOutcome::Superseded);
            }

            let outcome = context.verify(&selector).await;
            let status = outcome.status();
            match status {
                Some(true) => summary.found += 1,
                Some(false) => summary.not_found += 1,
                None => {
                    summary.not_found += 1;
                    summary.errors += 1;
                    log::warn!(
                        "Element '{}' ({}) could not be verified: {}",
                        element.name,
                        selector,
                        outcome.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            statuses.insert(element.id, status);

            let recorded = self.commit(generation, |inner| {
                inner.statuses.insert(element.id, status);
            });
            if recorded.is_none() {
                log::debug!("Discarding stale validation result for POM {}", pom_id);
                return Ok(BatchOutcome::Superseded);
            }
        }

        let finished = self.commit(generation, |inner| {
            inner.state = ValidationState::Done(summary);
        });
        if finished.is_none() {
            return Ok(BatchOutcome::Superseded);
        }

        log::info!(
            "Validation of POM {} done: {} found, {} not found, {} skipped",
            pom_id,
            summary.found,
            summary.not_found,
            summary.skipped
        );
        Ok(BatchOutcome::Completed(BatchReport { pom_id, statuses, summary }))
    }

    /// Verify a single element of the active POM and record its status
    pub async fn verify_element(&self, element_id: u32) -> DomainResult<VerifyOutcome> {
        let (generation, element, html) = {
            let inner = self.lock();
            let (pom_id, elements, html) = active_with_snapshot(&inner)?;
            let element = elements
                .into_iter()
                .find(|e| e.id == element_id)
                .ok_or_else(|| {
                    DomainError::NotFound(format!("Element {} not found in POM {}", element_id, pom_id))
                })?;
            (inner.generation, element, html)
        };

        let outcome = self.lookup(generation, &html, &selector_for(&element)).await?;
        self.commit(generation, |inner| {
            inner.statuses.insert(element.id, outcome.status());
        });
        Ok(outcome)
    }

    /// Look up an arbitrary selector in the active POM's snapshot
    pub async fn verify_selector(&self, selector: &str) -> DomainResult<VerifyOutcome> {
        let (generation, html) = {
            let inner = self.lock();
            let (_, _, html) = active_with_snapshot(&inner)?;
            (inner.generation, html)
        };
        self.lookup(generation, &html, selector).await
    }

    /// Rendered snapshot of the active POM with current highlights
    pub async fn preview_markup(&self) -> DomainResult<String> {
        let (generation, html) = {
            let inner = self.lock();
            let (_, _, html) = active_with_snapshot(&inner)?;
            (inner.generation, html)
        };
        match self.prepare(generation, &html, Progress::Quiet).await {
            Ok(context) => context.markup().await,
            Err(Interrupted::Superseded) => Err(superseded()),
            Err(Interrupted::Failed(e)) => Err(e),
        }
    }

    async fn lookup(&self, generation: u64, html: &str, selector: &str) -> DomainResult<VerifyOutcome> {
        if selector.trim().is_empty() {
            return Ok(VerifyOutcome::found(selector, false));
        }
        match self.prepare(generation, html, Progress::Quiet).await {
            Ok(context) => Ok(context.verify(selector).await),
            Err(Interrupted::Superseded) => Ok(VerifyOutcome::failed(selector, superseded().to_string())),
            Err(Interrupted::Failed(e)) => Err(e),
        }
    }

    /// Current context for `html`, opening and waiting for a new one when the
    /// loaded snapshot is missing or stale
    async fn prepare(
        &self,
        generation: u64,
        html: &str,
        progress: Progress,
    ) -> Result<Arc<dyn SnapshotContext>, Interrupted> {
        let fingerprint = SnapshotFingerprint::of(html);
        let current = self
            .commit(generation, |inner| inner.context.clone())
            .ok_or(Interrupted::Superseded)?
            .filter(|c| c.fingerprint() == &fingerprint);

        let context = match current {
            Some(context) => context,
            None => {
                let context = self.loader.open(html).map_err(|e| self.fail(generation, progress, e))?;
                self.commit(generation, |inner| {
                    inner.context = Some(context.clone());
                    if progress == Progress::Report {
                        inner.state = ValidationState::LoadingSnapshot { attempt: 0 };
                    }
                })
                .ok_or(Interrupted::Superseded)?;

                let loaded = poll_bounded(
                    context.subscribe(),
                    self.policy.interval,
                    self.policy.snapshot_attempts,
                    |attempt| {
                        self.check_ready(generation, progress, ValidationState::LoadingSnapshot { attempt }, || {
                            context.state().is_loaded()
                        })
                    },
                )
                .await;
                match loaded {
                    PollResult::Cancelled => return Err(Interrupted::Superseded),
                    PollResult::Exhausted { attempts } => {
                        log::warn!("Snapshot content not visible after {} attempts, continuing", attempts);
                    }
                    PollResult::Ready { .. } => {}
                }
                context
            }
        };

        let ready = poll_bounded(
            context.subscribe(),
            self.policy.interval,
            self.policy.verifier_attempts,
            |attempt| {
                self.check_ready(generation, progress, ValidationState::WaitingForVerifier { attempt }, || {
                    context.state().is_ready()
                })
            },
        )
        .await;

        match ready {
            PollResult::Ready { .. } => Ok(context),
            PollResult::Cancelled => Err(Interrupted::Superseded),
            PollResult::Exhausted { attempts } => Err(self.fail(
                generation,
                progress,
                DomainError::Internal(format!("Verifier was not ready after {} attempts", attempts)),
            )),
        }
    }

    fn check_ready(
        &self,
        generation: u64,
        progress: Progress,
        state: ValidationState,
        done: impl FnOnce() -> bool,
    ) -> Probe {
        let current = self.commit(generation, |inner| {
            if progress == Progress::Report {
                inner.state = state;
            }
        });
        match current {
            None => Probe::Cancel,
            Some(()) if done() => Probe::Done,
            Some(()) => Probe::Pending,
        }
    }

    /// Record a terminal failure; only a batch run shows it as the state
    fn fail(&self, generation: u64, progress: Progress, error: DomainError) -> Interrupted {
        log::error!("Verification aborted: {}", error);
        match self.commit(generation, |inner| {
            if progress == Progress::Report {
                inner.state = ValidationState::Failed { message: error.to_string() };
            }
        }) {
            Some(()) => Interrupted::Failed(error),
            None => Interrupted::Superseded,
        }
    }
}

fn superseded() -> DomainError {
    DomainError::Conflict("The active POM or its snapshot changed".to_string())
}

fn active_with_snapshot(inner: &SessionInner) -> DomainResult<(u32, Vec<PomElement>, String)> {
    let active = inner
        .active
        .as_ref()
        .ok_or_else(|| DomainError::InvalidInput("No POM selected".to_string()))?;
    let html = active
        .html
        .clone()
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(|| DomainError::InvalidInput(format!("POM {} has no HTML snapshot", active.id)))?;
    Ok((active.id, active.elements.clone(), html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LocatorStrategy;
    use crate::verify::context::{ContextState, ContextStatus, ElementVerifier, RenderOptions};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const SNAPSHOT: &str = r#"<body><input id="a"><div class="card">x</div></body>"#;

    fn element(id: u32, locator: &str, value: &str) -> PomElement {
        let mut element = PomElement::new("input", &format!("el{}", id), LocatorStrategy::Id, value);
        element.id = id;
        element.locator = locator.to_string();
        element
    }

    fn pom(id: u32, html: Option<&str>, elements: Vec<PomElement>) -> Pom {
        let mut pom = Pom::new(id, format!("pom{}", id));
        pom.html_content = html.map(str::to_string);
        pom.elements = elements;
        pom
    }

    fn fast_policy() -> PollPolicy {
        PollPolicy { interval: Duration::from_millis(250), snapshot_attempts: 3, verifier_attempts: 4 }
    }

    /// Context answering from a fixed set of selectors
    struct FakeContext {
        matches: Vec<String>,
        state: ContextState,
        fingerprint: SnapshotFingerprint,
        delay: Duration,
    }

    #[async_trait]
    impl ElementVerifier for FakeContext {
        async fn verify(&self, selector: &str) -> VerifyOutcome {
            tokio::time::sleep(self.delay).await;
            if selector.contains("[[") {
                return VerifyOutcome::failed(selector, "Invalid selector");
            }
            VerifyOutcome::found(selector, self.matches.iter().any(|m| m == selector))
        }
    }

    #[async_trait]
    impl SnapshotContext for FakeContext {
        fn state(&self) -> ContextState {
            self.state
        }

        fn fingerprint(&self) -> &SnapshotFingerprint {
            &self.fingerprint
        }
    }

    struct FakeLoader {
        opens: AtomicUsize,
        state: ContextState,
        delay: Duration,
    }

    impl FakeLoader {
        fn with_state(status: ContextStatus, has_content: bool) -> Self {
            Self {
                opens: AtomicUsize::new(0),
                state: ContextState { status, has_content },
                delay: Duration::ZERO,
            }
        }

        fn ready() -> Self {
            Self::with_state(ContextStatus::Ready, true)
        }
    }

    impl ContextLoader for FakeLoader {
        fn open(&self, html: &str) -> DomainResult<Arc<dyn SnapshotContext>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeContext {
                matches: vec!["#a".to_string(), ".card".to_string()],
                state: self.state,
                fingerprint: SnapshotFingerprint::of(html),
                delay: self.delay,
            }))
        }
    }

    #[tokio::test]
    async fn test_batch_against_rendered_snapshot() {
        let session = ValidationSession::new(ThreadContextLoader::new(RenderOptions::default()), PollPolicy::default());
        session.select_pom(Some(&pom(
            1,
            Some(SNAPSHOT),
            vec![element(1, "Id", "a"), element(2, "Id", "missing"), element(3, "Id", "")],
        )));

        let BatchOutcome::Completed(report) = session.run().await.unwrap() else {
            panic!("run was superseded");
        };

        assert_eq!(report.pom_id, 1);
        assert_eq!(report.statuses, BTreeMap::from([(1, Some(true)), (2, Some(false))]));
        assert_eq!(report.summary, BatchSummary { found: 1, not_found: 1, skipped: 1, errors: 0 });
        assert_eq!(session.state(), ValidationState::Done(report.summary));
        assert_eq!(session.statuses(), report.statuses);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_count_as_not_found_and_are_marked() {
        let session = ValidationSession::new(FakeLoader::ready(), fast_policy());
        session.select_pom(Some(&pom(
            1,
            Some(SNAPSHOT),
            vec![element(1, "Css-selector", "div[["), element(2, "Class", "card"), element(3, "Unknown", "")],
        )));

        let BatchOutcome::Completed(report) = session.run().await.unwrap() else {
            panic!("run was superseded");
        };
        assert_eq!(report.statuses, BTreeMap::from([(1, None), (2, Some(true))]));
        assert_eq!(report.summary, BatchSummary { found: 1, not_found: 1, skipped: 1, errors: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_snapshot_is_not_reloaded() {
        let session = ValidationSession::new(FakeLoader::ready(), fast_policy());
        let mut active = pom(1, Some(SNAPSHOT), vec![element(1, "Id", "a")]);
        session.select_pom(Some(&active));

        session.run().await.unwrap();
        session.run().await.unwrap();
        assert_eq!(session.loader.opens.load(Ordering::SeqCst), 1);

        // Saving elements keeps the snapshot current
        active.elements.push(element(2, "Id", "b"));
        session.pom_updated(&active);
        session.run().await.unwrap();
        assert_eq!(session.loader.opens.load(Ordering::SeqCst), 1);

        // A new upload replaces it
        active.html_content = Some("<body><p id=\"b\"></p></body>".to_string());
        session.pom_updated(&active);
        assert_eq!(session.state(), ValidationState::Idle);
        session.run().await.unwrap();
        assert_eq!(session.loader.opens.load(Ordering::SeqCst), 2);

        // Switching POMs always reloads
        session.select_pom(Some(&active));
        session.run().await.unwrap();
        assert_eq!(session.loader.opens.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invisible_content_proceeds_best_effort() {
        let session = ValidationSession::new(FakeLoader::with_state(ContextStatus::Ready, false), fast_policy());
        session.select_pom(Some(&pom(1, Some(SNAPSHOT), vec![element(1, "Id", "a")])));

        let outcome = session.run().await.unwrap();
        assert!(matches!(outcome, BatchOutcome::Completed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_verifier_never_ready_aborts() {
        let session = ValidationSession::new(FakeLoader::with_state(ContextStatus::Loaded, true), fast_policy());
        session.select_pom(Some(&pom(1, Some(SNAPSHOT), vec![element(1, "Id", "a")])));

        let err = session.run().await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("4 attempts"));
        assert!(matches!(session.state(), ValidationState::Failed { .. }));
        assert!(session.statuses().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_pom_discards_stale_results() {
        let mut loader = FakeLoader::ready();
        loader.delay = Duration::from_millis(100);
        let session = Arc::new(ValidationSession::new(loader, fast_policy()));
        session.select_pom(Some(&pom(1, Some(SNAPSHOT), vec![element(1, "Id", "a"), element(2, "Id", "b")])));

        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.run().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let other = pom(2, Some(SNAPSHOT), vec![element(7, "Id", "a")]);
        session.select_pom(Some(&other));

        let outcome = running.await.unwrap().unwrap();
        assert_eq!(outcome, BatchOutcome::Superseded);
        assert_eq!(session.active_pom_id(), Some(2));
        assert!(session.statuses().is_empty());
        assert_eq!(session.state(), ValidationState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requires_selected_pom_with_snapshot() {
        let session = ValidationSession::new(FakeLoader::ready(), fast_policy());
        assert_eq!(session.run().await.unwrap_err().status_code(), 400);

        session.select_pom(Some(&pom(1, None, vec![element(1, "Id", "a")])));
        let err = session.run().await.unwrap_err();
        assert!(err.to_string().contains("no HTML snapshot"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_single_element() {
        let session = ValidationSession::new(FakeLoader::ready(), fast_policy());
        session.select_pom(Some(&pom(1, Some(SNAPSHOT), vec![element(1, "Id", "a"), element(2, "Name", "q")])));

        assert!(session.verify_element(1).await.unwrap().found);
        assert!(!session.verify_element(2).await.unwrap().found);
        assert_eq!(session.statuses(), BTreeMap::from([(1, Some(true)), (2, Some(false))]));
        assert_eq!(session.verify_element(99).await.unwrap_err().status_code(), 404);

        assert!(session.verify_selector(".card").await.unwrap().found);
        assert!(!session.verify_selector("").await.unwrap().found);
        // Ad-hoc lookups are not element results
        assert_eq!(session.statuses().len(), 2);
    }

    #[tokio::test]
    async fn test_preview_markup_shows_highlight() {
        let session = ValidationSession::new(ThreadContextLoader::new(RenderOptions::default()), PollPolicy::default());
        session.select_pom(Some(&pom(1, Some(SNAPSHOT), vec![element(1, "Id", "a")])));

        assert!(session.verify_element(1).await.unwrap().found);
        let markup = session.preview_markup().await.unwrap();
        assert!(markup.contains("class=\"highlight\""));
        assert!(markup.contains("card"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_lookup_keeps_batch_state() {
        let session = ValidationSession::new(FakeLoader::ready(), fast_policy());
        session.select_pom(Some(&pom(1, Some(SNAPSHOT), vec![element(1, "Id", "a"), element(2, "Id", "b")])));

        let BatchOutcome::Completed(report) = session.run().await.unwrap() else {
            panic!("run was superseded");
        };
        let done = ValidationState::Done(report.summary);
        assert_eq!(session.state(), done);

        assert!(session.verify_element(1).await.unwrap().found);
        assert!(session.verify_selector(".card").await.unwrap().found);
        assert_eq!(session.state(), done);
        assert_eq!(session.statuses(), report.statuses);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_lookup_before_any_run_stays_idle() {
        let session = ValidationSession::new(FakeLoader::with_state(ContextStatus::Loaded, true), fast_policy());
        session.select_pom(Some(&pom(1, Some(SNAPSHOT), vec![element(1, "Id", "a")])));

        // Verifier never becomes ready: the lookup fails but no batch failure is shown
        assert_eq!(session.verify_element(1).await.unwrap_err().status_code(), 500);
        assert_eq!(session.state(), ValidationState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_replaced_mid_run_discards_results() {
        let mut loader = FakeLoader::ready();
        loader.delay = Duration::from_millis(100);
        let session = Arc::new(ValidationSession::new(loader, fast_policy()));
        let mut active = pom(1, Some(SNAPSHOT), vec![element(1, "Id", "a"), element(2, "Id", "b")]);
        session.select_pom(Some(&active));

        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.run().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        active.html_content = Some("<body><p id=\"b\"></p></body>".to_string());
        session.pom_updated(&active);

        let outcome = running.await.unwrap().unwrap();
        assert_eq!(outcome, BatchOutcome::Superseded);
        assert_eq!(session.state(), ValidationState::Idle);
        assert!(session.statuses().is_empty());

        // The next run loads the new snapshot
        assert!(session.run().await.unwrap() != BatchOutcome::Superseded);
        assert_eq!(session.loader.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_element_save_keeps_statuses_of_listed_elements() {
        let session = ValidationSession::new(FakeLoader::ready(), fast_policy());
        let mut active = pom(1, Some(SNAPSHOT), vec![element(1, "Id", "a"), element(2, "Id", "b")]);
        session.select_pom(Some(&active));
        session.run().await.unwrap();

        active.elements.remove(1);
        active.elements.push(element(3, "Class", "card"));
        session.pom_updated(&active);

        assert_eq!(session.statuses(), BTreeMap::from([(1, Some(true))]));
        assert!(matches!(session.state(), ValidationState::Done(_)));
    }
}
