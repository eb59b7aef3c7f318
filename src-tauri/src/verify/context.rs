//! Rendering Context
//!
//! An isolated, script-free document built from a sanitized snapshot. The
//! parsed document lives on its own thread and is only reached through a
//! request channel; callers never share its state. Load progress is
//! published on a watch channel.

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};

use super::document::{compose_document, serialize_marked, Viewport};
use super::sanitize::sanitize;
use super::selector::Selector;
use super::url::BaseUrl;
use super::xpath::xpath_to_css;
use crate::domain::{DomainError, DomainResult, SnapshotFingerprint};

/// Lifecycle of a rendering context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextStatus {
    /// Snapshot is being sanitized and parsed
    Loading,
    /// Document parsed; lookups not served yet
    Loaded,
    /// Lookups are served
    Ready,
    /// Worker has stopped
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextState {
    pub status: ContextStatus,
    /// Whether the rendered body has any content
    pub has_content: bool,
}

impl ContextState {
    const LOADING: Self = Self { status: ContextStatus::Loading, has_content: false };

    /// Content is visible: parsed, with a non-empty body
    pub fn is_loaded(&self) -> bool {
        self.has_content && matches!(self.status, ContextStatus::Loaded | ContextStatus::Ready)
    }

    /// `verify` is served
    pub fn is_ready(&self) -> bool {
        self.status == ContextStatus::Ready
    }
}

/// Result of a single lookup. Failures never surface as errors: an invalid
/// selector or a timeout is `found: false` with a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub selector: String,
    pub found: bool,
    pub error: Option<String>,
}

impl VerifyOutcome {
    pub fn found(selector: &str, found: bool) -> Self {
        Self { selector: selector.to_string(), found, error: None }
    }

    pub fn failed(selector: &str, error: impl Into<String>) -> Self {
        Self { selector: selector.to_string(), found: false, error: Some(error.into()) }
    }

    /// `Some(found)` for a definite answer, `None` when indeterminate
    pub fn status(&self) -> Option<bool> {
        match self.error {
            Some(_) => None,
            None => Some(self.found),
        }
    }
}

/// Lookup timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Upper bound for one lookup round trip
    pub timeout: Duration,
    /// How long a found element stays highlighted
    pub highlight_duration: Duration,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            highlight_duration: Duration::from_millis(1500),
        }
    }
}

/// Everything needed to open a context
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub verify: VerifyOptions,
    pub base: BaseUrl,
    pub viewport: Option<Viewport>,
}

/// Something that can answer "does this selector match?"
#[async_trait]
pub trait ElementVerifier: Send + Sync {
    async fn verify(&self, selector: &str) -> VerifyOutcome;
}

/// A verifier bound to one loaded snapshot
#[async_trait]
pub trait SnapshotContext: ElementVerifier {
    fn state(&self) -> ContextState;

    /// Fingerprint of the raw snapshot this context was opened with
    fn fingerprint(&self) -> &SnapshotFingerprint;

    /// Change notifications, when the context can provide them
    fn subscribe(&self) -> Option<watch::Receiver<ContextState>> {
        None
    }

    /// Rendered document with current highlights
    async fn markup(&self) -> DomainResult<String> {
        Err(DomainError::Internal("Preview markup is not available".to_string()))
    }
}

/// Opens rendering contexts
pub trait ContextLoader: Send + Sync {
    fn open(&self, html: &str) -> DomainResult<Arc<dyn SnapshotContext>>;
}

enum Request {
    Verify { selector: String, reply: oneshot::Sender<VerifyOutcome> },
    Highlight { selector: String },
    RemoveHighlight { selector: String },
    Markup { reply: oneshot::Sender<String> },
}

/// Handle to a rendering context worker. Dropping it stops the worker.
pub struct RenderContext {
    requests: mpsc::Sender<Request>,
    state: watch::Receiver<ContextState>,
    fingerprint: SnapshotFingerprint,
    options: VerifyOptions,
}

impl RenderContext {
    pub fn open(html: &str, options: RenderOptions) -> DomainResult<Self> {
        let fingerprint = SnapshotFingerprint::of(html);
        let (requests, inbox) = mpsc::channel();
        let (state_tx, state) = watch::channel(ContextState::LOADING);
        let verify = options.verify;
        let html = html.to_string();

        thread::Builder::new()
            .name(format!("render-context-{}", fingerprint))
            .spawn(move || run_worker(html, options, inbox, state_tx))
            .map_err(|e| DomainError::Internal(format!("Failed to start rendering context: {}", e)))?;

        log::debug!("Opened rendering context for snapshot {}", fingerprint);
        Ok(Self { requests, state, fingerprint, options: verify })
    }

    pub fn state(&self) -> ContextState {
        *self.state.borrow()
    }

    /// Highlight the first match until `remove_highlight` or expiry
    pub fn highlight(&self, selector: &str) {
        let _ = self.requests.send(Request::Highlight { selector: selector.to_string() });
    }

    pub fn remove_highlight(&self, selector: &str) {
        let _ = self.requests.send(Request::RemoveHighlight { selector: selector.to_string() });
    }

    /// Current document, with highlight classes applied
    pub async fn markup(&self) -> DomainResult<String> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Markup { reply })
            .map_err(|_| DomainError::Internal("Rendering context is closed".to_string()))?;

        match tokio::time::timeout(self.options.timeout, response).await {
            Ok(Ok(markup)) => Ok(markup),
            Ok(Err(_)) => Err(DomainError::Internal("Rendering context is closed".to_string())),
            Err(_) => Err(DomainError::Internal("Rendering context did not respond".to_string())),
        }
    }
}

#[async_trait]
impl ElementVerifier for RenderContext {
    async fn verify(&self, selector: &str) -> VerifyOutcome {
        if selector.trim().is_empty() {
            return VerifyOutcome::found(selector, false);
        }

        let (reply, response) = oneshot::channel();
        let request = Request::Verify { selector: selector.to_string(), reply };
        if self.requests.send(request).is_err() {
            return VerifyOutcome::failed(selector, "Rendering context is closed");
        }

        match tokio::time::timeout(self.options.timeout, response).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => VerifyOutcome::failed(selector, "Rendering context is closed"),
            Err(_) => {
                log::warn!("Verification of '{}' timed out", selector);
                VerifyOutcome::failed(
                    selector,
                    format!("Verification timed out after {} ms", self.options.timeout.as_millis()),
                )
            }
        }
    }
}

#[async_trait]
impl SnapshotContext for RenderContext {
    fn state(&self) -> ContextState {
        RenderContext::state(self)
    }

    fn fingerprint(&self) -> &SnapshotFingerprint {
        &self.fingerprint
    }

    fn subscribe(&self) -> Option<watch::Receiver<ContextState>> {
        Some(self.state.clone())
    }

    async fn markup(&self) -> DomainResult<String> {
        RenderContext::markup(self).await
    }
}

/// Opens thread-backed contexts with fixed options
#[derive(Debug, Clone, Default)]
pub struct ThreadContextLoader {
    options: RenderOptions,
}

impl ThreadContextLoader {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl ContextLoader for ThreadContextLoader {
    fn open(&self, html: &str) -> DomainResult<Arc<dyn SnapshotContext>> {
        let context = RenderContext::open(html, self.options.clone())?;
        Ok(Arc::new(context))
    }
}

/// Translate a generated selector into a CSS selector the document understands
fn compile(selector: &str) -> Result<Option<scraper::Selector>, String> {
    let css = match Selector::parse(selector) {
        None => return Ok(None),
        Some(Selector::Css(css)) => css,
        Some(Selector::XPath(xpath)) => xpath_to_css(&xpath).map_err(|e| e.to_string())?,
    };
    scraper::Selector::parse(&css)
        .map(Some)
        .map_err(|e| format!("Invalid selector '{}': {}", selector, e))
}

fn first_match<'a>(document: &'a Html, selector: &str) -> Result<Option<ElementRef<'a>>, String> {
    Ok(compile(selector)?.and_then(|compiled| document.select(&compiled).next()))
}

fn run_worker(
    html: String,
    options: RenderOptions,
    inbox: mpsc::Receiver<Request>,
    state: watch::Sender<ContextState>,
) {
    let snapshot = sanitize(&html, &options.base);
    let has_content = !snapshot.is_empty();
    let document = Html::parse_document(&compose_document(&snapshot, options.viewport.as_ref()));
    drop(html);

    state.send_replace(ContextState { status: ContextStatus::Loaded, has_content });
    state.send_replace(ContextState { status: ContextStatus::Ready, has_content });

    // Highlighted selectors and when they expire
    let mut highlights: HashMap<String, Instant> = HashMap::new();
    let highlight_for = options.verify.highlight_duration;

    loop {
        let now = Instant::now();
        highlights.retain(|_, expiry| *expiry > now);

        let received = match highlights.values().min().copied() {
            Some(expiry) => inbox.recv_timeout(expiry.saturating_duration_since(Instant::now())),
            None => inbox.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Request::Verify { selector, reply }) => {
                let outcome = match first_match(&document, &selector) {
                    Ok(Some(_)) => {
                        highlights.insert(selector.clone(), Instant::now() + highlight_for);
                        VerifyOutcome::found(&selector, true)
                    }
                    Ok(None) => VerifyOutcome::found(&selector, false),
                    Err(message) => VerifyOutcome::failed(&selector, message),
                };
                let _ = reply.send(outcome);
            }
            Ok(Request::Highlight { selector }) => {
                highlights.insert(selector, Instant::now() + highlight_for);
            }
            Ok(Request::RemoveHighlight { selector }) => {
                highlights.remove(&selector);
            }
            Ok(Request::Markup { reply }) => {
                let marked: Vec<ElementRef<'_>> = highlights
                    .keys()
                    .filter_map(|selector| first_match(&document, selector).ok().flatten())
                    .collect();
                let _ = reply.send(serialize_marked(&document, &marked));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    state.send_replace(ContextState { status: ContextStatus::Closed, has_content });
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"<html><head><script>alert(1)</script></head>
        <body><form><input id="user" name="user"><button class="btn primary">Go</button></form>
        <ul><li>one</li><li>two</li></ul></body></html>"#;

    fn options() -> RenderOptions {
        RenderOptions {
            verify: VerifyOptions {
                timeout: Duration::from_secs(5),
                highlight_duration: Duration::from_millis(100),
            },
            ..Default::default()
        }
    }

    async fn ready(html: &str, options: RenderOptions) -> RenderContext {
        let context = RenderContext::open(html, options).unwrap();
        let mut state = context.subscribe().unwrap();
        state.wait_for(|s| s.is_ready()).await.unwrap();
        context
    }

    #[tokio::test]
    async fn test_verify_found_and_missing() {
        let context = ready(SNAPSHOT, options()).await;
        assert!(context.state().is_loaded());

        assert!(context.verify("#user").await.found);
        assert!(context.verify("[name='user']").await.found);
        assert!(context.verify(".primary").await.found);
        let missing = context.verify("#nonexistent").await;
        assert!(!missing.found);
        assert_eq!(missing.status(), Some(false));
    }

    #[tokio::test]
    async fn test_empty_selector_short_circuits() {
        let context = ready(SNAPSHOT, options()).await;
        let outcome = context.verify("").await;
        assert!(!outcome.found);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_selector_is_safe_false() {
        let context = ready(SNAPSHOT, options()).await;
        let outcome = context.verify("div[[").await;
        assert!(!outcome.found);
        assert!(outcome.error.is_some());
        assert_eq!(outcome.status(), None);

        // The context keeps serving after a bad selector
        assert!(context.verify("#user").await.found);
    }

    #[tokio::test]
    async fn test_xpath_lookup() {
        let context = ready(SNAPSHOT, options()).await;
        assert!(context.verify("//form/button[contains(@class,'primary')]").await.found);
        assert!(context.verify("//ul/li[2]").await.found);
        assert!(!context.verify("//ul/li[3]").await.found);

        let unsupported = context.verify("//li[text()='one']").await;
        assert!(!unsupported.found);
        assert!(unsupported.error.unwrap().contains("Unsupported XPath"));
    }

    #[tokio::test]
    async fn test_scripts_never_reach_the_document() {
        let context = ready(SNAPSHOT, options()).await;
        assert!(!context.verify("script").await.found);
        let markup = context.markup().await.unwrap();
        assert!(!markup.contains("alert"));
    }

    #[tokio::test]
    async fn test_highlight_expires() {
        let context = ready(SNAPSHOT, options()).await;
        assert!(context.verify("#user").await.found);
        assert!(context.markup().await.unwrap().contains("class=\"highlight\""));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!context.markup().await.unwrap().contains("class=\"highlight\""));

        context.highlight(".primary");
        assert!(context.markup().await.unwrap().contains("btn primary highlight"));
        context.remove_highlight(".primary");
        assert!(!context.markup().await.unwrap().contains("primary highlight"));
    }

    #[tokio::test]
    async fn test_empty_body_never_counts_as_loaded() {
        let context = ready("<script>only()</script>", options()).await;
        assert!(context.state().is_ready());
        assert!(!context.state().is_loaded());
    }

    #[tokio::test]
    async fn test_fingerprint_tracks_raw_snapshot() {
        let context = ready(SNAPSHOT, options()).await;
        assert_eq!(context.fingerprint(), &SnapshotFingerprint::of(SNAPSHOT));
    }

    #[tokio::test]
    async fn test_loader_opens_contexts() {
        let loader = ThreadContextLoader::new(options());
        let context = loader.open(SNAPSHOT).unwrap();
        let mut state = context.subscribe().unwrap();
        state.wait_for(|s| s.is_ready()).await.unwrap();
        assert!(context.verify("#user").await.found);
    }

    /// A context whose worker accepts requests but never answers
    fn unresponsive(timeout: Duration) -> (RenderContext, mpsc::Receiver<Request>) {
        let (requests, inbox) = mpsc::channel();
        let (_, state) = watch::channel(ContextState { status: ContextStatus::Ready, has_content: true });
        let context = RenderContext {
            requests,
            state,
            fingerprint: SnapshotFingerprint::of(SNAPSHOT),
            options: VerifyOptions { timeout, ..Default::default() },
        };
        (context, inbox)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_lookup_resolves_not_found_at_timeout() {
        let (context, _inbox) = unresponsive(Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        let outcome = context.verify("#nonexistent").await;

        assert!(!outcome.found);
        assert_eq!(outcome.status(), None);
        assert!(outcome.error.as_deref().is_some_and(|e| e.contains("timed out after 5000 ms")));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_markup_reports_no_response() {
        let (context, _inbox) = unresponsive(Duration::from_secs(2));

        let err = context.markup().await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("did not respond"));
    }
}
