//! The generation pipeline: post text, visual prompt, image.
//!
//! A full run drafts the post, asks the text model to turn it into an English
//! visual prompt, then generates the image from that prompt. An image-only
//! run reuses existing post text and repeats the last two steps.
//!
//! ```text
//! Idle -> GeneratingText -> TranslatingPrompt -> GeneratingImage -> Done
//!   any state -> Error                      (terminal failure)
//!   any state -> RateLimited -> same run    (first 429 only)
//! ```
//!
//! A 429 from any call re-runs the same top-level operation once after
//! [`RetryPolicy::delay`]. The delay is a `tokio::time::sleep` inside the
//! returned future, so dropping the future cancels a pending retry and tests
//! can drive it on a paused clock.

use crate::credential_store::Credential;
use crate::error::{GenerationError, Result, ValidationError};
use crate::generation_client::{GeneratedImage, GenerationClient};
use crate::prompts;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

/// Pipeline position, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Progress(u8);

impl Progress {
    pub const START: Progress = Progress(0);
    pub const TEXT_DONE: Progress = Progress(33);
    pub const TRANSLATION_DONE: Progress = Progress(66);
    pub const IMAGE_DONE: Progress = Progress(100);

    pub fn percent(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    GeneratingText,
    TranslatingPrompt,
    GeneratingImage,
    RateLimited,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    State(PipelineState),
    Progress(Progress),
    /// Post text is available before the image is.
    TextReady(String),
    RetryScheduled { delay: Duration },
    Failed(GenerationError),
}

/// Receives pipeline events as they happen.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed per invocation chain after a 429.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_secs(30),
        }
    }
}

/// Output of a run, held in memory for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResult {
    pub text: String,
    pub image: Option<GeneratedImage>,
}

impl GenerationResult {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }
}

/// Clears the busy flag when a run ends or its future is dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Orchestrator<C: GenerationClient> {
    client: C,
    retry: RetryPolicy,
    observer: Arc<dyn PipelineObserver>,
    busy: AtomicBool,
    progress: AtomicU8,
    state: Mutex<PipelineState>,
}

impl<C: GenerationClient> Orchestrator<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            observer: Arc::new(NoopObserver),
            busy: AtomicBool::new(false),
            progress: AtomicU8::new(Progress::START.percent()),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn progress(&self) -> Progress {
        Progress(self.progress.load(Ordering::Acquire))
    }

    pub fn state(&self) -> PipelineState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(PipelineState::Error)
    }

    /// Drafts a post for `keyword` and generates its image.
    ///
    /// # Errors
    ///
    /// - [`ValidationError`] for a blank keyword or a missing credential,
    ///   before any remote call
    /// - [`GenerationError::Busy`] while another run is in flight
    /// - [`GenerationError::Provider`] for any remote failure other than a
    ///   first 429
    pub async fn run_full(
        &self,
        credential: Option<&Credential>,
        keyword: &str,
    ) -> Result<GenerationResult> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(self.reject(ValidationError::EmptyKeyword));
        }
        let credential = credential.ok_or_else(|| self.reject(ValidationError::MissingCredential))?;
        let _guard = self.acquire()?;

        info!("Starting full generation for keyword: {}", keyword);
        self.with_rate_limit_retry(move || self.full_pass(credential, keyword))
            .await
    }

    /// Replaces the image of `result`, keeping its text untouched.
    ///
    /// # Errors
    ///
    /// Same as [`Self::run_full`], with [`ValidationError::MissingText`] when
    /// `result.text` is blank.
    pub async fn regenerate_image(
        &self,
        credential: Option<&Credential>,
        result: &mut GenerationResult,
    ) -> Result<()> {
        if result.text.trim().is_empty() {
            return Err(self.reject(ValidationError::MissingText));
        }
        let credential = credential.ok_or_else(|| self.reject(ValidationError::MissingCredential))?;
        let _guard = self.acquire()?;

        info!("Regenerating image for existing post text");
        let text = result.text.as_str();
        let image = self
            .with_rate_limit_retry(move || self.image_pass(credential, text))
            .await?;
        result.image = Some(image);
        Ok(())
    }

    async fn full_pass(&self, credential: &Credential, keyword: &str) -> Result<GenerationResult> {
        self.set_progress(Progress::START);

        self.set_state(PipelineState::GeneratingText);
        let text = self
            .client
            .generate_text(credential, &prompts::tweet_prompt(keyword))
            .await?
            .trim()
            .to_string();
        self.emit(PipelineEvent::TextReady(text.clone()));
        self.set_progress(Progress::TEXT_DONE);

        let image = self.image_steps(credential, &text, true).await?;
        self.set_state(PipelineState::Done);

        Ok(GenerationResult {
            text,
            image: Some(image),
        })
    }

    async fn image_pass(&self, credential: &Credential, text: &str) -> Result<GeneratedImage> {
        let image = self.image_steps(credential, text, false).await?;
        self.set_state(PipelineState::Done);
        Ok(image)
    }

    /// Translation then image generation. Image-only runs do not report progress.
    async fn image_steps(
        &self,
        credential: &Credential,
        text: &str,
        track_progress: bool,
    ) -> Result<GeneratedImage> {
        self.set_state(PipelineState::TranslatingPrompt);
        let visual_prompt = self
            .client
            .generate_text(credential, &prompts::translation_prompt(text))
            .await?;
        if track_progress {
            self.set_progress(Progress::TRANSLATION_DONE);
        }

        self.set_state(PipelineState::GeneratingImage);
        let image = self
            .client
            .generate_image(credential, &visual_prompt)
            .await?;
        if track_progress {
            self.set_progress(Progress::IMAGE_DONE);
        }
        Ok(image)
    }

    /// Runs `attempt`, re-running it once after the retry delay on a 429.
    async fn with_rate_limit_retry<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limited() && retries < self.retry.max_retries => {
                    retries += 1;
                    warn!(
                        retry = retries,
                        delay_secs = self.retry.delay.as_secs(),
                        "rate limited, retrying: {e}"
                    );
                    self.set_state(PipelineState::RateLimited);
                    self.emit(PipelineEvent::RetryScheduled {
                        delay: self.retry.delay,
                    });
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => {
                    error!("Generation failed: {}", e);
                    self.set_state(PipelineState::Error);
                    self.emit(PipelineEvent::Failed(e.clone()));
                    return Err(e);
                }
            }
        }
    }

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Rejected generation request: another run is in flight");
            return Err(GenerationError::Busy);
        }
        Ok(BusyGuard(&self.busy))
    }

    fn reject(&self, err: ValidationError) -> GenerationError {
        let err = GenerationError::from(err);
        self.set_state(PipelineState::Error);
        self.emit(PipelineEvent::Failed(err.clone()));
        err
    }

    fn set_state(&self, state: PipelineState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
        self.emit(PipelineEvent::State(state));
    }

    fn set_progress(&self, progress: Progress) {
        self.progress.store(progress.percent(), Ordering::Release);
        self.emit(PipelineEvent::Progress(progress));
    }

    fn emit(&self, event: PipelineEvent) {
        self.observer.on_event(&event);
    }
}
