//! Consent coordinator: keeps the local record and the remote endpoint in
//! agreement.
//!
//! ## Write protocol
//!
//! 1. A new decision is persisted as one record write: status, `now`,
//!    `remotely_synced = false`, `revision + 1`.
//! 2. The remote send runs on a spawned task returned as a [`SyncTask`].
//! 3. Sends are serialized. Each send re-reads the record once it holds the
//!    send lock and skips if the status it was asked to send is no longer
//!    current.
//! 4. An acknowledgment sets `remotely_synced` only if the stored revision,
//!    status and timestamp are still the ones that were transmitted. Stale
//!    acknowledgments are dropped and reported as [`SyncOutcome::Superseded`].
//! 5. Clearing stores an undecided record with the next revision, so the
//!    revision never repeats.
//!
//! Store reads and writes made from async code run on the blocking pool.
//!
//! ## Startup
//!
//! [`ConsentCoordinator::initialize_and_reconcile`] prompts when no decision
//! exists, resends in the background (with [`RetryPolicy`] backoff) when the
//! last decision was never acknowledged, and does nothing otherwise.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use consent_core::{Config, ConsentRecord, ConsentStatus, ConsentStore, ConsentTransmission};

use crate::error::SyncError;
use crate::identity::{provider_from_config, DeviceIdProvider};
use crate::retry::RetryPolicy;
use crate::sink::{ConsentSink, HttpSink};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// How a synchronization attempt ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The remote acknowledged the current record; `remotely_synced` is now true.
    Synced,
    /// A newer decision replaced the one this attempt was carrying.
    Superseded,
    /// Nothing needed sending.
    UpToDate,
}

/// Handle to a background synchronization.
///
/// Dropping it detaches the task; the task still runs and logs its failure.
#[derive(Debug)]
pub struct SyncTask {
    handle: JoinHandle<Result<SyncOutcome, SyncError>>,
}

impl SyncTask {
    /// Wait for the task and return its result.
    pub async fn wait(self) -> Result<SyncOutcome, SyncError> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(SyncError::Task("aborted".to_string())),
            Err(err) => Err(SyncError::Task(err.to_string())),
        }
    }

    /// Cancel the task at its next suspension point. The local record keeps
    /// whatever state it had reached.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// What [`ConsentCoordinator::initialize_and_reconcile`] decided.
#[derive(Debug)]
pub enum Startup {
    /// No decision stored; the prompt was shown. Holds the sync started by the
    /// user's answer, or `None` if the prompt was dismissed.
    Prompted(Option<SyncTask>),
    /// A stored decision was never acknowledged; a resend is running.
    Reconciling(SyncTask),
    /// Stored decision already acknowledged.
    UpToDate,
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Text shown when asking the user for a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub title: String,
    pub message: String,
}

impl PromptRequest {
    pub fn from_config(config: &Config) -> Self {
        Self {
            title: config.prompt_title(),
            message: config.prompt_message(),
        }
    }
}

impl Default for PromptRequest {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Asks the user for a consent decision.
///
/// Returns `None` when the user dismissed the prompt without choosing.
pub trait PresentationTrigger {
    fn prompt(&self, request: &PromptRequest) -> Option<ConsentStatus>;
}

impl<F> PresentationTrigger for F
where
    F: Fn(&PromptRequest) -> Option<ConsentStatus>,
{
    fn prompt(&self, request: &PromptRequest) -> Option<ConsentStatus> {
        self(request)
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Epoch-millisecond clock.
pub type Clock = fn() -> i64;

fn system_clock() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

struct Inner {
    store: Arc<dyn ConsentStore>,
    ids: Arc<dyn DeviceIdProvider>,
    sink: Arc<dyn ConsentSink>,
    retry: RetryPolicy,
    prompt: PromptRequest,
    clock: Clock,
    /// Guards read-modify-write of the stored record.
    state: Mutex<()>,
    /// Serializes remote sends.
    send: tokio::sync::Mutex<()>,
}

/// Owns the consent policy. Cheap to clone; clones share state and locks.
#[derive(Clone)]
pub struct ConsentCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConsentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentCoordinator")
            .field("retry", &self.inner.retry)
            .field("prompt", &self.inner.prompt)
            .finish_non_exhaustive()
    }
}

pub struct CoordinatorBuilder {
    store: Arc<dyn ConsentStore>,
    ids: Arc<dyn DeviceIdProvider>,
    sink: Arc<dyn ConsentSink>,
    retry: RetryPolicy,
    prompt: PromptRequest,
    clock: Clock,
}

impl CoordinatorBuilder {
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn prompt(mut self, prompt: PromptRequest) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> ConsentCoordinator {
        ConsentCoordinator {
            inner: Arc::new(Inner {
                store: self.store,
                ids: self.ids,
                sink: self.sink,
                retry: self.retry,
                prompt: self.prompt,
                clock: self.clock,
                state: Mutex::new(()),
                send: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

impl ConsentCoordinator {
    pub fn builder(
        store: Arc<dyn ConsentStore>,
        ids: Arc<dyn DeviceIdProvider>,
        sink: Arc<dyn ConsentSink>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder {
            store,
            ids,
            sink,
            retry: RetryPolicy::default(),
            prompt: PromptRequest::default(),
            clock: system_clock,
        }
    }

    pub fn new(
        store: Arc<dyn ConsentStore>,
        ids: Arc<dyn DeviceIdProvider>,
        sink: Arc<dyn ConsentSink>,
    ) -> Self {
        Self::builder(store, ids, sink).build()
    }

    /// Wire an HTTP sink, the configured identifier provider, retry policy and
    /// prompt text around `store`.
    pub fn from_config(config: &Config, store: Arc<dyn ConsentStore>) -> Self {
        Self::builder(
            store,
            Arc::from(provider_from_config(config)),
            Arc::new(HttpSink::from_config(config)),
        )
        .retry(RetryPolicy::from(&config.retry))
        .prompt(PromptRequest::from_config(config))
        .build()
    }

    // -- reads ---------------------------------------------------------------

    /// The stored record. An unreadable store reads as the default record.
    pub fn record(&self) -> ConsentRecord {
        match self.inner.store.load() {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "consent state unreadable; treating as undefined");
                ConsentRecord::default()
            }
        }
    }

    pub fn status(&self) -> ConsentStatus {
        self.record().status
    }

    pub fn is_synced(&self) -> bool {
        self.record().remotely_synced
    }

    // -- writes --------------------------------------------------------------

    /// Record a user decision locally and start sending it.
    ///
    /// The local record is updated before this returns. Fails without
    /// touching the store for `Undefined`, and when called outside a tokio
    /// runtime.
    pub fn set_status(&self, status: ConsentStatus) -> Result<SyncTask, SyncError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Task(format!("no async runtime: {e}")))?;
        self.persist(status)?;

        let this = self.clone();
        let handle = runtime.spawn(async move { this.send_logged(status).await });
        Ok(SyncTask { handle })
    }

    /// [`set_status`](Self::set_status) and wait for the send, on the caller's task.
    pub async fn update(&self, status: ConsentStatus) -> Result<SyncOutcome, SyncError> {
        self.with_store(move |this| this.persist(status)).await?;
        self.send_logged(status).await
    }

    /// Forget the stored decision.
    ///
    /// Stores an undecided record rather than deleting the file, so the
    /// revision keeps increasing across clears.
    pub fn clear(&self) -> Result<(), SyncError> {
        let _guard = self.state_guard();
        let cleared = self.record().cleared();
        self.inner.store.save(&cleared)?;
        tracing::info!(revision = cleared.revision, "consent state cleared");
        Ok(())
    }

    /// Send `status` with the stored timestamp, once.
    ///
    /// Returns `Superseded` without any network activity if `status` is no
    /// longer the stored decision.
    pub async fn send_to_remote(&self, status: ConsentStatus) -> Result<SyncOutcome, SyncError> {
        if !status.is_defined() {
            return Err(SyncError::UndefinedStatus);
        }
        let _send = self.inner.send.lock().await;

        let sent = self.with_store(|this| Ok(this.inner.store.load()?)).await?;
        if sent.status != status {
            tracing::debug!(%status, current = %sent.status, "skipping send of replaced decision");
            return Ok(SyncOutcome::Superseded);
        }

        let device_id = self.inner.ids.fetch().await?;
        let payload = ConsentTransmission::new(status, device_id, sent.updated_at_ms)?;
        let response = self.inner.sink.submit(&payload).await?;
        if !response.succeeded() {
            return Err(SyncError::RemoteRejected {
                status_code: response.status_code,
            });
        }

        self.with_store(move |this| this.mark_synced(&sent)).await
    }

    /// Resend the stored decision until acknowledged, superseded, or the retry
    /// policy gives up.
    pub async fn reconcile(&self) -> Result<SyncOutcome, SyncError> {
        let policy = self.inner.retry;
        let mut attempt = 1;
        loop {
            let record = self.with_store(|this| Ok(this.record())).await?;
            if !record.status.is_defined() || record.remotely_synced {
                return Ok(SyncOutcome::UpToDate);
            }

            match self.send_to_remote(record.status).await {
                Ok(outcome) => {
                    tracing::info!(status = %record.status, attempt, ?outcome, "reconciliation finished");
                    return Ok(outcome);
                }
                Err(err) if err.is_retryable() && attempt < policy.attempts() => {
                    let delay = policy.backoff(attempt);
                    tracing::warn!(
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "reconciliation attempt failed; retrying",
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(error = %err, attempts = attempt, "reconciliation gave up");
                    return Err(err);
                }
            }
        }
    }

    // -- startup -------------------------------------------------------------

    /// Decide what startup needs: prompt, resend, or nothing.
    pub fn initialize_and_reconcile(
        &self,
        trigger: &dyn PresentationTrigger,
    ) -> Result<Startup, SyncError> {
        let record = self.record();
        if !record.status.is_defined() {
            tracing::debug!("no consent decision stored; prompting");
            let task = self.prompt_with(trigger, self.inner.prompt.clone())?;
            return Ok(Startup::Prompted(task));
        }
        if record.remotely_synced {
            return Ok(Startup::UpToDate);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Task(format!("no async runtime: {e}")))?;
        tracing::info!(status = %record.status, "stored consent not acknowledged; resending");
        let this = self.clone();
        let handle = runtime.spawn(async move { this.reconcile().await });
        Ok(Startup::Reconciling(SyncTask { handle }))
    }

    /// Show the prompt regardless of stored state. `title`/`message` replace
    /// the configured text when given.
    pub fn show_prompt(
        &self,
        trigger: &dyn PresentationTrigger,
        title: Option<&str>,
        message: Option<&str>,
    ) -> Result<Option<SyncTask>, SyncError> {
        let mut request = self.inner.prompt.clone();
        if let Some(title) = title {
            request.title = title.to_string();
        }
        if let Some(message) = message {
            request.message = message.to_string();
        }
        self.prompt_with(trigger, request)
    }

    // -- internals -----------------------------------------------------------

    fn prompt_with(
        &self,
        trigger: &dyn PresentationTrigger,
        request: PromptRequest,
    ) -> Result<Option<SyncTask>, SyncError> {
        match trigger.prompt(&request) {
            Some(status) if status.is_defined() => self.set_status(status).map(Some),
            _ => {
                tracing::debug!("consent prompt dismissed");
                Ok(None)
            }
        }
    }

    fn persist(&self, status: ConsentStatus) -> Result<ConsentRecord, SyncError> {
        if !status.is_defined() {
            return Err(SyncError::UndefinedStatus);
        }
        let _guard = self.state_guard();
        let current = self.record();
        let next = current.next(status, (self.inner.clock)());
        self.inner.store.save(&next)?;
        tracing::info!(%status, revision = next.revision, "consent decision stored");
        Ok(next)
    }

    fn mark_synced(&self, sent: &ConsentRecord) -> Result<SyncOutcome, SyncError> {
        let _guard = self.state_guard();
        let current = self.inner.store.load()?;
        if current.revision != sent.revision
            || current.status != sent.status
            || current.updated_at_ms != sent.updated_at_ms
        {
            tracing::debug!(
                sent_revision = sent.revision,
                current_revision = current.revision,
                "acknowledgment arrived for a replaced decision"
            );
            return Ok(SyncOutcome::Superseded);
        }
        self.inner.store.save(&current.synced())?;
        tracing::info!(status = %current.status, revision = current.revision, "consent acknowledged by remote");
        Ok(SyncOutcome::Synced)
    }

    async fn send_logged(&self, status: ConsentStatus) -> Result<SyncOutcome, SyncError> {
        let result = self.send_to_remote(status).await;
        if let Err(err) = &result {
            tracing::warn!(%status, error = %err, "failed to send consent");
        }
        result
    }

    /// Run blocking store work off the async workers.
    async fn with_store<T, F>(&self, f: F) -> Result<T, SyncError>
    where
        F: FnOnce(&ConsentCoordinator) -> Result<T, SyncError> + Send + 'static,
        T: Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(&this))
            .await
            .map_err(|e| SyncError::Task(format!("store task failed: {e}")))?
    }

    fn state_guard(&self) -> MutexGuard<'_, ()> {
        self.inner.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}
