//! services/api/src/composer/controller.rs
//!
//! The orchestrator between the presentation layer, the text-generation client,
//! the delivery client and the settings store. It owns the draft, the config and
//! the status machines:
//!
//! - sending: `Idle -> Sending -> (Success | Error) -> Idle`, the final step on a
//!   timer (2s after success, 3s after failure).
//! - AI: `Idle -> Thinking -> Idle`, back to idle whatever the outcome.
//!
//! No lock is held across a network call. Guards are checked and the status flipped
//! in one critical section, which gives the at-most-one-in-flight behaviour the
//! disabled buttons give in a browser. Once a status has left idle, the network call
//! and the transition that follows it run on a spawned task, so a caller that goes
//! away mid-request cannot strand the status.

use crate::composer::state::{
    ComposerSnapshot, ComposerState, Timings, AI_FAILURE_MESSAGE, SEND_FAILURE_MESSAGE,
    SEND_SUCCESS_MESSAGE,
};
use crate::composer::timer;
use mailer_core::domain::{AiStatus, Notification, SendingStatus, Tone, WorkerConfig};
use mailer_core::ports::{
    DeliveryService, PortError, PortResult, SettingsStore, TextGenerationService,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinError;
use tracing::{error, info, warn};

//=========================================================================================
// Errors and Outcomes
//=========================================================================================

/// Why a request was refused without changing any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("a send is already in progress")]
    SendingBusy,
    #[error("the draft body is empty")]
    EmptyBody,
    #[error("the prompt is empty")]
    EmptyPrompt,
    #[error("an AI request is already in progress")]
    AiBusy,
}

#[derive(Debug, thiserror::Error)]
pub enum ComposerError {
    #[error("Request rejected: {0}")]
    Rejected(#[from] RejectReason),

    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    #[error("Background task failed: {0}")]
    Task(#[from] JoinError),
}

/// How a send attempt settled. Failures are already folded into status and
/// notification by the time this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Failed,
}

/// How a generation or refinement settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiOutcome {
    BodyReplaced,
    Failed,
}

//=========================================================================================
// The Composer
//=========================================================================================

struct Inner {
    state: Mutex<ComposerState>,
    generator: Arc<dyn TextGenerationService>,
    delivery: Arc<dyn DeliveryService>,
    settings: Arc<dyn SettingsStore>,
    snapshots: watch::Sender<ComposerSnapshot>,
    // Held from applying a configuration until it is persisted.
    saving: Mutex<()>,
    timings: Timings,
}

impl Inner {
    fn publish(&self, state: &ComposerState) {
        self.snapshots.send_replace(state.snapshot());
    }
}

/// A cheaply cloneable handle to one composing session.
#[derive(Clone)]
pub struct Composer {
    inner: Arc<Inner>,
}

impl Composer {
    /// Creates a composer with an already-known configuration.
    pub fn new(
        generator: Arc<dyn TextGenerationService>,
        delivery: Arc<dyn DeliveryService>,
        settings: Arc<dyn SettingsStore>,
        config: WorkerConfig,
        timings: Timings,
    ) -> Self {
        let state = ComposerState::new(config);
        let (snapshots, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                generator,
                delivery,
                settings,
                snapshots,
                saving: Mutex::new(()),
                timings,
            }),
        }
    }

    /// Creates a composer whose configuration is read from the settings store.
    /// An unreadable store starts the session unconfigured.
    pub async fn load(
        generator: Arc<dyn TextGenerationService>,
        delivery: Arc<dyn DeliveryService>,
        settings: Arc<dyn SettingsStore>,
        timings: Timings,
    ) -> Self {
        let config = match settings.load().await {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load settings, starting unconfigured: {}", e);
                WorkerConfig::default()
            }
        };
        info!(configured = config.is_configured(), "Composer settings loaded.");
        Self::new(generator, delivery, settings, config, timings)
    }

    pub fn snapshot(&self) -> ComposerSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Receives a new snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ComposerSnapshot> {
        self.inner.snapshots.subscribe()
    }

    //-------------------------------------------------------------------------------------
    // State helpers
    //-------------------------------------------------------------------------------------

    /// Applies `f` under the lock and publishes the result.
    async fn update<R>(&self, f: impl FnOnce(&mut ComposerState) -> R) -> R {
        let mut state = self.inner.state.lock().await;
        let result = f(&mut *state);
        self.inner.publish(&state);
        result
    }

    /// Like `update`, but a rejection leaves the state untouched and unpublished.
    async fn try_update<R>(
        &self,
        f: impl FnOnce(&mut ComposerState) -> Result<R, RejectReason>,
    ) -> Result<R, ComposerError> {
        let mut state = self.inner.state.lock().await;
        let result = f(&mut *state)?;
        self.inner.publish(&state);
        Ok(result)
    }

    fn schedule_status_reset(&self, state: &mut ComposerState, delay: Duration) {
        let token = state.status_reset.arm();
        let inner = Arc::clone(&self.inner);
        let guard = token.clone();
        timer::schedule(token, delay, async move {
            let mut state = inner.state.lock().await;
            if guard.is_cancelled() {
                return;
            }
            state.sending_status = SendingStatus::Idle;
            inner.publish(&state);
        });
    }

    /// Shows `notification`, replacing any visible one along with its dismissal timer.
    fn show_notification(&self, state: &mut ComposerState, notification: Notification) {
        let id = notification.id;
        state.notification = Some(notification);

        let token = state.notification_dismissal.arm();
        let inner = Arc::clone(&self.inner);
        let guard = token.clone();
        timer::schedule(token, self.inner.timings.notification, async move {
            let mut state = inner.state.lock().await;
            if guard.is_cancelled() || state.notification.as_ref().map(|n| n.id) != Some(id) {
                return;
            }
            state.notification = None;
            inner.publish(&state);
        });
    }

    //-------------------------------------------------------------------------------------
    // Draft editing
    //-------------------------------------------------------------------------------------

    pub async fn set_subject(&self, subject: impl Into<String>) -> ComposerSnapshot {
        let subject = subject.into();
        self.update(|state| {
            state.draft.set_subject(subject);
            state.snapshot()
        })
        .await
    }

    pub async fn set_body(&self, body: impl Into<String>) -> ComposerSnapshot {
        let body = body.into();
        self.update(|state| {
            state.draft.set_body(body);
            state.snapshot()
        })
        .await
    }

    /// Empties the draft whatever the sending or AI status.
    pub async fn clear_draft(&self) -> ComposerSnapshot {
        self.update(|state| {
            state.draft.clear();
            state.snapshot()
        })
        .await
    }

    //-------------------------------------------------------------------------------------
    // Settings
    //-------------------------------------------------------------------------------------

    pub async fn open_settings(&self) -> ComposerSnapshot {
        self.update(|state| {
            state.settings_open = true;
            state.snapshot()
        })
        .await
    }

    pub async fn close_settings(&self) -> ComposerSnapshot {
        self.update(|state| {
            state.settings_open = false;
            state.snapshot()
        })
        .await
    }

    /// Replaces the configuration used by subsequent sends, closes the settings
    /// dialog and persists the new values.
    ///
    /// The in-memory configuration is updated even when persisting fails. Saves are
    /// serialized, so the last configuration applied is also the last one written.
    pub async fn save_settings(&self, config: WorkerConfig) -> Result<ComposerSnapshot, ComposerError> {
        let _saving = self.inner.saving.lock().await;
        let snapshot = self
            .update(|state| {
                state.config = config.clone();
                state.settings_open = false;
                state.snapshot()
            })
            .await;

        self.inner.settings.save(&config).await.map_err(|e| {
            error!("Failed to persist settings: {}", e);
            ComposerError::Port(e)
        })?;

        info!(configured = config.is_configured(), "Settings saved.");
        Ok(snapshot)
    }

    //-------------------------------------------------------------------------------------
    // Delivery
    //-------------------------------------------------------------------------------------

    /// Sends the current draft with the current configuration.
    ///
    /// Rejected while a previous attempt has not returned to idle, or while the body
    /// is empty. Otherwise the call settles once the delivery client does; dropping
    /// the returned future does not cancel the delivery.
    pub async fn request_send(&self) -> Result<SendOutcome, ComposerError> {
        let (draft, config) = self
            .try_update(|state| {
                if state.sending_status != SendingStatus::Idle {
                    return Err(RejectReason::SendingBusy);
                }
                if !state.draft.is_sendable() {
                    return Err(RejectReason::EmptyBody);
                }
                state.sending_status = SendingStatus::Sending;
                Ok((state.draft.clone(), state.config.clone()))
            })
            .await?;

        info!(configured = config.is_configured(), "Sending draft.");
        let composer = self.clone();
        let delivery = tokio::spawn(async move {
            let result = composer.inner.delivery.send(&draft, &config).await;
            composer.finish_send(result).await
        });
        Ok(delivery.await?)
    }

    /// Moves the sending status to success or error and arms its reset.
    async fn finish_send(&self, result: PortResult<()>) -> SendOutcome {
        let timings = self.inner.timings;
        self.update(|state| match result {
            Ok(()) => {
                state.sending_status = SendingStatus::Success;
                self.show_notification(state, Notification::success(SEND_SUCCESS_MESSAGE));
                self.schedule_status_reset(state, timings.success_reset);
                SendOutcome::Delivered
            }
            Err(e) => {
                error!("Failed to send draft: {}", e);
                state.sending_status = SendingStatus::Error;
                self.show_notification(state, Notification::error(SEND_FAILURE_MESSAGE));
                self.schedule_status_reset(state, timings.error_reset);
                SendOutcome::Failed
            }
        })
        .await
    }

    //-------------------------------------------------------------------------------------
    // Generation and refinement
    //-------------------------------------------------------------------------------------

    /// Replaces the body with text generated from `prompt`.
    pub async fn request_generate(&self, prompt: &str) -> Result<AiOutcome, ComposerError> {
        if prompt.trim().is_empty() {
            return Err(RejectReason::EmptyPrompt.into());
        }

        self.try_update(|state| {
            if state.ai_status == AiStatus::Thinking {
                return Err(RejectReason::AiBusy);
            }
            state.ai_status = AiStatus::Thinking;
            Ok(())
        })
        .await?;

        let composer = self.clone();
        let prompt = prompt.to_string();
        let generation = tokio::spawn(async move {
            let result = composer.inner.generator.generate_body(&prompt).await;
            composer.finish_ai_request(result, "generation").await
        });
        Ok(generation.await?)
    }

    /// Rewrites the current body into `tone`.
    pub async fn request_refine(&self, tone: Tone) -> Result<AiOutcome, ComposerError> {
        let body = self
            .try_update(|state| {
                if state.ai_status == AiStatus::Thinking {
                    return Err(RejectReason::AiBusy);
                }
                if !state.draft.is_refinable() {
                    return Err(RejectReason::EmptyBody);
                }
                state.ai_status = AiStatus::Thinking;
                Ok(state.draft.body.clone())
            })
            .await?;

        let composer = self.clone();
        let refinement = tokio::spawn(async move {
            let result = composer.inner.generator.refine_body(&body, tone).await;
            composer.finish_ai_request(result, "refinement").await
        });
        Ok(refinement.await?)
    }

    /// Returns the AI status to idle and folds the result into the draft.
    /// Edits made while the request was in flight are overwritten.
    async fn finish_ai_request(&self, result: PortResult<String>, kind: &str) -> AiOutcome {
        self.update(|state| {
            state.ai_status = AiStatus::Idle;
            match result {
                Ok(body) => {
                    state.draft.set_body(body);
                    AiOutcome::BodyReplaced
                }
                Err(e) => {
                    error!("AI {} failed: {}", kind, e);
                    self.show_notification(state, Notification::error(AI_FAILURE_MESSAGE));
                    AiOutcome::Failed
                }
            }
        })
        .await
    }

    //-------------------------------------------------------------------------------------
    // Notifications
    //-------------------------------------------------------------------------------------

    /// Hides the visible notification before its timer does.
    pub async fn dismiss_notification(&self) -> ComposerSnapshot {
        self.update(|state| {
            state.notification_dismissal.cancel();
            state.notification = None;
            state.snapshot()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailer_core::domain::{Draft, NotificationKind};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tokio::time::{sleep, timeout};

    //-------------------------------------------------------------------------------------
    // Fakes
    //-------------------------------------------------------------------------------------

    #[derive(Default)]
    struct FakeGenerator {
        calls: AtomicUsize,
        results: std::sync::Mutex<VecDeque<PortResult<String>>>,
        gate: Option<Notify>,
        last_refine: std::sync::Mutex<Option<(String, Tone)>>,
    }

    impl FakeGenerator {
        fn returning(results: Vec<PortResult<String>>) -> Self {
            Self {
                results: std::sync::Mutex::new(results.into()),
                ..Default::default()
            }
        }

        fn gated(results: Vec<PortResult<String>>) -> Self {
            Self {
                gate: Some(Notify::new()),
                ..Self::returning(results)
            }
        }

        fn release(&self) {
            self.gate.as_ref().unwrap().notify_one();
        }

        async fn next(&self) -> PortResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    #[async_trait]
    impl TextGenerationService for FakeGenerator {
        async fn generate_body(&self, _prompt: &str) -> PortResult<String> {
            self.next().await
        }

        async fn refine_body(&self, body: &str, tone: Tone) -> PortResult<String> {
            *self.last_refine.lock().unwrap() = Some((body.to_string(), tone));
            self.next().await
        }
    }

    #[derive(Default)]
    struct FakeDelivery {
        sent: std::sync::Mutex<Vec<(Draft, WorkerConfig)>>,
        results: std::sync::Mutex<VecDeque<PortResult<()>>>,
        gate: Option<Notify>,
    }

    impl FakeDelivery {
        fn failing_once() -> Self {
            Self {
                results: std::sync::Mutex::new(
                    vec![Err(PortError::Delivery {
                        status: Some(500),
                        message: "Internal Server Error".to_string(),
                    })]
                    .into(),
                ),
                ..Default::default()
            }
        }

        fn gated() -> Self {
            Self {
                gate: Some(Notify::new()),
                ..Default::default()
            }
        }

        fn release(&self) {
            self.gate.as_ref().unwrap().notify_one();
        }

        fn sent(&self) -> Vec<(Draft, WorkerConfig)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeliveryService for FakeDelivery {
        async fn send(&self, draft: &Draft, config: &WorkerConfig) -> PortResult<()> {
            self.sent.lock().unwrap().push((draft.clone(), config.clone()));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.results.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    #[derive(Default)]
    struct MemorySettings {
        stored: std::sync::Mutex<WorkerConfig>,
        fail: bool,
        gate: Option<Notify>,
    }

    impl MemorySettings {
        fn gated() -> Self {
            Self {
                gate: Some(Notify::new()),
                ..Default::default()
            }
        }

        fn release(&self) {
            self.gate.as_ref().unwrap().notify_one();
        }
    }

    #[async_trait]
    impl SettingsStore for MemorySettings {
        async fn load(&self) -> PortResult<WorkerConfig> {
            if self.fail {
                return Err(PortError::Storage("disk on fire".to_string()));
            }
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn save(&self, config: &WorkerConfig) -> PortResult<()> {
            if self.fail {
                return Err(PortError::Storage("disk on fire".to_string()));
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            *self.stored.lock().unwrap() = config.clone();
            Ok(())
        }
    }

    struct Harness {
        composer: Composer,
        generator: Arc<FakeGenerator>,
        delivery: Arc<FakeDelivery>,
        settings: Arc<MemorySettings>,
    }

    fn harness(generator: FakeGenerator, delivery: FakeDelivery, settings: MemorySettings) -> Harness {
        let generator = Arc::new(generator);
        let delivery = Arc::new(delivery);
        let settings = Arc::new(settings);
        let composer = Composer::new(
            generator.clone(),
            delivery.clone(),
            settings.clone(),
            WorkerConfig::new("https://worker.example.dev", "t"),
            Timings::default(),
        );
        Harness {
            composer,
            generator,
            delivery,
            settings,
        }
    }

    fn default_harness() -> Harness {
        harness(FakeGenerator::default(), FakeDelivery::default(), MemorySettings::default())
    }

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    //-------------------------------------------------------------------------------------
    // Sending
    //-------------------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn send_moves_through_sending_and_success_back_to_idle() {
        let h = harness(FakeGenerator::default(), FakeDelivery::gated(), MemorySettings::default());
        h.composer.set_subject("件名").await;
        h.composer.set_body("本文").await;

        let mut updates = h.composer.subscribe();
        let task = tokio::spawn({
            let composer = h.composer.clone();
            async move { composer.request_send().await }
        });

        updates
            .wait_for(|s| s.sending_status == SendingStatus::Sending)
            .await
            .unwrap();
        assert!(!h.composer.snapshot().can_send());

        h.delivery.release();
        assert_eq!(task.await.unwrap().unwrap(), SendOutcome::Delivered);

        let snapshot = h.composer.snapshot();
        assert_eq!(snapshot.sending_status, SendingStatus::Success);
        let notification = snapshot.notification.unwrap();
        assert_eq!(notification.kind, NotificationKind::Success);
        assert_eq!(notification.message, SEND_SUCCESS_MESSAGE);

        sleep(millis(1900)).await;
        assert_eq!(h.composer.snapshot().sending_status, SendingStatus::Success);
        sleep(millis(200)).await;
        assert_eq!(h.composer.snapshot().sending_status, SendingStatus::Idle);

        assert_eq!(
            h.delivery.sent(),
            vec![(
                Draft::new("件名", "本文"),
                WorkerConfig::new("https://worker.example.dev", "t")
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_is_rejected_while_in_flight() {
        let h = harness(FakeGenerator::default(), FakeDelivery::gated(), MemorySettings::default());
        h.composer.set_body("本文").await;

        let mut updates = h.composer.subscribe();
        let task = tokio::spawn({
            let composer = h.composer.clone();
            async move { composer.request_send().await }
        });
        updates
            .wait_for(|s| s.sending_status == SendingStatus::Sending)
            .await
            .unwrap();

        let err = h.composer.request_send().await.unwrap_err();
        assert!(matches!(err, ComposerError::Rejected(RejectReason::SendingBusy)));

        h.delivery.release();
        task.await.unwrap().unwrap();
        assert_eq!(h.delivery.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_is_rejected_until_status_returns_to_idle() {
        let h = default_harness();
        h.composer.set_body("本文").await;
        h.composer.request_send().await.unwrap();

        let err = h.composer.request_send().await.unwrap_err();
        assert!(matches!(err, ComposerError::Rejected(RejectReason::SendingBusy)));

        sleep(millis(2100)).await;
        assert_eq!(h.composer.request_send().await.unwrap(), SendOutcome::Delivered);
        assert_eq!(h.delivery.sent().len(), 2);
    }

    #[tokio::test]
    async fn send_with_empty_body_is_rejected_without_state_change() {
        let h = default_harness();
        h.composer.set_subject("subject only").await;
        let before = h.composer.snapshot();

        let err = h.composer.request_send().await.unwrap_err();
        assert!(matches!(err, ComposerError::Rejected(RejectReason::EmptyBody)));
        assert_eq!(h.composer.snapshot(), before);
        assert!(h.delivery.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn whitespace_only_body_is_still_sent() {
        let h = default_harness();
        h.composer.set_body("   ").await;
        assert!(h.composer.snapshot().can_send());
        assert!(!h.composer.snapshot().can_refine());

        assert_eq!(h.composer.request_send().await.unwrap(), SendOutcome::Delivered);
        assert_eq!(h.delivery.sent()[0].0.body, "   ");
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_send_still_settles_and_resets() {
        let h = harness(FakeGenerator::default(), FakeDelivery::gated(), MemorySettings::default());
        h.composer.set_body("本文").await;

        // The caller gives up while delivery is still pending.
        assert!(timeout(millis(100), h.composer.request_send()).await.is_err());
        assert_eq!(h.composer.snapshot().sending_status, SendingStatus::Sending);

        let mut updates = h.composer.subscribe();
        h.delivery.release();
        updates
            .wait_for(|s| s.sending_status == SendingStatus::Success)
            .await
            .unwrap();

        sleep(millis(2100)).await;
        assert_eq!(h.composer.snapshot().sending_status, SendingStatus::Idle);

        h.delivery.release();
        assert_eq!(h.composer.request_send().await.unwrap(), SendOutcome::Delivered);
        assert_eq!(h.delivery.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_shows_error_and_resets_after_three_seconds() {
        let h = harness(FakeGenerator::default(), FakeDelivery::failing_once(), MemorySettings::default());
        h.composer.set_body("本文").await;

        assert_eq!(h.composer.request_send().await.unwrap(), SendOutcome::Failed);

        let snapshot = h.composer.snapshot();
        assert_eq!(snapshot.sending_status, SendingStatus::Error);
        let notification = snapshot.notification.unwrap();
        assert_eq!(notification.kind, NotificationKind::Error);
        assert_eq!(notification.message, SEND_FAILURE_MESSAGE);

        sleep(millis(2900)).await;
        assert_eq!(h.composer.snapshot().sending_status, SendingStatus::Error);
        sleep(millis(200)).await;
        assert_eq!(h.composer.snapshot().sending_status, SendingStatus::Idle);
    }

    //-------------------------------------------------------------------------------------
    // Notifications
    //-------------------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn notification_dismisses_after_five_seconds() {
        let h = default_harness();
        h.composer.set_body("本文").await;
        h.composer.request_send().await.unwrap();

        sleep(millis(4900)).await;
        assert!(h.composer.snapshot().notification.is_some());
        sleep(millis(200)).await;
        assert!(h.composer.snapshot().notification.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_notification_replaces_older_and_restarts_its_timer() {
        let delivery = FakeDelivery::default();
        delivery.results.lock().unwrap().extend([
            Ok(()),
            Err(PortError::Delivery {
                status: None,
                message: "connection refused".to_string(),
            }),
        ]);
        let h = harness(FakeGenerator::default(), delivery, MemorySettings::default());
        h.composer.set_body("本文").await;

        h.composer.request_send().await.unwrap();
        let first = h.composer.snapshot().notification.unwrap();

        sleep(millis(4000)).await;
        assert_eq!(h.composer.request_send().await.unwrap(), SendOutcome::Failed);
        let second = h.composer.snapshot().notification.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.kind, NotificationKind::Error);

        // The first notification's timer would have fired at 5s.
        sleep(millis(1500)).await;
        assert_eq!(h.composer.snapshot().notification, Some(second));

        sleep(millis(3600)).await;
        assert!(h.composer.snapshot().notification.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dismissing_manually_clears_notification() {
        let h = default_harness();
        h.composer.set_body("本文").await;
        h.composer.request_send().await.unwrap();

        let snapshot = h.composer.dismiss_notification().await;
        assert!(snapshot.notification.is_none());
        assert_eq!(snapshot.sending_status, SendingStatus::Success);
    }

    //-------------------------------------------------------------------------------------
    // Generation and refinement
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn blank_prompt_makes_no_call() {
        let h = default_harness();

        for prompt in ["", "   ", "\n\t"] {
            let err = h.composer.request_generate(prompt).await.unwrap_err();
            assert!(matches!(err, ComposerError::Rejected(RejectReason::EmptyPrompt)));
        }
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.composer.snapshot().ai_status, AiStatus::Idle);
    }

    #[tokio::test]
    async fn generation_replaces_body_and_returns_to_idle() {
        let h = harness(
            FakeGenerator::returning(vec![Ok("生成された本文".to_string())]),
            FakeDelivery::default(),
            MemorySettings::default(),
        );
        h.composer.set_subject("件名").await;
        h.composer.set_body("古い本文").await;

        let outcome = h.composer.request_generate("会議のお礼").await.unwrap();
        assert_eq!(outcome, AiOutcome::BodyReplaced);

        let snapshot = h.composer.snapshot();
        assert_eq!(snapshot.draft, Draft::new("件名", "生成された本文"));
        assert_eq!(snapshot.ai_status, AiStatus::Idle);
    }

    #[tokio::test]
    async fn empty_generation_result_empties_the_body() {
        let h = harness(
            FakeGenerator::returning(vec![Ok(String::new())]),
            FakeDelivery::default(),
            MemorySettings::default(),
        );
        h.composer.set_body("古い本文").await;

        h.composer.request_generate("prompt").await.unwrap();
        assert_eq!(h.composer.snapshot().draft.body, "");
    }

    #[tokio::test]
    async fn refine_with_empty_body_makes_no_call() {
        let h = default_harness();

        let err = h.composer.request_refine(Tone::Friendly).await.unwrap_err();
        assert!(matches!(err, ComposerError::Rejected(RejectReason::EmptyBody)));
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refine_passes_current_body_and_tone() {
        let h = harness(
            FakeGenerator::returning(vec![Ok("至急ご確認ください。".to_string())]),
            FakeDelivery::default(),
            MemorySettings::default(),
        );
        h.composer.set_body("確認をお願いします。").await;

        h.composer.request_refine(Tone::Urgent).await.unwrap();

        assert_eq!(
            *h.generator.last_refine.lock().unwrap(),
            Some(("確認をお願いします。".to_string(), Tone::Urgent))
        );
        assert_eq!(h.composer.snapshot().draft.body, "至急ご確認ください。");
    }

    #[tokio::test]
    async fn second_ai_request_is_rejected_while_thinking() {
        let h = harness(
            FakeGenerator::gated(vec![Ok("refined".to_string())]),
            FakeDelivery::default(),
            MemorySettings::default(),
        );
        h.composer.set_body("body").await;

        let mut updates = h.composer.subscribe();
        let task = tokio::spawn({
            let composer = h.composer.clone();
            async move { composer.request_refine(Tone::Concise).await }
        });
        updates
            .wait_for(|s| s.ai_status == AiStatus::Thinking)
            .await
            .unwrap();

        let err = h.composer.request_refine(Tone::Friendly).await.unwrap_err();
        assert!(matches!(err, ComposerError::Rejected(RejectReason::AiBusy)));
        let err = h.composer.request_generate("another").await.unwrap_err();
        assert!(matches!(err, ComposerError::Rejected(RejectReason::AiBusy)));
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);

        h.generator.release();
        task.await.unwrap().unwrap();
        assert_eq!(h.composer.snapshot().ai_status, AiStatus::Idle);
    }

    #[tokio::test]
    async fn edits_during_refinement_are_overwritten() {
        let h = harness(
            FakeGenerator::gated(vec![Ok("refined".to_string())]),
            FakeDelivery::default(),
            MemorySettings::default(),
        );
        h.composer.set_body("original").await;

        let mut updates = h.composer.subscribe();
        let task = tokio::spawn({
            let composer = h.composer.clone();
            async move { composer.request_refine(Tone::Professional).await }
        });
        updates
            .wait_for(|s| s.ai_status == AiStatus::Thinking)
            .await
            .unwrap();

        h.composer.set_body("typed while waiting").await;
        h.generator.release();
        task.await.unwrap().unwrap();

        assert_eq!(h.composer.snapshot().draft.body, "refined");
    }

    #[tokio::test(start_paused = true)]
    async fn generation_failure_surfaces_error_notification() {
        let h = harness(
            FakeGenerator::returning(vec![Err(PortError::Generation("quota".to_string()))]),
            FakeDelivery::default(),
            MemorySettings::default(),
        );
        h.composer.set_body("keep me").await;

        let outcome = h.composer.request_generate("prompt").await.unwrap();
        assert_eq!(outcome, AiOutcome::Failed);

        let snapshot = h.composer.snapshot();
        assert_eq!(snapshot.ai_status, AiStatus::Idle);
        assert_eq!(snapshot.draft.body, "keep me");
        let notification = snapshot.notification.unwrap();
        assert_eq!(notification.kind, NotificationKind::Error);
        assert_eq!(notification.message, AI_FAILURE_MESSAGE);
        // Delivery status is untouched by AI failures.
        assert_eq!(snapshot.sending_status, SendingStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn refinement_failure_keeps_body_and_surfaces_error_notification() {
        let h = harness(
            FakeGenerator::returning(vec![Err(PortError::Generation("timeout".to_string()))]),
            FakeDelivery::default(),
            MemorySettings::default(),
        );
        h.composer.set_body("そのまま").await;

        let outcome = h.composer.request_refine(Tone::Friendly).await.unwrap();
        assert_eq!(outcome, AiOutcome::Failed);

        let snapshot = h.composer.snapshot();
        assert_eq!(snapshot.ai_status, AiStatus::Idle);
        assert_eq!(snapshot.draft.body, "そのまま");
        let notification = snapshot.notification.unwrap();
        assert_eq!(notification.kind, NotificationKind::Error);
        assert_eq!(notification.message, AI_FAILURE_MESSAGE);

        sleep(millis(5100)).await;
        assert!(h.composer.snapshot().notification.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_refinement_still_replaces_body() {
        let h = harness(
            FakeGenerator::gated(vec![Ok("書き直し".to_string())]),
            FakeDelivery::default(),
            MemorySettings::default(),
        );
        h.composer.set_body("original").await;

        assert!(timeout(millis(100), h.composer.request_refine(Tone::Concise)).await.is_err());
        assert_eq!(h.composer.snapshot().ai_status, AiStatus::Thinking);

        let mut updates = h.composer.subscribe();
        h.generator.release();
        updates
            .wait_for(|s| s.ai_status == AiStatus::Idle)
            .await
            .unwrap();
        assert_eq!(h.composer.snapshot().draft.body, "書き直し");

        h.generator.release();
        assert_eq!(
            h.composer.request_generate("次の依頼").await.unwrap(),
            AiOutcome::BodyReplaced
        );
    }

    //-------------------------------------------------------------------------------------
    // Draft and settings
    //-------------------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn clear_draft_works_mid_send() {
        let h = harness(FakeGenerator::default(), FakeDelivery::gated(), MemorySettings::default());
        h.composer.set_subject("件名").await;
        h.composer.set_body("本文").await;

        let mut updates = h.composer.subscribe();
        let task = tokio::spawn({
            let composer = h.composer.clone();
            async move { composer.request_send().await }
        });
        updates
            .wait_for(|s| s.sending_status == SendingStatus::Sending)
            .await
            .unwrap();

        let snapshot = h.composer.clear_draft().await;
        assert_eq!(snapshot.draft, Draft::default());
        assert_eq!(snapshot.sending_status, SendingStatus::Sending);

        h.delivery.release();
        task.await.unwrap().unwrap();
        // The in-flight send carried the draft as it was when the send started.
        assert_eq!(h.delivery.sent()[0].0, Draft::new("件名", "本文"));
    }

    #[tokio::test]
    async fn saved_settings_apply_to_the_next_send() {
        let h = default_harness();
        h.composer.open_settings().await;
        h.composer.set_body("本文").await;

        let saved = WorkerConfig::new("https://x/y", "t");
        let snapshot = h.composer.save_settings(saved.clone()).await.unwrap();
        assert!(!snapshot.settings_open);
        assert!(snapshot.endpoint_configured);
        assert_eq!(*h.settings.stored.lock().unwrap(), saved);

        h.composer.request_send().await.unwrap();
        assert_eq!(h.delivery.sent()[0].1, saved);
    }

    #[tokio::test]
    async fn storage_failure_is_reported_but_config_still_applies() {
        let h = harness(
            FakeGenerator::default(),
            FakeDelivery::default(),
            MemorySettings {
                fail: true,
                ..Default::default()
            },
        );

        let err = h
            .composer
            .save_settings(WorkerConfig::new("https://x/y", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ComposerError::Port(PortError::Storage(_))));
        assert_eq!(h.composer.snapshot().config.endpoint_url, "https://x/y");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_saves_persist_in_the_order_they_apply() {
        let h = harness(FakeGenerator::default(), FakeDelivery::default(), MemorySettings::gated());
        let first = WorkerConfig::new("https://first", "1");
        let second = WorkerConfig::new("https://second", "2");

        let first_save = tokio::spawn({
            let composer = h.composer.clone();
            let config = first.clone();
            async move { composer.save_settings(config).await }
        });
        sleep(millis(10)).await;
        let second_save = tokio::spawn({
            let composer = h.composer.clone();
            let config = second.clone();
            async move { composer.save_settings(config).await }
        });
        sleep(millis(10)).await;

        // The second save waits until the first one is written.
        assert_eq!(h.composer.snapshot().config, first);

        h.settings.release();
        first_save.await.unwrap().unwrap();
        sleep(millis(10)).await;
        assert_eq!(h.composer.snapshot().config, second);

        h.settings.release();
        second_save.await.unwrap().unwrap();
        assert_eq!(*h.settings.stored.lock().unwrap(), second);
        assert_eq!(h.composer.snapshot().config, second);
    }

    #[tokio::test]
    async fn settings_dialog_opens_and_closes() {
        let h = default_harness();
        assert!(h.composer.open_settings().await.settings_open);
        assert!(!h.composer.close_settings().await.settings_open);
    }

    #[tokio::test]
    async fn load_reads_persisted_config() {
        let settings = Arc::new(MemorySettings::default());
        *settings.stored.lock().unwrap() = WorkerConfig::new("https://stored", "tok");

        let composer = Composer::load(
            Arc::new(FakeGenerator::default()),
            Arc::new(FakeDelivery::default()),
            settings,
            Timings::default(),
        )
        .await;
        assert_eq!(composer.snapshot().config, WorkerConfig::new("https://stored", "tok"));
    }

    #[tokio::test]
    async fn load_falls_back_to_unconfigured() {
        let composer = Composer::load(
            Arc::new(FakeGenerator::default()),
            Arc::new(FakeDelivery::default()),
            Arc::new(MemorySettings {
                fail: true,
                ..Default::default()
            }),
            Timings::default(),
        )
        .await;
        let snapshot = composer.snapshot();
        assert_eq!(snapshot.config, WorkerConfig::default());
        assert!(!snapshot.endpoint_configured);
    }
}
