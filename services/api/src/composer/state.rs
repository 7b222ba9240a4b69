//! services/api/src/composer/state.rs
//!
//! Defines the composer's mutable state and the read-only snapshot published to
//! the presentation layer after every change.

use crate::composer::timer::TimerSlot;
use mailer_core::domain::{AiStatus, Draft, Notification, SendingStatus, WorkerConfig};
use std::time::Duration;

pub const SEND_SUCCESS_MESSAGE: &str = "Workerへメッセージを送信しました！";
pub const SEND_FAILURE_MESSAGE: &str = "送信に失敗しました。Workerの設定を確認してください。";
pub const AI_FAILURE_MESSAGE: &str = "AI生成に失敗しました。もう一度お試しください。";

//=========================================================================================
// Timings
//=========================================================================================

/// Fixed delays for the scheduled status resets and notification dismissal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub success_reset: Duration,
    pub error_reset: Duration,
    pub notification: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            success_reset: Duration::from_secs(2),
            error_reset: Duration::from_secs(3),
            notification: Duration::from_secs(5),
        }
    }
}

//=========================================================================================
// ComposerState (owned by the Composer, behind its lock)
//=========================================================================================

#[derive(Default)]
pub struct ComposerState {
    pub draft: Draft,
    pub config: WorkerConfig,
    pub sending_status: SendingStatus,
    pub ai_status: AiStatus,
    pub settings_open: bool,
    pub notification: Option<Notification>,
    /// Pending return of `sending_status` to idle.
    pub status_reset: TimerSlot,
    /// Pending auto-dismissal of `notification`.
    pub notification_dismissal: TimerSlot,
}

impl ComposerState {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> ComposerSnapshot {
        ComposerSnapshot {
            draft: self.draft.clone(),
            config: self.config.clone(),
            endpoint_configured: self.config.is_configured(),
            sending_status: self.sending_status,
            ai_status: self.ai_status,
            settings_open: self.settings_open,
            notification: self.notification.clone(),
        }
    }
}

//=========================================================================================
// ComposerSnapshot (what the presentation layer reads)
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposerSnapshot {
    pub draft: Draft,
    pub config: WorkerConfig,
    pub endpoint_configured: bool,
    pub sending_status: SendingStatus,
    pub ai_status: AiStatus,
    pub settings_open: bool,
    pub notification: Option<Notification>,
}

impl ComposerSnapshot {
    /// Mirrors the send button's enabled state.
    pub fn can_send(&self) -> bool {
        self.sending_status == SendingStatus::Idle && self.draft.is_sendable()
    }

    /// Mirrors the refinement buttons' enabled state.
    pub fn can_refine(&self) -> bool {
        self.ai_status != AiStatus::Thinking && self.draft.is_refinable()
    }
}
