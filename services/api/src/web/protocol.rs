//! services/api/src/web/protocol.rs
//!
//! Defines the JSON shapes exchanged with the browser client, over both the REST
//! endpoints and the WebSocket. The domain types stay free of serialization
//! concerns; everything here converts from them.

use crate::composer::ComposerSnapshot;
use chrono::{DateTime, Utc};
use mailer_core::domain::{
    AiStatus, Draft, Notification, NotificationKind, SendingStatus, Tone, WorkerConfig,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Views Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct DraftView {
    pub subject: String,
    pub body: String,
}

impl From<&Draft> for DraftView {
    fn from(draft: &Draft) -> Self {
        Self {
            subject: draft.subject.clone(),
            body: draft.body.clone(),
        }
    }
}

/// The delivery settings, in the same shape the client saves them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPayload {
    pub endpoint_url: String,
    #[serde(default)]
    pub auth_token: String,
}

impl From<&WorkerConfig> for ConfigPayload {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            endpoint_url: config.endpoint_url.clone(),
            auth_token: config.auth_token.clone(),
        }
    }
}

impl From<ConfigPayload> for WorkerConfig {
    fn from(payload: ConfigPayload) -> Self {
        WorkerConfig::new(payload.endpoint_url, payload.auth_token)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendingStatusView {
    Idle,
    Sending,
    Success,
    Error,
}

impl From<SendingStatus> for SendingStatusView {
    fn from(status: SendingStatus) -> Self {
        match status {
            SendingStatus::Idle => Self::Idle,
            SendingStatus::Sending => Self::Sending,
            SendingStatus::Success => Self::Success,
            SendingStatus::Error => Self::Error,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AiStatusView {
    Idle,
    Thinking,
    Error,
}

impl From<AiStatus> for AiStatusView {
    fn from(status: AiStatus) -> Self {
        match status {
            AiStatus::Idle => Self::Idle,
            AiStatus::Thinking => Self::Thinking,
            AiStatus::Error => Self::Error,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKindView {
    Success,
    Error,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKindView,
    pub message: String,
    pub shown_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationView {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            kind: match notification.kind {
                NotificationKind::Success => NotificationKindView::Success,
                NotificationKind::Error => NotificationKindView::Error,
            },
            message: notification.message.clone(),
            shown_at: notification.shown_at,
        }
    }
}

/// Everything the presentation layer renders.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComposerView {
    pub draft: DraftView,
    pub config: ConfigPayload,
    pub endpoint_configured: bool,
    pub sending_status: SendingStatusView,
    pub ai_status: AiStatusView,
    pub settings_open: bool,
    pub notification: Option<NotificationView>,
    pub can_send: bool,
    pub can_refine: bool,
}

impl From<&ComposerSnapshot> for ComposerView {
    fn from(snapshot: &ComposerSnapshot) -> Self {
        Self {
            draft: DraftView::from(&snapshot.draft),
            config: ConfigPayload::from(&snapshot.config),
            endpoint_configured: snapshot.endpoint_configured,
            sending_status: snapshot.sending_status.into(),
            ai_status: snapshot.ai_status.into(),
            settings_open: snapshot.settings_open,
            notification: snapshot.notification.as_ref().map(NotificationView::from),
            can_send: snapshot.can_send(),
            can_refine: snapshot.can_refine(),
        }
    }
}

/// One of the fixed rewrite styles, with the label its button shows.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct ToneView {
    /// The value `RefineRequest::tone` accepts.
    pub name: String,
    pub label: String,
}

impl From<Tone> for ToneView {
    fn from(tone: Tone) -> Self {
        Self {
            name: tone.as_str().to_string(),
            label: tone.label().to_string(),
        }
    }
}

//=========================================================================================
// REST Request Payloads
//=========================================================================================

/// Fields left out are kept as they are.
#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct UpdateDraftRequest {
    pub subject: Option<String>,
    pub body: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct RefineRequest {
    /// One of `professional`, `friendly`, `urgent`, `concise`.
    pub tone: String,
}

//=========================================================================================
// WebSocket Messages
//=========================================================================================

/// Keystroke-level edits a client may push over the WebSocket.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SetSubject { subject: String },
    SetBody { body: String },
    ClearDraft,
}

/// Messages the server pushes over the WebSocket.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The full composer state, sent on connect and after every change.
    Snapshot(ComposerView),
    /// A client message could not be understood.
    Error { message: String },
}
