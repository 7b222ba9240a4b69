//! crates/mailer_core/src/domain.rs
//!
//! Defines the pure, core data structures for the composer.
//! These structs are independent of any storage or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Draft
//=========================================================================================

/// The subject/body pair the user is composing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub subject: String,
    pub body: String,
}

impl Draft {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// Resets both fields to the empty string.
    pub fn clear(&mut self) {
        self.subject.clear();
        self.body.clear();
    }

    /// Only the body is required before a draft may be sent. Whitespace counts.
    pub fn is_sendable(&self) -> bool {
        !self.body.is_empty()
    }

    /// A body with nothing but whitespace has nothing to rewrite.
    pub fn is_refinable(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

//=========================================================================================
// Worker Configuration
//=========================================================================================

/// Where drafts are delivered, and the bearer token forwarded with them.
///
/// Neither field is validated: the endpoint is expected to be an absolute
/// HTTP(S) URL and the token is opaque.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct WorkerConfig {
    pub endpoint_url: String,
    pub auth_token: String,
}

impl WorkerConfig {
    pub fn new(endpoint_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            auth_token: auth_token.into(),
        }
    }

    /// An empty endpoint means delivery is simulated rather than performed.
    pub fn is_configured(&self) -> bool {
        !self.endpoint_url.is_empty()
    }
}

// Keeps the token out of logs.
impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field(
                "auth_token",
                &if self.auth_token.is_empty() { "<empty>" } else { "<redacted>" },
            )
            .finish()
    }
}

//=========================================================================================
// Status Enumerations
//=========================================================================================

/// Progress of the current delivery attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SendingStatus {
    #[default]
    Idle,
    Sending,
    Success,
    Error,
}

/// Progress of the current generation or refinement request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AiStatus {
    #[default]
    Idle,
    Thinking,
    /// Part of the published status vocabulary; no flow currently sets it.
    Error,
}

//=========================================================================================
// Tone
//=========================================================================================

/// The fixed set of rewrite styles a body can be refined into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Professional,
    Friendly,
    Urgent,
    Concise,
}

impl Tone {
    pub const ALL: [Tone; 4] = [Tone::Professional, Tone::Friendly, Tone::Urgent, Tone::Concise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Friendly => "friendly",
            Tone::Urgent => "urgent",
            Tone::Concise => "concise",
        }
    }

    /// The descriptive phrase embedded in a refinement instruction.
    pub fn instruction(&self) -> &'static str {
        match self {
            Tone::Professional => "よりビジネスライクで丁寧な",
            Tone::Friendly => "親しみやすく、柔らかい",
            Tone::Urgent => "至急の対応を促す",
            Tone::Concise => "要点を絞って簡潔な",
        }
    }

    /// Short label shown on the refinement buttons.
    pub fn label(&self) -> &'static str {
        match self {
            Tone::Professional => "ビジネス",
            Tone::Friendly => "親しみやすく",
            Tone::Urgent => "至急",
            Tone::Concise => "簡潔に",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown tone: {0}")]
pub struct UnknownTone(pub String);

impl FromStr for Tone {
    type Err = UnknownTone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tone::ALL
            .into_iter()
            .find(|tone| tone.as_str() == s)
            .ok_or_else(|| UnknownTone(s.to_string()))
    }
}

//=========================================================================================
// Notification
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A transient message shown to the user. At most one is visible at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub shown_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            shown_at: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }
}
