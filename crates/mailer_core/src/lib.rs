pub mod domain;
pub mod ports;

pub use domain::{
    AiStatus, Draft, Notification, NotificationKind, SendingStatus, Tone, UnknownTone,
    WorkerConfig,
};
pub use ports::{DeliveryService, PortError, PortResult, SettingsStore, TextGenerationService};
