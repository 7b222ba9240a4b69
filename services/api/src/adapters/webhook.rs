//! services/api/src/adapters/webhook.rs
//!
//! This module contains the adapter that delivers drafts to the user's webhook.
//! It implements the `DeliveryService` port from the `core` crate.

use async_trait::async_trait;
use mailer_core::{
    domain::{Draft, WorkerConfig},
    ports::{DeliveryService, PortError, PortResult},
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long a simulated send takes when no endpoint is configured.
pub const SIMULATED_SEND_DELAY: Duration = Duration::from_millis(1500);

/// The exact JSON body posted to the endpoint.
#[derive(Serialize)]
struct DeliveryPayload<'a> {
    subject: &'a str,
    body: &'a str,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `DeliveryService` with a single HTTP POST per draft.
#[derive(Clone)]
pub struct WebhookDeliveryAdapter {
    client: reqwest::Client,
    simulated_delay: Duration,
}

impl WebhookDeliveryAdapter {
    /// Creates a new `WebhookDeliveryAdapter`. No timeout is imposed beyond the
    /// transport defaults.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            simulated_delay: SIMULATED_SEND_DELAY,
        }
    }
}

impl Default for WebhookDeliveryAdapter {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

//=========================================================================================
// `DeliveryService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DeliveryService for WebhookDeliveryAdapter {
    async fn send(&self, draft: &Draft, config: &WorkerConfig) -> PortResult<()> {
        if !config.is_configured() {
            warn!("No worker URL configured. Simulating send.");
            tokio::time::sleep(self.simulated_delay).await;
            return Ok(());
        }

        let payload = DeliveryPayload {
            subject: &draft.subject,
            body: &draft.body,
        };

        // The bearer header is sent even when the token is empty.
        let response = self
            .client
            .post(&config.endpoint_url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", config.auth_token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send email via worker: {}", e);
                PortError::Delivery {
                    status: None,
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        debug!(status = %status, "Worker responded.");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Worker rejected the message.");
            return Err(PortError::Delivery {
                status: Some(status.as_u16()),
                message: format!("Worker responded with status: {}", status.as_u16()),
            });
        }

        info!(endpoint = %config.endpoint_url, "Message delivered to worker.");
        Ok(())
    }
}
