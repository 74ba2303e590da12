use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Receives passenger notices when a trip they booked is cancelled.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: Uuid, trip_id: Uuid, reason: &str) -> AppResult<()>;
}

/// Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: Uuid, trip_id: Uuid, reason: &str) -> AppResult<()> {
        tracing::info!(%user_id, %trip_id, reason, "Passenger notified of trip cancellation");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CancellationNotice<'a> {
    user_id: Uuid,
    trip_id: Uuid,
    reason: &'a str,
}

/// POSTs a JSON notice to the notification service.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, user_id: Uuid, trip_id: Uuid, reason: &str) -> AppResult<()> {
        self.client
            .post(&self.url)
            .json(&CancellationNotice {
                user_id,
                trip_id,
                reason,
            })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AppError::Internal(format!("Notification delivery failed: {}", e)))?;

        tracing::debug!(%user_id, %trip_id, "Cancellation notice delivered");
        Ok(())
    }
}
