//! Mirror deliveries to an outside system, like a shared spreadsheet
//!
//! Mirroring is best effort: failures are logged and never reach the request that caused
//! them

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::deliveries::Delivery;
use crate::deliveries::Item;
use crate::identifiers::DeliveryId;
use crate::utils::env_var_optional;

/// Mirror errors
#[derive(Debug, Error)]
pub enum Error {
    /// The mirror could not be configured
    #[error("Invalid mirror configuration: {0}")]
    Config(String),

    /// The mirror could not be reached or refused the delivery
    #[error("Mirror request failed: {0}")]
    Request(String),
}

/// Something that keeps a copy of every delivery
#[async_trait]
pub trait Mirror: Send + Sync + 'static {
    /// Push the latest state of a delivery
    async fn sync(&self, delivery: &Delivery) -> Result<(), Error>;
}

/// No mirror at all
pub struct Disabled;

#[async_trait]
impl Mirror for Disabled {
    async fn sync(&self, _delivery: &Delivery) -> Result<(), Error> {
        Ok(())
    }
}

/// Delivery as posted to the webhook
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    id: &'a DeliveryId,
    date: &'a str,
    from_branch: &'a str,
    to_branch: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    items: Vec<WebhookItem<'a>>,
    status: &'static str,
    note: Option<&'a str>,
    created_at: String,
    received_at: Option<String>,
    received_by: Option<&'a str>,
}

#[derive(Serialize)]
struct WebhookItem<'a> {
    name: &'a str,
    quantity: u32,
}

impl<'a> WebhookPayload<'a> {
    fn from_delivery(delivery: &'a Delivery) -> Self {
        Self {
            id: &delivery.id,
            date: &delivery.date,
            from_branch: &delivery.from_branch,
            to_branch: &delivery.to_branch,
            kind: &delivery.kind,
            items: delivery.items.iter().map(WebhookItem::from_item).collect(),
            status: delivery.status.as_str(),
            note: delivery.note.as_deref(),
            created_at: delivery.created_at.and_utc().to_rfc3339(),
            received_at: delivery
                .received_at
                .map(|received_at| received_at.and_utc().to_rfc3339()),
            received_by: delivery.received_by.as_deref(),
        }
    }
}

impl<'a> WebhookItem<'a> {
    fn from_item(item: &'a Item) -> Self {
        Self {
            name: &item.name,
            quantity: item.quantity,
        }
    }
}

/// Post every delivery as JSON to a URL
pub struct Webhook {
    client: reqwest::Client,
    url: Url,
}

impl Webhook {
    pub fn new(url: Url) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| Error::Config(err.to_string()))?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl Mirror for Webhook {
    async fn sync(&self, delivery: &Delivery) -> Result<(), Error> {
        self.client
            .post(self.url.clone())
            .json(&WebhookPayload::from_delivery(delivery))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| Error::Request(err.to_string()))?;

        Ok(())
    }
}

/// Hands deliveries to the mirror without waiting for it
#[derive(Clone)]
pub struct SyncNotifier {
    mirror: Arc<dyn Mirror>,
}

impl SyncNotifier {
    pub fn new<M: Mirror>(mirror: M) -> Self {
        Self {
            mirror: Arc::new(mirror),
        }
    }

    /// Setup the notifier from the environment
    ///
    /// `SYNC_WEBHOOK_URL` enables the webhook, without it nothing is mirrored
    pub fn from_env() -> Result<Self, Error> {
        let Some(webhook_url) = env_var_optional("SYNC_WEBHOOK_URL") else {
            tracing::debug!("`SYNC_WEBHOOK_URL` is not set, deliveries are not mirrored");

            return Ok(Self::new(Disabled));
        };

        let url = Url::parse(&webhook_url).map_err(|err| Error::Config(err.to_string()))?;

        tracing::info!("Mirroring deliveries to {url}");

        Webhook::new(url).map(Self::new)
    }

    /// Mirror the delivery in the background
    pub fn notify(&self, delivery: Delivery) {
        let mirror = Arc::clone(&self.mirror);

        tokio::spawn(async move {
            if let Err(err) = mirror.sync(&delivery).await {
                tracing::error!("Could not mirror delivery {}: {err}", delivery.id);
            }
        });
    }
}
