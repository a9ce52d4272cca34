//! Deliveries API endpoints
//!
//! Everything related to sending and receiving deliveries

use axum::Extension;
use chrono::Local;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;

use crate::deliveries::Delivery;
use crate::deliveries::Item;
use crate::deliveries::Status;
use crate::identifiers::DeliveryId;
use crate::mirror::SyncNotifier;
use crate::storage::CreateDeliveryValues;
use crate::storage::DeliveryFilter;
use crate::storage::NewItem;
use crate::storage::ReceiveDeliveryValues;
use crate::storage::Storage;

use super::Error;
use super::Form;
use super::PathParameters;
use super::QueryParameters;
use super::Success;

/// Item of a delivery going to the user
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    /// Name of the item
    pub name: String,

    /// Quantity, at least 1
    pub quantity: u32,
}

impl ItemResponse {
    fn from_item(item: Item) -> Self {
        Self {
            name: item.name,
            quantity: item.quantity,
        }
    }
}

/// Delivery response going to the user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    /// Delivery ID, `YYYYMMDD-NNN`
    pub id: DeliveryId,

    /// Date as shown on the slip
    pub date: String,

    /// Branch the delivery leaves from
    pub from_branch: String,

    /// Branch the delivery goes to
    pub to_branch: String,

    /// Kind of slip
    #[serde(rename = "type")]
    pub kind: String,

    /// Items, in the order they were entered
    pub items: Vec<ItemResponse>,

    /// Sent or received
    pub status: Status,

    /// Optional note
    pub note: Option<String>,

    /// Creation date
    pub created_at: NaiveDateTime,

    /// When the delivery was received
    pub received_at: Option<NaiveDateTime>,

    /// Who received the delivery
    pub received_by: Option<String>,
}

impl DeliveryResponse {
    /// Create a response from a [`Delivery`](Delivery)
    fn from_delivery(delivery: Delivery) -> Self {
        Self {
            id: delivery.id,
            date: delivery.date,
            from_branch: delivery.from_branch,
            to_branch: delivery.to_branch,
            kind: delivery.kind,
            items: delivery
                .items
                .into_iter()
                .map(ItemResponse::from_item)
                .collect(),
            status: delivery.status,
            note: delivery.note,
            created_at: delivery.created_at,
            received_at: delivery.received_at,
            received_by: delivery.received_by,
        }
    }

    /// Create a response from multiple [`Delivery`](Delivery)s
    fn from_delivery_multiple(mut deliveries: Vec<Delivery>) -> Vec<Self> {
        deliveries
            .drain(..)
            .map(Self::from_delivery)
            .collect::<Vec<Self>>()
    }
}

/// A delivery ID from the path
///
/// Anything that is not a valid ID can not exist either
fn parse_delivery_id(delivery_id: &str) -> Result<DeliveryId, Error> {
    delivery_id
        .parse::<DeliveryId>()
        .map_err(|_| Error::not_found("Delivery not found"))
}

/// Filters to list deliveries with, all optional
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDeliveriesQuery {
    /// Branch the delivery leaves from or goes to
    branch: Option<String>,

    /// `sent` or `received`
    status: Option<String>,

    /// Earliest slip date, inclusive
    date_from: Option<String>,

    /// Latest slip date, inclusive
    date_to: Option<String>,

    /// Text to look for in the items
    search: Option<String>,
}

impl ListDeliveriesQuery {
    fn into_filter(self) -> Result<DeliveryFilter, Error> {
        let status = match self.status.as_deref() {
            None | Some("") => None,
            Some(status) => Some(Status::parse(status).ok_or_else(|| {
                Error::bad_request("Invalid status")
                    .with_description(format!(r#"Unknown status "{status}""#))
            })?),
        };

        Ok(DeliveryFilter {
            branch: self.branch,
            status,
            date_from: self.date_from,
            date_to: self.date_to,
            search: self.search,
        })
    }
}

/// List deliveries, newest first
///
/// Request:
/// ```sh
/// curl -v 'http://localhost:3001/api/deliveries?branch=本部&status=sent'
/// ```
///
/// Response:
/// ```json
/// [ { "id": "20240615-001", "fromBranch": "本部", "status": "sent" ... } ]
/// ```
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    QueryParameters(query): QueryParameters<ListDeliveriesQuery>,
) -> Result<Success<Vec<DeliveryResponse>>, Error> {
    let filter = query.into_filter()?;

    let deliveries = storage.find_all_deliveries(&filter).await?;

    Ok(Success::ok(DeliveryResponse::from_delivery_multiple(
        deliveries,
    )))
}

/// Get a single delivery
///
/// Request:
/// ```sh
/// curl -v http://localhost:3001/api/deliveries/20240615-001
/// ```
pub async fn single<S: Storage>(
    Extension(storage): Extension<S>,
    PathParameters(delivery_id): PathParameters<String>,
) -> Result<Success<DeliveryResponse>, Error> {
    let delivery_id = parse_delivery_id(&delivery_id)?;

    storage
        .find_single_delivery_by_id(&delivery_id)
        .await?
        .map_or_else(
            || Err(Error::not_found("Delivery not found")),
            |delivery| Ok(Success::ok(DeliveryResponse::from_delivery(delivery))),
        )
}

/// Item of the create delivery form
///
/// Also accepts the `item`/`qty` names of older clients
#[derive(Debug, Deserialize)]
pub struct ItemForm {
    #[serde(alias = "item")]
    name: String,

    #[serde(alias = "qty")]
    quantity: i64,
}

/// Create delivery form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeliveryForm {
    /// Date as shown on the slip
    date: String,

    /// Branch the delivery leaves from
    from_branch: String,

    /// Branch the delivery goes to
    to_branch: String,

    /// Kind of slip
    #[serde(rename = "type")]
    kind: String,

    /// At least one item
    items: Vec<ItemForm>,

    /// Optional note
    note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub delivery_id: DeliveryId,
}

/// Create a delivery based on the [`CreateDeliveryForm`](CreateDeliveryForm) form
///
/// The ID is allocated for the current (server local) day
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "date": "2024-06-15", "fromBranch": "本部", "toBranch": "Think Life旭", "type": "delivery-note", "items": [ { "name": "Towels", "quantity": 3 } ] }' \
///     http://localhost:3001/api/deliveries
/// ```
///
/// Response
/// ```json
/// { "deliveryId": "20240615-001" }
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(sync_notifier): Extension<SyncNotifier>,
    Form(form): Form<CreateDeliveryForm>,
) -> Result<Success<CreatedResponse>, Error> {
    let items = form
        .items
        .iter()
        .map(|item| NewItem {
            name: &item.name,
            quantity: item.quantity,
        })
        .collect::<Vec<NewItem>>();

    let values = CreateDeliveryValues {
        issued_on: Local::now().date_naive(),
        date: &form.date,
        from_branch: &form.from_branch,
        to_branch: &form.to_branch,
        kind: &form.kind,
        items: &items,
        note: form.note.as_deref(),
    };

    let delivery = storage.create_delivery(&values).await?;
    let delivery_id = delivery.id;

    tracing::info!(
        "Delivery {delivery_id} created: {} -> {}",
        delivery.from_branch,
        delivery.to_branch
    );

    sync_notifier.notify(delivery);

    Ok(Success::created(CreatedResponse { delivery_id }))
}

/// Receive delivery form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveDeliveryForm {
    /// Name of the person receiving the delivery
    #[serde(alias = "receiver_name")]
    received_by: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedResponse {
    pub message: &'static str,
    pub received_at: Option<NaiveDateTime>,
    pub received_by: Option<String>,
}

/// Mark a delivery as received
///
/// Only sent deliveries can be received, receiving again is a conflict
///
/// Request:
/// ```sh
/// curl -v -XPATCH -H 'Content-Type: application/json' \
///     -d '{ "receivedBy": "Tanaka" }' \
///     http://localhost:3001/api/deliveries/20240615-001/receive
/// ```
pub async fn receive<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(sync_notifier): Extension<SyncNotifier>,
    PathParameters(delivery_id): PathParameters<String>,
    Form(form): Form<ReceiveDeliveryForm>,
) -> Result<Success<ReceivedResponse>, Error> {
    let delivery_id = parse_delivery_id(&delivery_id)?;

    let values = ReceiveDeliveryValues {
        received_by: &form.received_by,
    };

    let delivery = storage
        .mark_delivery_received(&delivery_id, &values)
        .await?;

    tracing::info!("Delivery {delivery_id} received");

    let response = ReceivedResponse {
        message: "Received",
        received_at: delivery.received_at,
        received_by: delivery.received_by.clone(),
    };

    sync_notifier.notify(delivery);

    Ok(Success::ok(response))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Delete a delivery, sent or received
///
/// Request:
/// ```sh
/// curl -v -XDELETE http://localhost:3001/api/deliveries/20240615-001
/// ```
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    PathParameters(delivery_id): PathParameters<String>,
) -> Result<Success<MessageResponse>, Error> {
    let delivery_id = parse_delivery_id(&delivery_id)?;

    storage.delete_delivery(&delivery_id).await?;

    tracing::info!("Delivery {delivery_id} deleted");

    Ok(Success::ok(MessageResponse {
        message: "Deleted successfully",
    }))
}
