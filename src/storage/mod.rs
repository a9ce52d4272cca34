//! All things related to the storage of deliveries

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use thiserror::Error;

use crate::deliveries::Delivery;
use crate::deliveries::Item;
use crate::deliveries::Status;
use crate::identifiers::AllocationError;
use crate::identifiers::DeliveryId;
use crate::utils::env_var_optional;

pub use memory::Memory;
pub use postgres::Postgres;

mod memory;
mod postgres;

/// Largest quantity of a single item, it has to fit a Postgres `INTEGER`
pub const MAX_QUANTITY: u32 = 2_147_483_647;

/// Storage configuration
pub enum Config {
    /// Detect configuration from environment
    DetectConfig,

    /// Keep deliveries in memory only
    Memory,

    /// Keep deliveries in memory, with a JSON snapshot on disk
    File(PathBuf),

    /// Use existing connection
    ExistingConnection(PgPool),
}

/// The storage picked by the configuration
pub enum Backend {
    /// In memory, maybe backed by a file
    Memory(Memory),

    /// Postgres
    Postgres(Postgres),
}

/// Setup the storage
///
/// # Errors
///
/// Will return `Err` when the snapshot file can not be read or when the database is not
/// reachable or can not be migrated
pub async fn setup(config: Config) -> Result<Backend> {
    match config {
        Config::DetectConfig => detect().await,
        Config::Memory => Ok(Backend::Memory(Memory::new())),
        Config::File(path) => Memory::with_file(path).await.map(Backend::Memory),
        Config::ExistingConnection(pool) => Postgres::with_pool(pool).await.map(Backend::Postgres),
    }
}

/// Pick the storage based on the environment
///
/// `DATABASE_URL` wins over `DATA_FILE`, without either everything stays in memory
async fn detect() -> Result<Backend> {
    if let Some(database_url) = env_var_optional("DATABASE_URL") {
        tracing::info!("Using Postgres storage");

        return Postgres::connect(&database_url)
            .await
            .map(Backend::Postgres);
    }

    if let Some(data_file) = env_var_optional("DATA_FILE") {
        tracing::info!("Using file storage: {data_file}");

        return Memory::with_file(PathBuf::from(data_file))
            .await
            .map(Backend::Memory);
    }

    tracing::warn!("`DATABASE_URL` and `DATA_FILE` are not set, deliveries are lost on shutdown");

    Ok(Backend::Memory(Memory::new()))
}

/// Storage errors
#[derive(Debug, Error)]
pub enum Error {
    /// The values do not make a valid delivery, nothing is changed
    #[error("{0}")]
    Validation(String),

    /// No delivery with the requested ID
    #[error("Delivery not found")]
    NotFound,

    /// The delivery is already received, receiving is only possible once
    #[error("Delivery already received")]
    AlreadyReceived,

    /// No ID could be allocated for a new delivery
    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    /// A connection or query error with the storage
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Item of a delivery to create
///
/// The quantity is not checked yet, see [`CreateDeliveryValues::validate`]
pub struct NewItem<'a> {
    /// Name of the item
    pub name: &'a str,

    /// Requested quantity
    pub quantity: i64,
}

/// Values to create a Delivery
pub struct CreateDeliveryValues<'a> {
    /// Day the ID is allocated for
    pub issued_on: NaiveDate,

    /// Date as shown on the slip
    pub date: &'a str,

    /// Branch the delivery leaves from
    pub from_branch: &'a str,

    /// Branch the delivery goes to
    pub to_branch: &'a str,

    /// Kind of slip
    pub kind: &'a str,

    /// Items in the delivery, in order
    pub items: &'a [NewItem<'a>],

    /// Optional note
    pub note: Option<&'a str>,
}

/// Checked values of a delivery to create
#[derive(Clone, Debug)]
pub struct NewDelivery {
    pub issued_on: NaiveDate,
    pub date: String,
    pub from_branch: String,
    pub to_branch: String,
    pub kind: String,
    pub items: Vec<Item>,
    pub note: Option<String>,
}

impl CreateDeliveryValues<'_> {
    /// Check the values before anything is stored
    ///
    /// Text fields are trimmed, a blank note is no note
    pub fn validate(&self) -> Result<NewDelivery> {
        let date = required("Date", self.date)?;
        let from_branch = required("From branch", self.from_branch)?;
        let to_branch = required("To branch", self.to_branch)?;
        let kind = required("Type", self.kind)?;

        if self.items.is_empty() {
            return Err(Error::Validation(
                "A delivery needs at least one item".to_string(),
            ));
        }

        let items = self
            .items
            .iter()
            .map(validate_item)
            .collect::<Result<Vec<Item>>>()?;

        let note = self
            .note
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(ToString::to_string);

        Ok(NewDelivery {
            issued_on: self.issued_on,
            date,
            from_branch,
            to_branch,
            kind,
            items,
            note,
        })
    }
}

/// Values to mark a Delivery as received
pub struct ReceiveDeliveryValues<'a> {
    /// Name of the person receiving the delivery
    pub received_by: &'a str,
}

impl ReceiveDeliveryValues<'_> {
    /// Check the name of the receiver
    pub fn validate(&self) -> Result<String> {
        required("Receiver", self.received_by)
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();

    if value.is_empty() {
        Err(Error::Validation(format!("{field} can not be empty")))
    } else {
        Ok(value.to_string())
    }
}

fn validate_item(item: &NewItem) -> Result<Item> {
    let name = item.name.trim();

    if name.is_empty() {
        return Err(Error::Validation("Item name can not be empty".to_string()));
    }

    let quantity = u32::try_from(item.quantity)
        .ok()
        .filter(|quantity| (1..=MAX_QUANTITY).contains(quantity))
        .ok_or_else(|| {
            Error::Validation(format!(
                "Quantity of \"{name}\" must be between 1 and {MAX_QUANTITY}"
            ))
        })?;

    Ok(Item {
        name: name.to_string(),
        quantity,
    })
}

/// Filters to list deliveries with
///
/// All filters have to match, a missing or empty filter matches everything
#[derive(Clone, Debug, Default)]
pub struct DeliveryFilter {
    /// Branch the delivery leaves from or goes to
    pub branch: Option<String>,

    /// Exact status
    pub status: Option<Status>,

    /// Earliest slip date, inclusive
    pub date_from: Option<String>,

    /// Latest slip date, inclusive
    pub date_to: Option<String>,

    /// Case-insensitive text within the items
    pub search: Option<String>,
}

impl DeliveryFilter {
    pub fn branch(&self) -> Option<&str> {
        constraint(self.branch.as_ref())
    }

    pub fn date_from(&self) -> Option<&str> {
        constraint(self.date_from.as_ref())
    }

    pub fn date_to(&self) -> Option<&str> {
        constraint(self.date_to.as_ref())
    }

    pub fn search(&self) -> Option<&str> {
        constraint(self.search.as_ref())
    }

    /// Does the delivery pass all filters?
    ///
    /// Dates are compared as text, which only works for zero-padded dates like
    /// `2024-06-15`
    pub fn matches(&self, delivery: &Delivery) -> bool {
        self.branch()
            .is_none_or(|branch| delivery.involves_branch(branch))
            && self.status.is_none_or(|status| delivery.status == status)
            && self
                .date_from()
                .is_none_or(|date_from| delivery.date.as_str() >= date_from)
            && self
                .date_to()
                .is_none_or(|date_to| delivery.date.as_str() <= date_to)
            && self.search().is_none_or(|search| {
                delivery
                    .items_summary()
                    .to_lowercase()
                    .contains(&search.to_lowercase())
            })
    }
}

/// Only non-empty values are a constraint
fn constraint(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|value| !value.is_empty())
}

/// Storage with all supported operations
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    /// Create a delivery, status `sent`
    ///
    /// The delivery and its items are stored together or not at all
    async fn create_delivery(&self, values: &CreateDeliveryValues<'_>) -> Result<Delivery>;

    /// Find all deliveries matching the filter
    ///
    /// Newest first
    async fn find_all_deliveries(&self, filter: &DeliveryFilter) -> Result<Vec<Delivery>>;

    /// Find a single delivery by its ID
    async fn find_single_delivery_by_id(&self, id: &DeliveryId) -> Result<Option<Delivery>>;

    /// Mark a sent delivery as received
    async fn mark_delivery_received(
        &self,
        id: &DeliveryId,
        values: &ReceiveDeliveryValues<'_>,
    ) -> Result<Delivery>;

    /// Delete a delivery with all its items
    ///
    /// The ID is never handed out again
    async fn delete_delivery(&self, id: &DeliveryId) -> Result<()>;
}
