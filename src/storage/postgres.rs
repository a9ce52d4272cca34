//! Postgres storage
//!
//! Items are stored in their own table, a delivery and its items are always written in
//! one transaction

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::PgPool;
use sqlx::QueryBuilder;
use sqlx::Transaction;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgExecutor;
use sqlx::postgres::PgPoolOptions;

use crate::deliveries::Delivery;
use crate::deliveries::Item;
use crate::deliveries::Status;
use crate::identifiers::AllocationError;
use crate::identifiers::DeliveryId;
use crate::identifiers::next_id;

use super::CreateDeliveryValues;
use super::DeliveryFilter;
use super::Error;
use super::ReceiveDeliveryValues;
use super::Result;
use super::Storage;

/// Migrator to run migrations on startup
static MIGRATOR: Migrator = sqlx::migrate!();

/// Columns of a delivery, in the order of [`SqlxDelivery`]
const DELIVERY_COLUMNS: &str = "deliveries.id, deliveries.date, deliveries.from_branch, \
    deliveries.to_branch, deliveries.type, deliveries.status, deliveries.note, \
    deliveries.created_at, deliveries.received_at, deliveries.received_by";

/// Postgres type for delivery status
#[derive(Clone, Copy, PartialEq, Debug, sqlx::Type)]
#[sqlx(type_name = "delivery_status")]
#[sqlx(rename_all = "kebab-case")]
enum DeliveryStatusType {
    /// Sent
    Sent,

    /// Received
    Received,
}

impl DeliveryStatusType {
    /// Create delivery status type from status
    fn from_status(status: Status) -> Self {
        match status {
            Status::Sent => DeliveryStatusType::Sent,
            Status::Received => DeliveryStatusType::Received,
        }
    }

    /// Create status from delivery status type
    fn to_status(self) -> Status {
        match self {
            DeliveryStatusType::Sent => Status::Sent,
            DeliveryStatusType::Received => Status::Received,
        }
    }
}

/// `SQLx` version of a delivery, without items
#[derive(sqlx::FromRow)]
struct SqlxDelivery {
    id: String,
    date: String,
    from_branch: String,
    to_branch: String,
    #[sqlx(rename = "type")]
    kind: String,
    status: DeliveryStatusType,
    note: Option<String>,
    created_at: NaiveDateTime,
    received_at: Option<NaiveDateTime>,
    received_by: Option<String>,
}

impl SqlxDelivery {
    /// Create delivery from `SQLx` version with its items
    fn into_delivery(self, items: Vec<Item>) -> Result<Delivery> {
        let id = self
            .id
            .parse::<DeliveryId>()
            .map_err(|err| Error::Connection(err.to_string()))?;

        Ok(Delivery {
            id,
            date: self.date,
            from_branch: self.from_branch,
            to_branch: self.to_branch,
            kind: self.kind,
            items,
            status: self.status.to_status(),
            note: self.note,
            created_at: self.created_at,
            received_at: self.received_at,
            received_by: self.received_by,
        })
    }
}

/// `SQLx` version of an item
#[derive(sqlx::FromRow)]
struct SqlxItem {
    delivery_id: String,
    name: String,
    quantity: i32,
}

/// Postgres storage
#[derive(Clone)]
pub struct Postgres {
    /// Pool of connections
    connection_pool: PgPool,
}

impl Postgres {
    /// Create Postgres storage
    ///
    /// Migrations will be run
    pub async fn connect(database_url: &str) -> Result<Self> {
        let connection_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
            .map_err(connection_error)?;

        Self::with_pool(connection_pool).await
    }

    /// Create Postgres storage with existing pool
    ///
    /// Migrations will be run
    pub async fn with_pool(connection_pool: PgPool) -> Result<Self> {
        MIGRATOR
            .run(&connection_pool)
            .await
            .map_err(|err| Error::Connection(format!("Migrations could not run: {err}")))?;

        Ok(Self { connection_pool })
    }

    /// Start a read-only transaction where every statement sees the same snapshot
    ///
    /// Deliveries and their items are read in separate statements, a delete in between
    /// would otherwise leave a delivery without items
    async fn begin_snapshot(&self) -> Result<Transaction<'static, sqlx::Postgres>> {
        let mut transaction = self
            .connection_pool
            .begin()
            .await
            .map_err(connection_error)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *transaction)
            .await
            .map_err(connection_error)?;

        Ok(transaction)
    }
}

#[async_trait]
impl Storage for Postgres {
    async fn create_delivery(&self, values: &CreateDeliveryValues<'_>) -> Result<Delivery> {
        let new_delivery = values.validate()?;
        let day = new_delivery.issued_on;

        let mut transaction = self
            .connection_pool
            .begin()
            .await
            .map_err(connection_error)?;

        sqlx::query(
            r"
            INSERT INTO delivery_sequences (day)
            VALUES ($1)
            ON CONFLICT (day) DO NOTHING
            ",
        )
        .bind(day)
        .execute(&mut *transaction)
        .await
        .map_err(lookup_error)?;

        // the row lock keeps other creates for the same day waiting until commit
        let last_sequence = sqlx::query_scalar::<_, i32>(
            r"
            SELECT last_sequence
            FROM delivery_sequences
            WHERE day = $1
            FOR UPDATE
            ",
        )
        .bind(day)
        .fetch_one(&mut *transaction)
        .await
        .map_err(lookup_error)?;

        let latest_existing = sqlx::query_scalar::<_, Option<i32>>(
            r"
            SELECT MAX(sequence)
            FROM deliveries
            WHERE day = $1
            ",
        )
        .bind(day)
        .fetch_one(&mut *transaction)
        .await
        .map_err(lookup_error)?;

        let latest = u32::try_from(last_sequence.max(latest_existing.unwrap_or(0)))
            .ok()
            .filter(|latest| *latest > 0);

        let id = next_id(day, latest)?;

        let row = sqlx::query_as::<_, SqlxDelivery>(&format!(
            r"
            INSERT INTO deliveries (id, day, sequence, date, from_branch, to_branch, type, status, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {DELIVERY_COLUMNS}
            "
        ))
        .bind(id.to_string())
        .bind(id.day())
        .bind(sql_sequence(&id))
        .bind(&new_delivery.date)
        .bind(&new_delivery.from_branch)
        .bind(&new_delivery.to_branch)
        .bind(&new_delivery.kind)
        .bind(DeliveryStatusType::Sent)
        .bind(&new_delivery.note)
        .fetch_one(&mut *transaction)
        .await
        .map_err(connection_error)?;

        for (position, item) in new_delivery.items.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| Error::Validation("Too many items".to_string()))?;
            let quantity = i32::try_from(item.quantity)
                .map_err(|_| Error::Validation(format!("Quantity of \"{}\" is too large", item.name)))?;

            sqlx::query(
                r"
                INSERT INTO delivery_items (delivery_id, position, name, quantity)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(id.to_string())
            .bind(position)
            .bind(&item.name)
            .bind(quantity)
            .execute(&mut *transaction)
            .await
            .map_err(connection_error)?;
        }

        sqlx::query(
            r"
            UPDATE delivery_sequences
            SET last_sequence = $2
            WHERE day = $1
            ",
        )
        .bind(day)
        .bind(sql_sequence(&id))
        .execute(&mut *transaction)
        .await
        .map_err(connection_error)?;

        transaction.commit().await.map_err(connection_error)?;

        row.into_delivery(new_delivery.items)
    }

    async fn find_all_deliveries(&self, filter: &DeliveryFilter) -> Result<Vec<Delivery>> {
        let mut query = QueryBuilder::<sqlx::Postgres>::new(format!(
            "SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE TRUE"
        ));

        if let Some(branch) = filter.branch() {
            query
                .push(" AND (deliveries.from_branch = ")
                .push_bind(branch)
                .push(" OR deliveries.to_branch = ")
                .push_bind(branch)
                .push(")");
        }

        if let Some(status) = filter.status {
            query
                .push(" AND deliveries.status = ")
                .push_bind(DeliveryStatusType::from_status(status));
        }

        if let Some(date_from) = filter.date_from() {
            query.push(" AND deliveries.date >= ").push_bind(date_from);
        }

        if let Some(date_to) = filter.date_to() {
            query.push(" AND deliveries.date <= ").push_bind(date_to);
        }

        if let Some(search) = filter.search() {
            query
                .push(
                    " AND (
                        SELECT string_agg(
                            delivery_items.name || '(' || delivery_items.quantity || ')',
                            '; ' ORDER BY delivery_items.position
                        )
                        FROM delivery_items
                        WHERE delivery_items.delivery_id = deliveries.id
                    ) ILIKE ",
                )
                .push_bind(format!("%{}%", escape_like(search)));
        }

        query.push(" ORDER BY deliveries.created_at DESC, deliveries.id DESC");

        let mut transaction = self.begin_snapshot().await?;

        let rows = query
            .build_query_as::<SqlxDelivery>()
            .fetch_all(&mut *transaction)
            .await
            .map_err(connection_error)?;

        let ids = rows.iter().map(|row| row.id.clone()).collect::<Vec<String>>();
        let mut items = find_items(&mut *transaction, &ids).await?;

        transaction.commit().await.map_err(connection_error)?;

        rows.into_iter()
            .map(|row| {
                let delivery_items = take_items(&mut items, &row.id)?;
                row.into_delivery(delivery_items)
            })
            .collect()
    }

    async fn find_single_delivery_by_id(&self, id: &DeliveryId) -> Result<Option<Delivery>> {
        let mut transaction = self.begin_snapshot().await?;

        let row = sqlx::query_as::<_, SqlxDelivery>(&format!(
            r"
            SELECT {DELIVERY_COLUMNS}
            FROM deliveries
            WHERE id = $1
            LIMIT 1
            "
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(connection_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut items = find_items(&mut *transaction, std::slice::from_ref(&row.id)).await?;

        transaction.commit().await.map_err(connection_error)?;

        let delivery_items = take_items(&mut items, &row.id)?;

        row.into_delivery(delivery_items).map(Some)
    }

    async fn mark_delivery_received(
        &self,
        id: &DeliveryId,
        values: &ReceiveDeliveryValues<'_>,
    ) -> Result<Delivery> {
        let received_by = values.validate()?;

        let mut transaction = self
            .connection_pool
            .begin()
            .await
            .map_err(connection_error)?;

        let status = sqlx::query_scalar::<_, DeliveryStatusType>(
            r"
            SELECT status
            FROM deliveries
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(connection_error)?;

        match status {
            None => return Err(Error::NotFound),
            Some(DeliveryStatusType::Received) => return Err(Error::AlreadyReceived),
            Some(DeliveryStatusType::Sent) => {}
        }

        let row = sqlx::query_as::<_, SqlxDelivery>(&format!(
            r"
            UPDATE deliveries
            SET status = $2, received_at = CURRENT_TIMESTAMP, received_by = $3
            WHERE id = $1
            RETURNING {DELIVERY_COLUMNS}
            "
        ))
        .bind(id.to_string())
        .bind(DeliveryStatusType::Received)
        .bind(&received_by)
        .fetch_one(&mut *transaction)
        .await
        .map_err(connection_error)?;

        let mut items = find_items(&mut *transaction, std::slice::from_ref(&row.id)).await?;

        transaction.commit().await.map_err(connection_error)?;

        let delivery_items = take_items(&mut items, &row.id)?;

        row.into_delivery(delivery_items)
    }

    async fn delete_delivery(&self, id: &DeliveryId) -> Result<()> {
        // items go with the delivery by `ON DELETE CASCADE`
        let result = sqlx::query(
            r"
            DELETE FROM deliveries
            WHERE id = $1
            ",
        )
        .bind(id.to_string())
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        if result.rows_affected() == 0 {
            Err(Error::NotFound)
        } else {
            Ok(())
        }
    }
}

/// Find the items of multiple deliveries, grouped by delivery ID, in order
async fn find_items<'e, E>(executor: E, delivery_ids: &[String]) -> Result<HashMap<String, Vec<Item>>>
where
    E: PgExecutor<'e>,
{
    if delivery_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, SqlxItem>(
        r"
        SELECT delivery_id, name, quantity
        FROM delivery_items
        WHERE delivery_id = ANY($1)
        ORDER BY delivery_id, position
        ",
    )
    .bind(delivery_ids)
    .fetch_all(executor)
    .await
    .map_err(connection_error)?;

    let mut items = HashMap::<String, Vec<Item>>::new();

    for row in rows {
        let quantity = u32::try_from(row.quantity)
            .map_err(|err| Error::Connection(format!("Invalid quantity: {err}")))?;

        items.entry(row.delivery_id).or_default().push(Item {
            name: row.name,
            quantity,
        });
    }

    Ok(items)
}

/// Take the items of a single delivery, every delivery has at least one
fn take_items(items: &mut HashMap<String, Vec<Item>>, delivery_id: &str) -> Result<Vec<Item>> {
    items
        .remove(delivery_id)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| Error::Connection(format!("Delivery {delivery_id} has no items")))
}

/// Sequences stay below `MAX_SEQUENCE`, they always fit an `INTEGER`
fn sql_sequence(id: &DeliveryId) -> i32 {
    i32::try_from(id.sequence()).unwrap_or(i32::MAX)
}

/// Escape the wildcards of a `LIKE` pattern
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }

        escaped.push(ch);
    }

    escaped
}

/// Convert `SQLx` to storage connection error
fn connection_error<E>(err: E) -> Error
where
    E: std::error::Error,
{
    Error::Connection(err.to_string())
}

/// Convert `SQLx` to allocation lookup error
fn lookup_error<E>(err: E) -> Error
where
    E: std::error::Error,
{
    Error::Allocation(AllocationError::Lookup(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!("widget", escape_like("widget"));
        assert_eq!("100\\%", escape_like("100%"));
        assert_eq!("a\\_b", escape_like("a_b"));
        assert_eq!("c:\\\\", escape_like("c:\\"));
    }

    #[test]
    fn test_take_items() {
        let mut items = HashMap::from([(
            "20240615-001".to_string(),
            vec![Item {
                name: "WidgetX".to_string(),
                quantity: 3,
            }],
        )]);

        let found = take_items(&mut items, "20240615-001").unwrap();
        assert_eq!("WidgetX", found[0].name);

        // already taken, or never there
        assert!(matches!(
            take_items(&mut items, "20240615-001"),
            Err(Error::Connection(_))
        ));
        assert!(matches!(
            take_items(&mut items, "20240615-002"),
            Err(Error::Connection(_))
        ));
    }
}
