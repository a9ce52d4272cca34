//! Memory storage
//!
//! Will be destroyed on system shutdown, unless a snapshot file is used

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::deliveries::Delivery;
use crate::deliveries::Status;
use crate::identifiers::DeliveryId;
use crate::identifiers::latest_sequence;
use crate::identifiers::next_id;

use super::CreateDeliveryValues;
use super::DeliveryFilter;
use super::Error;
use super::ReceiveDeliveryValues;
use super::Result;
use super::Storage;

/// Everything the memory storage knows
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct State {
    /// All deliveries in storage
    deliveries: BTreeMap<DeliveryId, Delivery>,

    /// Last sequence handed out per day, survives deletes
    sequences: BTreeMap<NaiveDate, u32>,
}

/// An in-memory storage
///
/// One lock guards all state, so allocating an ID and storing the delivery can not
/// interleave with another create
#[derive(Clone, Debug)]
pub struct Memory {
    /// All state in storage
    state: Arc<Mutex<State>>,

    /// Optional file with a JSON snapshot of the state
    snapshot: Option<PathBuf>,
}

impl Memory {
    /// Create a new empty Memory storage
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            snapshot: None,
        }
    }

    /// Create a Memory storage backed by a snapshot file
    ///
    /// An existing file is loaded, a missing or empty file starts empty
    pub async fn with_file(path: PathBuf) -> Result<Self> {
        let state = match tokio::fs::read(&path).await {
            Ok(contents) if contents.iter().all(u8::is_ascii_whitespace) => State::default(),
            Ok(contents) => serde_json::from_slice::<State>(&contents).map_err(|err| {
                Error::Connection(format!("Invalid snapshot {}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!("No snapshot at {}, starting empty", path.display());

                State::default()
            }
            Err(err) => return Err(snapshot_error(&err)),
        };

        tracing::info!("Loaded {} deliveries", state.deliveries.len());

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            snapshot: Some(path),
        })
    }

    /// Apply a change to the state
    ///
    /// A change only mutates the state once it can no longer fail. With a snapshot the
    /// change works on a copy that replaces the state after the snapshot is written
    async fn update<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut State) -> Result<T>,
    {
        let mut state = self.state.lock().await;

        let Some(path) = &self.snapshot else {
            return change(&mut state);
        };

        let mut next_state = state.clone();
        let result = change(&mut next_state)?;

        write_snapshot(path, &next_state).await?;

        *state = next_state;

        Ok(result)
    }
}

/// Write the snapshot next to the target first, then move it in place
async fn write_snapshot(path: &Path, state: &State) -> Result<()> {
    let contents = serde_json::to_vec_pretty(state).map_err(|err| snapshot_error(&err))?;

    let temporary_path = path.with_extension("tmp");

    tokio::fs::write(&temporary_path, contents)
        .await
        .map_err(|err| snapshot_error(&err))?;

    tokio::fs::rename(&temporary_path, path)
        .await
        .map_err(|err| snapshot_error(&err))
}

fn snapshot_error<E>(err: &E) -> Error
where
    E: std::error::Error,
{
    Error::Connection(format!("Snapshot error: {err}"))
}

#[async_trait]
impl Storage for Memory {
    async fn create_delivery(&self, values: &CreateDeliveryValues<'_>) -> Result<Delivery> {
        let new_delivery = values.validate()?;

        self.update(move |state| {
            let day = new_delivery.issued_on;

            let latest = state
                .sequences
                .get(&day)
                .copied()
                .max(latest_sequence(day, state.deliveries.keys()));

            let id = next_id(day, latest)?;

            let delivery = Delivery {
                id,
                date: new_delivery.date,
                from_branch: new_delivery.from_branch,
                to_branch: new_delivery.to_branch,
                kind: new_delivery.kind,
                items: new_delivery.items,
                status: Status::Sent,
                note: new_delivery.note,
                created_at: Utc::now().naive_utc(),
                received_at: None,
                received_by: None,
            };

            state.sequences.insert(day, id.sequence());
            state.deliveries.insert(id, delivery.clone());

            Ok(delivery)
        })
        .await
    }

    async fn find_all_deliveries(&self, filter: &DeliveryFilter) -> Result<Vec<Delivery>> {
        let mut deliveries = self
            .state
            .lock()
            .await
            .deliveries
            .values()
            .filter(|delivery| filter.matches(delivery))
            .cloned()
            .collect::<Vec<Delivery>>();

        deliveries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(deliveries)
    }

    async fn find_single_delivery_by_id(&self, id: &DeliveryId) -> Result<Option<Delivery>> {
        Ok(self.state.lock().await.deliveries.get(id).cloned())
    }

    async fn mark_delivery_received(
        &self,
        id: &DeliveryId,
        values: &ReceiveDeliveryValues<'_>,
    ) -> Result<Delivery> {
        let received_by = values.validate()?;

        self.update(move |state| {
            let delivery = state.deliveries.get_mut(id).ok_or(Error::NotFound)?;

            if delivery.is_received() {
                return Err(Error::AlreadyReceived);
            }

            delivery.status = Status::Received;
            delivery.received_at = Some(Utc::now().naive_utc());
            delivery.received_by = Some(received_by);

            Ok(delivery.clone())
        })
        .await
    }

    async fn delete_delivery(&self, id: &DeliveryId) -> Result<()> {
        self.update(|state| {
            state
                .deliveries
                .remove(id)
                .map(|_| ())
                .ok_or(Error::NotFound)
        })
        .await
    }
}
