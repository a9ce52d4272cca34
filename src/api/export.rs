//! Export API endpoints

use axum::Extension;
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

use crate::export::deliveries_to_csv;
use crate::storage::DeliveryFilter;
use crate::storage::Storage;

use super::Error;

/// Export all deliveries as CSV, newest first
///
/// Request:
/// ```sh
/// curl -v -o deliveries.csv http://localhost:3001/api/export/csv
/// ```
pub async fn csv<S: Storage>(
    Extension(storage): Extension<S>,
) -> Result<impl IntoResponse, Error> {
    let deliveries = storage
        .find_all_deliveries(&DeliveryFilter::default())
        .await?;

    let csv = deliveries_to_csv(&deliveries).map_err(|err| {
        tracing::error!("Could not write CSV export: {err}");

        Error::internal_server_error("Could not export deliveries")
    })?;

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8"),
            (CONTENT_DISPOSITION, "attachment; filename=deliveries.csv"),
        ],
        csv,
    ))
}
