//! All API endpoint setup

use axum::Router;
use axum::routing::get;
use axum::routing::put;

pub use request::Form;
pub use request::PathParameters;
pub use request::QueryParameters;
pub use response::Error;
pub use response::Success;

use crate::storage::Storage;

mod branches;
mod deliveries;
mod export;
mod request;
mod response;

/// Get the Axum router for all API routes
pub fn router<S: Storage>() -> Router {
    let deliveries = Router::new()
        .route(
            "/",
            get(deliveries::list::<S>).post(deliveries::create::<S>),
        )
        .route(
            "/{delivery}",
            get(deliveries::single::<S>).delete(deliveries::delete::<S>),
        )
        .route(
            "/{delivery}/receive",
            put(deliveries::receive::<S>).patch(deliveries::receive::<S>),
        );

    Router::new()
        .route("/branches", get(branches::list))
        .route("/export/csv", get(export::csv::<S>))
        .nest("/deliveries", deliveries)
}

/// Anything not matching a route
pub async fn not_found() -> Error {
    Error::not_found("Not found")
}
