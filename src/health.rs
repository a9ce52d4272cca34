//! Health check, for load balancers and uptime monitors

use std::time::Instant;

use axum::Extension;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use crate::utils::env_var_or_else;

/// What the health check knows about the running service
#[derive(Clone, Debug)]
pub struct Health {
    started_at: Instant,
    environment: String,
}

impl Health {
    pub fn new(environment: String) -> Self {
        Self {
            started_at: Instant::now(),
            environment,
        }
    }

    /// Read the environment name from `ENVIRONMENT`, defaults to `development`
    pub fn from_env() -> Self {
        Self::new(env_var_or_else("ENVIRONMENT", || {
            String::from("development")
        }))
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,

    /// Seconds since startup
    uptime: f64,
    environment: String,
}

/// Health check
///
/// Request:
/// ```sh
/// curl -v http://localhost:3001/health
/// ```
pub async fn health(Extension(health): Extension<Health>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        uptime: health.started_at.elapsed().as_secs_f64(),
        environment: health.environment,
    })
}
