use serde::Serialize;
use utoipa::ToSchema;

/// Payload of `/healthcheck`, reflecting storage reachability.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"ok"` when the poll store is installed, `"degraded"` otherwise.
    pub status: String,
}

impl HealthResponse {
    /// The store is installed and serving requests.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    /// No store is installed; store-dependent operations fail fast until the
    /// supervisor reconnects.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
        }
    }
}
