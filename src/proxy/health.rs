use axum::Json;
use serde::Serialize;

pub const SERVICE_NAME: &str = "mimic-gateway";

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
}

/// `GET /health`. Liveness only; upstream reachability is not probed.
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        service: SERVICE_NAME,
    })
}
