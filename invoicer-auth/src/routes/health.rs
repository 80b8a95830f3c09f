use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use invoicer_shared::types::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

fn probe(name: &str, failure: HealthStatus, result: Result<(), String>) -> HealthCheck {
    match result {
        Ok(()) => HealthCheck {
            name: name.to_string(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(detail) => {
            tracing::warn!(check = name, error = %detail, "health probe failed");
            HealthCheck {
                name: name.to_string(),
                status: failure,
                message: Some("unreachable".into()),
            }
        }
    }
}

/// Probes the database and the OTP throttle backend. A dead database is
/// unhealthy; a dead throttle only degrades OTP sends.
pub async fn health_check(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    let database = match tokio::task::spawn_blocking(move || store.ping()).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    let limiter = state.limiter.ping().await.map_err(|e| format!("{e:?}"));

    let response = HealthResponse::healthy("invoicer-auth", env!("CARGO_PKG_VERSION")).with_checks(vec![
        probe("database", HealthStatus::Unhealthy, database),
        probe("rate_limiter", HealthStatus::Degraded, limiter),
    ]);

    let status = match response.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status, Json(response)).into_response()
}
