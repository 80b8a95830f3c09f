use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use invoicer_shared::middleware::{ClientInfo, OptionalAuthUser};

use crate::models::NewAuditEntry;
use crate::AppState;

/// Appends one `user_logs` row per request after the response is built.
/// The write runs detached; a failed write is logged and dropped.
pub async fn audit_log(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    client: ClientInfo,
    req: Request,
    next: Next,
) -> Response {
    let started_at = Utc::now();
    // `user_logs.action` is VARCHAR(10); extension methods can be longer.
    let action: String = req.method().as_str().chars().take(10).collect();
    let resource = req.uri().to_string();

    let response = next.run(req).await;

    let entry = NewAuditEntry {
        user_id: user.map(|u| u.id),
        ip_address: client.ip_address,
        action,
        resource,
        device_info: client.user_agent,
        started_at,
        status: i32::from(response.status().as_u16()),
    };

    let store = state.store.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = store.record(entry) {
            tracing::warn!(error = %e, "audit log write failed");
        }
    });

    response
}
