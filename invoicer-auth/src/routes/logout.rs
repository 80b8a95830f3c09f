use axum::extract::State;
use axum::Json;
use serde::Serialize;

use invoicer_shared::errors::AppResult;
use invoicer_shared::middleware::ApiJson;
use invoicer_shared::types::auth::AuthUser;
use invoicer_shared::types::MessageResponse;

use super::refresh::RefreshRequest;
use crate::AppState;

pub async fn logout(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.auth.logout(&req.refresh_token).await?;
    Ok(Json(MessageResponse::new("logged out")))
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub message: String,
    pub revoked: usize,
}

/// Ends every session of the caller, this one included.
pub async fn logout_all(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<LogoutAllResponse>> {
    let revoked = state.auth.logout_all(user.id).await?;
    Ok(Json(LogoutAllResponse {
        message: "logged out everywhere".into(),
        revoked,
    }))
}
