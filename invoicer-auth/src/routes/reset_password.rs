use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use invoicer_shared::errors::AppResult;
use invoicer_shared::middleware::ApiJson;
use invoicer_shared::types::MessageResponse;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub code: String,
    #[serde(default)]
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .otp
        .reset_password(&req.email, &req.reference, &req.code, &req.new_password)
        .await?;
    Ok(Json(MessageResponse::new("password reset successfully")))
}
