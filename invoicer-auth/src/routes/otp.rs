use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use invoicer_shared::errors::AppResult;
use invoicer_shared::middleware::ApiJson;
use invoicer_shared::types::MessageResponse;

use crate::services::otp_service::VerifyOtpRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub message: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

pub async fn send_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SendOtpRequest>,
) -> AppResult<Json<SendOtpResponse>> {
    let reference = state.otp.send(&req.email, &req.purpose).await?;
    Ok(Json(SendOtpResponse {
        message: "otp sent".into(),
        reference,
    }))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyOtpRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.otp.verify(&req).await?;
    Ok(Json(MessageResponse::new("otp verified")))
}
