use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use invoicer_shared::errors::AppResult;
use invoicer_shared::middleware::ApiJson;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckEmailRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct CheckEmailResponse {
    pub taken: bool,
}

pub async fn check_email(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CheckEmailRequest>,
) -> AppResult<Json<CheckEmailResponse>> {
    let taken = state.auth.is_username_taken(&req.username).await?;
    Ok(Json(CheckEmailResponse { taken }))
}
