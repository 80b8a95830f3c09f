use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use invoicer_shared::errors::AppResult;
use invoicer_shared::middleware::{ApiJson, ClientInfo};
use invoicer_shared::types::auth::TokenPair;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = state.auth.refresh(&req.refresh_token, &client).await?;
    Ok(Json(pair))
}
