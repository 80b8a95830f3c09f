use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use invoicer_shared::errors::AppResult;
use invoicer_shared::middleware::{ApiJson, ClientInfo};
use invoicer_shared::types::auth::TokenPair;

use crate::AppState;

/// Identity already asserted by the provider; the assertion itself is checked
/// upstream of this service.
#[derive(Debug, Deserialize)]
pub struct OAuthLoginRequest {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub provider_uid: String,
    pub username: Option<String>,
}

pub async fn oauth_login(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(req): ApiJson<OAuthLoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = state
        .auth
        .oauth_login(&req.provider, &req.provider_uid, req.username.as_deref(), &client)
        .await?;
    Ok(Json(pair))
}
