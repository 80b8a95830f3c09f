use axum::extract::State;
use axum::Json;

use invoicer_shared::errors::AppResult;
use invoicer_shared::middleware::{ApiJson, ClientInfo};
use invoicer_shared::types::auth::TokenPair;

use crate::services::auth_service::Credentials;
use crate::AppState;

pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(req): ApiJson<Credentials>,
) -> AppResult<Json<TokenPair>> {
    let pair = state.auth.login(&req, &client).await?;
    Ok(Json(pair))
}
