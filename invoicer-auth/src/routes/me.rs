use axum::extract::State;
use axum::Json;
use serde::Serialize;

use invoicer_shared::errors::AppResult;
use invoicer_shared::types::auth::AuthUser;

use crate::models::User;
use crate::services::auth_service::MerchantInfo;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_info: Option<MerchantInfo>,
}

#[derive(Debug, Serialize)]
pub struct MerchantStatusResponse {
    pub merchant_store_set: bool,
}

pub async fn me(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<MeResponse>> {
    let profile = state.auth.profile(user.id).await?;
    let merchant_info = state.auth.merchant_info(user.id).await?;

    Ok(Json(MeResponse {
        user: profile,
        merchant_info,
    }))
}

pub async fn merchant_status(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<MerchantStatusResponse>> {
    let merchant_store_set = state.auth.merchant_store_set(user.id).await?;
    Ok(Json(MerchantStatusResponse { merchant_store_set }))
}
