use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use invoicer_shared::errors::AppResult;
use invoicer_shared::middleware::ApiJson;
use invoicer_shared::types::MessageResponse;

use crate::services::auth_service::Credentials;
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<Credentials>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    state.auth.register(&req).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new("registered successfully"))))
}
