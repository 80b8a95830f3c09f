use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::tokens::TokenIssuer;
use crate::types::auth::{AuthUser, TokenKind};

/// Bearer access token holder. Any role known to [`crate::types::UserRole`]
/// passes; an unknown scope is rejected with 403.
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    TokenIssuer: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let issuer = TokenIssuer::from_ref(state);

        let claims = issuer
            .verify(token, TokenKind::Access)
            .map_err(|_| AppError::token_invalid())?;

        let role = claims
            .role()
            .ok_or_else(|| AppError::forbidden(format!("role {} not allowed", claims.scope)))?;

        Ok(AuthUser {
            id: claims.sub,
            role,
            token_id: claims.jti,
        })
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("invalid authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("authorization header must use Bearer scheme"))
}

/// Optional auth extractor
pub struct OptionalAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    TokenIssuer: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(AuthUser::from_request_parts(parts, state).await.ok()))
    }
}

/// Originating user agent and address of a request.
///
/// The address comes from the first `X-Forwarded-For` hop when it parses as an
/// IP address, else from the socket when the server was started with connect
/// info. The header is client controlled unless a proxy overwrites it.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: String,
    pub ip_address: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|hop| hop.trim().parse::<IpAddr>().ok());

        let ip_address = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .map(|ip| ip.to_string())
            .unwrap_or_default();

        Ok(Self {
            user_agent,
            ip_address,
        })
    }
}
