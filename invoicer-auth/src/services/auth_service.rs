//! Account, login and session lifecycle.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use invoicer_shared::errors::{AppError, AppResult, ErrorCode};
use invoicer_shared::middleware::ClientInfo;
use invoicer_shared::tokens::{TokenError, TokenIssuer};
use invoicer_shared::types::auth::{TokenKind, TokenPair};

use crate::models::{CompanyMerchant, Merchant, NewSession, NewUser, PersonMerchant, User, ROLE_USER};
use crate::services::hashing;
use crate::store::AuthStore;

/// Username/password pair as submitted to register and login.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 3, max = 255, message = "username must be 3 to 255 characters"))]
    pub username: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MerchantInfo {
    pub merchant: Merchant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonMerchant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanyMerchant>,
}

fn invalid_credentials() -> AppError {
    AppError::new(ErrorCode::InvalidCredentials, "invalid username or password")
}

fn signing_failure(err: TokenError) -> AppError {
    AppError::internal(format!("token issue failed: {err}"))
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(store: Arc<dyn AuthStore>, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    pub async fn register(&self, creds: &Credentials) -> AppResult<User> {
        creds
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self.store.username_exists(&creds.username)? {
            return Err(AppError::new(ErrorCode::UsernameTaken, "username already registered"));
        }

        let password_hash = hashing::hash_secret(&creds.password)?;
        let user = self
            .store
            .create_user(NewUser::new(&creds.username, password_hash), ROLE_USER)?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn is_username_taken(&self, username: &str) -> AppResult<bool> {
        if username.is_empty() {
            return Err(AppError::bad_request("username is required"));
        }
        Ok(self.store.username_exists(username)?)
    }

    /// Unknown usernames and wrong passwords fail identically.
    pub async fn login(&self, creds: &Credentials, client: &ClientInfo) -> AppResult<TokenPair> {
        creds
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let Some(user) = self.store.user_by_username(&creds.username)? else {
            tracing::warn!("login attempt for unknown username");
            return Err(invalid_credentials());
        };

        if !hashing::verify_secret(&creds.password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "login failed: wrong password");
            return Err(invalid_credentials());
        }

        let pair = self.open_session(user.id, client)?;
        tracing::info!(user_id = %user.id, "user logged in");
        Ok(pair)
    }

    /// Signs in through an external provider whose assertion the caller has
    /// already checked. First use creates a verified account linked to the
    /// provider identity.
    pub async fn oauth_login(
        &self,
        provider: &str,
        provider_uid: &str,
        username: Option<&str>,
        client: &ClientInfo,
    ) -> AppResult<TokenPair> {
        if provider.trim().is_empty() || provider_uid.trim().is_empty() {
            return Err(AppError::bad_request("provider and provider_uid are required"));
        }
        if provider.len() > 30 || provider_uid.len() > 191 {
            return Err(AppError::bad_request("provider or provider_uid is too long"));
        }

        let user = match self.store.user_by_login_method(provider, provider_uid)? {
            Some(user) => user,
            None => {
                let username = username
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(String::from)
                    .unwrap_or_else(|| format!("{provider}_{provider_uid}"));
                if username.chars().count() > 255 {
                    return Err(AppError::bad_request("username must be 3 to 255 characters"));
                }

                if self.store.username_exists(&username)? {
                    return Err(AppError::new(
                        ErrorCode::UsernameTaken,
                        "username belongs to another account",
                    ));
                }

                let password_hash = hashing::hash_secret(&hashing::unusable_password())?;
                let user = self.store.create_oauth_user(
                    NewUser::new(username, password_hash).verified(),
                    ROLE_USER,
                    provider,
                    provider_uid,
                )?;
                tracing::info!(user_id = %user.id, provider = %provider, "user created via oauth");
                user
            }
        };

        let pair = self.open_session(user.id, client)?;
        tracing::info!(user_id = %user.id, provider = %provider, "user logged in via oauth");
        Ok(pair)
    }

    /// Rotates a refresh token. The presented token is revoked and can never
    /// be exchanged again; of two concurrent exchanges only one succeeds.
    pub async fn refresh(&self, refresh_token: &str, client: &ClientInfo) -> AppResult<TokenPair> {
        if refresh_token.is_empty() {
            return Err(AppError::bad_request("refresh_token is required"));
        }

        let token_hash = hashing::hash_token(refresh_token);
        let session = self
            .store
            .session_by_token(&token_hash)?
            .ok_or_else(AppError::token_invalid)?;

        if session.revoked {
            tracing::warn!(user_id = %session.user_id, "revoked refresh token presented");
            return Err(AppError::token_invalid());
        }

        if session.is_expired(Utc::now()) {
            self.store.revoke_session(&token_hash)?;
            return Err(AppError::token_invalid());
        }

        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|_| AppError::token_invalid())?;
        if claims.sub != session.user_id {
            return Err(AppError::token_invalid());
        }

        if !self.store.revoke_session(&token_hash)? {
            tracing::warn!(user_id = %session.user_id, "refresh lost a concurrent rotation");
            return Err(AppError::token_invalid());
        }

        let pair = self.open_session(session.user_id, client)?;
        tracing::debug!(user_id = %session.user_id, "refresh token rotated");
        Ok(pair)
    }

    /// Idempotent: unknown or already revoked tokens succeed too.
    pub async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        if refresh_token.is_empty() {
            return Err(AppError::bad_request("refresh_token is required"));
        }
        if self.store.revoke_session(&hashing::hash_token(refresh_token))? {
            tracing::info!("session revoked on logout");
        }
        Ok(())
    }

    pub async fn logout_all(&self, user_id: Uuid) -> AppResult<usize> {
        let revoked = self.store.revoke_all_sessions(user_id)?;
        tracing::info!(user_id = %user_id, revoked, "all sessions revoked");
        Ok(revoked)
    }

    pub async fn profile(&self, user_id: Uuid) -> AppResult<User> {
        self.store
            .user_by_id(user_id)?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))
    }

    pub async fn merchant_info(&self, user_id: Uuid) -> AppResult<Option<MerchantInfo>> {
        let Some(merchant) = self.store.merchant_by_user(user_id)? else {
            return Ok(None);
        };

        let (person, company) = match merchant.merchant_type.as_str() {
            "person" => (self.store.person_detail(merchant.id)?, None),
            "company" => (None, self.store.company_detail(merchant.id)?),
            _ => (None, None),
        };

        Ok(Some(MerchantInfo {
            merchant,
            person,
            company,
        }))
    }

    /// True once the user's merchant has at least one store.
    pub async fn merchant_store_set(&self, user_id: Uuid) -> AppResult<bool> {
        match self.store.merchant_by_user(user_id)? {
            Some(merchant) => Ok(self.store.has_store(merchant.id)?),
            None => Ok(false),
        }
    }

    fn open_session(&self, user_id: Uuid, client: &ClientInfo) -> AppResult<TokenPair> {
        let role = self
            .store
            .primary_role(user_id)?
            .unwrap_or_else(|| ROLE_USER.to_string());

        let pair = self
            .tokens
            .issue_pair(user_id, &role)
            .map_err(signing_failure)?;

        self.store.create_session(NewSession {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hashing::hash_token(&pair.refresh.token),
            user_agent: client.user_agent.clone(),
            ip_address: client.ip_address.clone(),
            expires_at: pair.refresh.expires_at,
        })?;

        Ok(pair.into_token_pair())
    }
}
