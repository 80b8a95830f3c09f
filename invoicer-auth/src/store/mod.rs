//! Persistence seams for users, sessions, one-time codes, the audit log and
//! merchant lookups.
//!
//! Every trait is synchronous; the Postgres implementation blocks on a pooled
//! connection and the in-memory one on a lock. Soft-deleted users are never
//! returned by any lookup.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use invoicer_shared::errors::{AppError, ErrorCode};

use crate::models::{
    CompanyMerchant, Merchant, NewAuditEntry, NewOtp, NewSession, NewUser, Otp, OtpPurpose,
    PersonMerchant, Session, User,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => {
                AppError::new(ErrorCode::UsernameTaken, format!("{what} already exists"))
            }
            // A missing seed row is a deployment fault, not a client error.
            StoreError::NotFound(what) => AppError::internal(format!("{what} not found")),
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Pool(e) => AppError::internal(format!("connection pool: {e}")),
        }
    }
}

pub trait CredentialStore: Send + Sync {
    /// Inserts the user and its role assignment atomically.
    fn create_user(&self, user: NewUser, role: &str) -> StoreResult<User>;

    /// Inserts the user, its role and the provider link atomically.
    fn create_oauth_user(
        &self,
        user: NewUser,
        role: &str,
        provider: &str,
        provider_uid: &str,
    ) -> StoreResult<User>;

    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// Counts soft-deleted accounts too; their usernames are never reused.
    fn username_exists(&self, username: &str) -> StoreResult<bool>;
    fn user_by_login_method(&self, provider: &str, provider_uid: &str) -> StoreResult<Option<User>>;
    fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> StoreResult<()>;
    fn set_verified(&self, user_id: Uuid) -> StoreResult<()>;
    fn assign_role(&self, user_id: Uuid, role: &str) -> StoreResult<()>;

    /// Name of the earliest role assignment.
    fn primary_role(&self, user_id: Uuid) -> StoreResult<Option<String>>;

    /// Idempotent.
    fn seed_roles(&self) -> StoreResult<()>;

    /// Round trip to the backing database.
    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub trait SessionStore: Send + Sync {
    fn create_session(&self, session: NewSession) -> StoreResult<Session>;
    fn session_by_token(&self, token_hash: &str) -> StoreResult<Option<Session>>;

    /// Flips `revoked` only if it was still false. Returns whether this call
    /// did the flip.
    fn revoke_session(&self, token_hash: &str) -> StoreResult<bool>;

    fn revoke_all_sessions(&self, user_id: Uuid) -> StoreResult<usize>;
}

pub trait OtpStore: Send + Sync {
    fn create_otp(&self, otp: NewOtp) -> StoreResult<Otp>;

    /// Newest active record for the triple.
    fn active_otp(
        &self,
        destination: &str,
        purpose: OtpPurpose,
        reference: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Otp>>;

    /// Returns the new attempt count.
    fn increment_attempts(&self, id: i64) -> StoreResult<i32>;

    /// Marks the record used if it is still unused and unrevoked.
    fn mark_otp_used(&self, id: i64, now: DateTime<Utc>) -> StoreResult<bool>;

    fn revoke_otp(&self, id: i64, now: DateTime<Utc>) -> StoreResult<()>;
}

pub trait AuditStore: Send + Sync {
    fn record(&self, entry: NewAuditEntry) -> StoreResult<()>;
}

pub trait MerchantStore: Send + Sync {
    fn merchant_by_user(&self, user_id: Uuid) -> StoreResult<Option<Merchant>>;
    fn person_detail(&self, merchant_id: Uuid) -> StoreResult<Option<PersonMerchant>>;
    fn company_detail(&self, merchant_id: Uuid) -> StoreResult<Option<CompanyMerchant>>;
    fn has_store(&self, merchant_id: Uuid) -> StoreResult<bool>;
}

/// Everything the service needs behind one object.
pub trait AuthStore: CredentialStore + SessionStore + OtpStore + AuditStore + MerchantStore {}

impl<T> AuthStore for T where T: CredentialStore + SessionStore + OtpStore + AuditStore + MerchantStore {}
