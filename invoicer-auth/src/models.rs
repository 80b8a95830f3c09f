use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{
    company_merchants, merchants, otps, person_merchants, user_login_methods, user_logs,
    user_roles, user_sessions, users,
};

// --- Users ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub is_verified: bool,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            is_verified: false,
        }
    }

    pub fn verified(mut self) -> Self {
        self.is_verified = true;
        self
    }
}

// --- Roles ---

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// Roles inserted at startup, with their descriptions.
pub const SEED_ROLES: [(&str, &str); 2] = [
    (ROLE_USER, "Default role for registered merchants"),
    (ROLE_ADMIN, "Back-office administrator"),
];

#[derive(Debug, Insertable)]
#[diesel(table_name = user_roles)]
pub struct NewUserRole {
    pub user_id: Uuid,
    pub role_id: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_login_methods)]
pub struct NewLoginMethod {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_uid: String,
}

// --- Sessions ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = user_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub user_agent: String,
    pub ip_address: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_sessions)]
pub struct NewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub user_agent: String,
    pub ip_address: String,
    pub expires_at: DateTime<Utc>,
}

// --- OTPs ---

/// What a one-time code authorises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    VerifyEmail,
    ResetPassword,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::VerifyEmail => "verify_email",
            OtpPurpose::ResetPassword => "reset_password",
        }
    }
}

impl std::fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OtpPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verify_email" => Ok(OtpPurpose::VerifyEmail),
            "reset_password" => Ok(OtpPurpose::ResetPassword),
            _ => Err(format!("unknown otp purpose: {s}")),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = otps)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Otp {
    pub id: i64,
    pub purpose: String,
    pub otp_ref: String,
    pub destination: String,
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub attempts: i32,
}

impl Otp {
    /// Unused, unrevoked and not yet expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.revoked_at.is_none() && now < self.expires_at
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = otps)]
pub struct NewOtp {
    pub purpose: String,
    pub otp_ref: String,
    pub destination: String,
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// --- Audit log ---

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_logs)]
pub struct NewAuditEntry {
    pub user_id: Option<Uuid>,
    pub ip_address: String,
    pub action: String,
    pub resource: String,
    pub device_info: String,
    pub started_at: DateTime<Utc>,
    pub status: i32,
}

// --- Merchants (read-only) ---

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = merchants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Merchant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub merchant_type: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = person_merchants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PersonMerchant {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub vat_no: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = company_merchants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CompanyMerchant {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub company_name: String,
    pub vat_no: String,
}
