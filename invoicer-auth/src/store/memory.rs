//! In-memory storage for development and tests.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    AuditStore, CredentialStore, MerchantStore, OtpStore, SessionStore, StoreError, StoreResult,
};
use crate::models::{
    CompanyMerchant, Merchant, NewAuditEntry, NewOtp, NewSession, NewUser, Otp, OtpPurpose,
    PersonMerchant, Session, User, SEED_ROLES,
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    roles: Vec<String>,
    /// (user, role) in assignment order.
    user_roles: Vec<(Uuid, String)>,
    login_methods: HashMap<(String, String), Uuid>,
    sessions: HashMap<String, Session>,
    otps: Vec<Otp>,
    next_otp_id: i64,
    audit: Vec<NewAuditEntry>,
    merchants: Vec<Merchant>,
    persons: Vec<PersonMerchant>,
    companies: Vec<CompanyMerchant>,
    stores: Vec<Uuid>,
}

impl Inner {
    fn live_user_by_username(&self, username: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.username == username && u.deleted_at.is_none())
    }

    fn insert_user(&mut self, user: NewUser, role: &str) -> StoreResult<User> {
        if !self.roles.iter().any(|r| r == role) {
            return Err(StoreError::NotFound("role"));
        }
        if self.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("username"));
        }

        let now = Utc::now();
        let user = User {
            id: user.id,
            username: user.username,
            password_hash: user.password_hash,
            is_verified: user.is_verified,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        self.user_roles.push((user.id, role.to_string()));
        Ok(user)
    }
}

/// Store backed by a single lock. Roles are seeded on construction.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let store = Self {
            inner: RwLock::new(Inner::default()),
        };
        store.write().roles = SEED_ROLES.iter().map(|(name, _)| name.to_string()).collect();
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks a user deleted so lookups skip it.
    pub fn soft_delete_user(&self, user_id: Uuid) {
        if let Some(user) = self.write().users.get_mut(&user_id) {
            user.deleted_at = Some(Utc::now());
        }
    }

    /// Registers a merchant for `user_id`, optionally with one store.
    pub fn insert_merchant(&self, merchant: Merchant, with_store: bool) {
        let mut inner = self.write();
        if with_store {
            inner.stores.push(merchant.id);
        }
        inner.merchants.push(merchant);
    }

    pub fn insert_person(&self, person: PersonMerchant) {
        self.write().persons.push(person);
    }

    pub fn insert_company(&self, company: CompanyMerchant) {
        self.write().companies.push(company);
    }

    pub fn audit_entries(&self) -> Vec<NewAuditEntry> {
        self.read().audit.clone()
    }

    pub fn sessions_for(&self, user_id: Uuid) -> Vec<Session> {
        self.read()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Moves a session's expiry, for exercising expiry paths.
    pub fn set_session_expiry(&self, token_hash: &str, expires_at: DateTime<Utc>) {
        if let Some(session) = self.write().sessions.get_mut(token_hash) {
            session.expires_at = expires_at;
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryStore {
    fn create_user(&self, user: NewUser, role: &str) -> StoreResult<User> {
        self.write().insert_user(user, role)
    }

    fn create_oauth_user(
        &self,
        user: NewUser,
        role: &str,
        provider: &str,
        provider_uid: &str,
    ) -> StoreResult<User> {
        let mut inner = self.write();
        let key = (provider.to_string(), provider_uid.to_string());
        if inner.login_methods.contains_key(&key) {
            return Err(StoreError::Conflict("login method"));
        }
        let user = inner.insert_user(user, role)?;
        inner.login_methods.insert(key, user.id);
        Ok(user)
    }

    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.read().live_user_by_username(username).cloned())
    }

    fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self
            .read()
            .users
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    fn username_exists(&self, username: &str) -> StoreResult<bool> {
        Ok(self.read().users.values().any(|u| u.username == username))
    }

    fn user_by_login_method(&self, provider: &str, provider_uid: &str) -> StoreResult<Option<User>> {
        let inner = self.read();
        let key = (provider.to_string(), provider_uid.to_string());
        Ok(inner
            .login_methods
            .get(&key)
            .and_then(|id| inner.users.get(id))
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut inner = self.write();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound("user"))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    fn set_verified(&self, user_id: Uuid) -> StoreResult<()> {
        if let Some(user) = self.write().users.get_mut(&user_id) {
            user.is_verified = true;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    fn assign_role(&self, user_id: Uuid, role: &str) -> StoreResult<()> {
        let mut inner = self.write();
        if !inner.roles.iter().any(|r| r == role) {
            return Err(StoreError::NotFound("role"));
        }
        inner.user_roles.push((user_id, role.to_string()));
        Ok(())
    }

    fn primary_role(&self, user_id: Uuid) -> StoreResult<Option<String>> {
        Ok(self
            .read()
            .user_roles
            .iter()
            .find(|(id, _)| *id == user_id)
            .map(|(_, role)| role.clone()))
    }

    fn seed_roles(&self) -> StoreResult<()> {
        let mut inner = self.write();
        for (name, _) in SEED_ROLES {
            if !inner.roles.iter().any(|r| r == name) {
                inner.roles.push(name.to_string());
            }
        }
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    fn create_session(&self, session: NewSession) -> StoreResult<Session> {
        let mut inner = self.write();
        if inner.sessions.contains_key(&session.token_hash) {
            return Err(StoreError::Conflict("session"));
        }
        let session = Session {
            id: session.id,
            user_id: session.user_id,
            token_hash: session.token_hash,
            user_agent: session.user_agent,
            ip_address: session.ip_address,
            expires_at: session.expires_at,
            revoked: false,
            created_at: Utc::now(),
        };
        inner.sessions.insert(session.token_hash.clone(), session.clone());
        Ok(session)
    }

    fn session_by_token(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(self.read().sessions.get(token_hash).cloned())
    }

    fn revoke_session(&self, token_hash: &str) -> StoreResult<bool> {
        match self.write().sessions.get_mut(token_hash) {
            Some(session) if !session.revoked => {
                session.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn revoke_all_sessions(&self, user_id: Uuid) -> StoreResult<usize> {
        let mut inner = self.write();
        let mut revoked = 0;
        for session in inner.sessions.values_mut() {
            if session.user_id == user_id && !session.revoked {
                session.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

impl OtpStore for MemoryStore {
    fn create_otp(&self, otp: NewOtp) -> StoreResult<Otp> {
        let mut inner = self.write();
        inner.next_otp_id += 1;
        let record = Otp {
            id: inner.next_otp_id,
            purpose: otp.purpose,
            otp_ref: otp.otp_ref,
            destination: otp.destination,
            code_hash: otp.code_hash,
            created_at: otp.created_at,
            expires_at: otp.expires_at,
            used_at: None,
            revoked_at: None,
            attempts: 0,
        };
        inner.otps.push(record.clone());
        Ok(record)
    }

    fn active_otp(
        &self,
        destination: &str,
        purpose: OtpPurpose,
        reference: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Otp>> {
        Ok(self
            .read()
            .otps
            .iter()
            .filter(|o| {
                o.destination == destination
                    && o.purpose == purpose.as_str()
                    && o.otp_ref == reference
                    && o.is_active(now)
            })
            .max_by_key(|o| (o.created_at, o.id))
            .cloned())
    }

    fn increment_attempts(&self, id: i64) -> StoreResult<i32> {
        let mut inner = self.write();
        let otp = inner
            .otps
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound("otp"))?;
        otp.attempts += 1;
        Ok(otp.attempts)
    }

    fn mark_otp_used(&self, id: i64, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut inner = self.write();
        match inner.otps.iter_mut().find(|o| o.id == id) {
            Some(otp) if otp.used_at.is_none() && otp.revoked_at.is_none() => {
                otp.used_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn revoke_otp(&self, id: i64, now: DateTime<Utc>) -> StoreResult<()> {
        if let Some(otp) = self.write().otps.iter_mut().find(|o| o.id == id) {
            otp.revoked_at.get_or_insert(now);
        }
        Ok(())
    }
}

impl AuditStore for MemoryStore {
    fn record(&self, entry: NewAuditEntry) -> StoreResult<()> {
        self.write().audit.push(entry);
        Ok(())
    }
}

impl MerchantStore for MemoryStore {
    fn merchant_by_user(&self, user_id: Uuid) -> StoreResult<Option<Merchant>> {
        Ok(self
            .read()
            .merchants
            .iter()
            .find(|m| m.user_id == user_id)
            .cloned())
    }

    fn person_detail(&self, merchant_id: Uuid) -> StoreResult<Option<PersonMerchant>> {
        Ok(self
            .read()
            .persons
            .iter()
            .find(|p| p.merchant_id == merchant_id)
            .cloned())
    }

    fn company_detail(&self, merchant_id: Uuid) -> StoreResult<Option<CompanyMerchant>> {
        Ok(self
            .read()
            .companies
            .iter()
            .find(|c| c.merchant_id == merchant_id)
            .cloned())
    }

    fn has_store(&self, merchant_id: Uuid) -> StoreResult<bool> {
        Ok(self.read().stores.contains(&merchant_id))
    }
}
