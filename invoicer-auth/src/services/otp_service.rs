//! One-time code issuance and verification, and the password reset built on
//! top of it.
//!
//! A code is bound to `(destination, purpose, ref)`. It verifies at most once,
//! stops working after `max_attempts` wrong guesses and expires after `ttl`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use invoicer_shared::errors::{AppError, AppResult, ErrorCode};

use crate::delivery::CodeSender;
use crate::models::{NewOtp, Otp, OtpPurpose, User};
use crate::rate_limit::RateLimiter;
use crate::services::hashing;
use crate::store::AuthStore;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub ttl: Duration,
    pub max_attempts: i32,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(5),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(rename = "email")]
    pub destination: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub code: String,
    pub purpose: String,
    #[serde(default)]
    pub new_password: Option<String>,
}

fn parse_purpose(purpose: &str) -> AppResult<OtpPurpose> {
    purpose
        .parse()
        .map_err(|e: String| AppError::new(ErrorCode::InvalidPurpose, e))
}

fn otp_invalid(reason: &str) -> AppError {
    AppError::new(ErrorCode::OtpInvalid, reason.to_string())
}

#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn AuthStore>,
    sender: Arc<dyn CodeSender>,
    limiter: Arc<dyn RateLimiter>,
    policy: OtpPolicy,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        sender: Arc<dyn CodeSender>,
        limiter: Arc<dyn RateLimiter>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            store,
            sender,
            limiter,
            policy,
        }
    }

    /// Delivers a new code and returns the reference the caller must echo
    /// back when verifying.
    pub async fn send(&self, destination: &str, purpose: &str) -> AppResult<String> {
        let purpose = parse_purpose(purpose)?;
        if destination.trim().is_empty() {
            return Err(AppError::bad_request("email is required"));
        }

        if purpose != OtpPurpose::VerifyEmail && self.store.user_by_username(destination)?.is_none() {
            return Err(AppError::new(ErrorCode::UserNotFound, "no account for destination"));
        }

        if !self.limiter.check(destination).await? {
            return Err(AppError::new(ErrorCode::OtpRateLimited, "otp send throttled"));
        }

        let reference = Uuid::new_v4().to_string();
        let code = self
            .sender
            .send_code(destination, &reference)
            .await
            .map_err(|e| AppError::internal(format!("otp delivery: {e}")))?;
        let code_hash = hashing::hash_secret(&code)?;

        let now = Utc::now();
        let otp = self.store.create_otp(NewOtp {
            purpose: purpose.to_string(),
            otp_ref: reference.clone(),
            destination: destination.to_string(),
            code_hash,
            created_at: now,
            expires_at: now + self.policy.ttl,
        })?;

        tracing::info!(otp_id = otp.id, purpose = %purpose, "otp issued");
        Ok(reference)
    }

    pub async fn verify(&self, req: &VerifyOtpRequest) -> AppResult<()> {
        let purpose = parse_purpose(&req.purpose)?;

        // Checked up front so a bad request never burns the code.
        let reset_target = match purpose {
            OtpPurpose::ResetPassword => Some(self.reset_target(req)?),
            OtpPurpose::VerifyEmail => None,
        };

        let otp = self.consume(&req.destination, purpose, &req.reference, &req.code)?;

        match reset_target {
            Some((user, new_password)) => {
                let password_hash = hashing::hash_secret(new_password)?;
                self.store.update_password_hash(user.id, &password_hash)?;
                let revoked = self.store.revoke_all_sessions(user.id)?;
                tracing::info!(user_id = %user.id, otp_id = otp.id, revoked, "password reset");
            }
            None => {
                if let Some(user) = self.store.user_by_username(&req.destination)? {
                    self.store.set_verified(user.id)?;
                    tracing::info!(user_id = %user.id, "email verified");
                }
            }
        }
        Ok(())
    }

    pub async fn reset_password(
        &self,
        destination: &str,
        reference: &str,
        code: &str,
        new_password: &str,
    ) -> AppResult<()> {
        self.verify(&VerifyOtpRequest {
            destination: destination.to_string(),
            reference: reference.to_string(),
            code: code.to_string(),
            purpose: OtpPurpose::ResetPassword.to_string(),
            new_password: Some(new_password.to_string()),
        })
        .await
    }

    fn reset_target<'a>(&self, req: &'a VerifyOtpRequest) -> AppResult<(User, &'a str)> {
        let user = self
            .store
            .user_by_username(&req.destination)?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "no account for destination"))?;

        match req.new_password.as_deref() {
            Some(pw) if pw.chars().count() >= MIN_PASSWORD_LEN => Ok((user, pw)),
            _ => Err(AppError::Validation(format!(
                "new_password must be at least {MIN_PASSWORD_LEN} characters"
            ))),
        }
    }

    /// Checks `code` against the active record and marks it used on a match.
    /// Every failure looks the same to the caller.
    fn consume(&self, destination: &str, purpose: OtpPurpose, reference: &str, code: &str) -> AppResult<Otp> {
        let now = Utc::now();
        let otp = self
            .store
            .active_otp(destination, purpose, reference, now)?
            .ok_or_else(|| otp_invalid("no active otp"))?;

        if otp.attempts >= self.policy.max_attempts {
            self.store.revoke_otp(otp.id, now)?;
            return Err(otp_invalid("otp attempts exhausted"));
        }

        if !hashing::verify_secret(code, &otp.code_hash)? {
            let attempts = self.store.increment_attempts(otp.id)?;
            if attempts >= self.policy.max_attempts {
                self.store.revoke_otp(otp.id, now)?;
                tracing::warn!(otp_id = otp.id, attempts, "otp revoked after too many attempts");
            }
            return Err(otp_invalid("otp code mismatch"));
        }

        if !self.store.mark_otp_used(otp.id, now)? {
            return Err(otp_invalid("otp consumed concurrently"));
        }
        Ok(otp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::MemoryCodeSender;
    use crate::models::NewUser;
    use crate::rate_limit::MemoryRateLimiter;
    use crate::store::{CredentialStore, MemoryStore, SessionStore};
    use axum::http::StatusCode;

    struct Harness {
        svc: OtpService,
        store: Arc<MemoryStore>,
        sender: Arc<MemoryCodeSender>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(MemoryCodeSender::new(Duration::minutes(5)));
        let limiter = Arc::new(MemoryRateLimiter::new(100, 60));
        let svc = OtpService::new(store.clone(), sender.clone(), limiter, OtpPolicy::default());
        Harness { svc, store, sender }
    }

    fn request(reference: &str, code: &str, purpose: OtpPurpose, new_password: Option<&str>) -> VerifyOtpRequest {
        VerifyOtpRequest {
            destination: "a@example.com".into(),
            reference: reference.into(),
            code: code.into(),
            purpose: purpose.to_string(),
            new_password: new_password.map(String::from),
        }
    }

    fn wrong_code(code: &str) -> String {
        let first = if code.starts_with('0') { '1' } else { '0' };
        format!("{first}{}", &code[1..])
    }

    #[tokio::test]
    async fn unknown_purpose_is_rejected() {
        let h = harness();
        let err = h.svc.send("a@example.com", "login").await.unwrap_err();
        assert_eq!(err.error_code(), "E2001");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reset_requires_existing_user() {
        let h = harness();
        let err = h.svc.send("a@example.com", "reset_password").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(h.sender.sent_count("a@example.com"), 0);
    }

    #[tokio::test]
    async fn verify_email_marks_user_verified_once() {
        let h = harness();
        let user = h.store.create_user(NewUser::new("a@example.com", "h"), "user").unwrap();
        let reference = h.svc.send("a@example.com", "verify_email").await.unwrap();
        let code = h.sender.code_for("a@example.com", &reference).unwrap();

        h.svc
            .verify(&request(&reference, &code, OtpPurpose::VerifyEmail, None))
            .await
            .unwrap();
        assert!(h.store.user_by_id(user.id).unwrap().unwrap().is_verified);

        let err = h
            .svc
            .verify(&request(&reference, &code, OtpPurpose::VerifyEmail, None))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "E2002");
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(MemoryCodeSender::new(Duration::minutes(5)));
        let limiter = Arc::new(MemoryRateLimiter::new(100, 60));
        let policy = OtpPolicy { ttl: Duration::zero(), max_attempts: 5 };
        let svc = OtpService::new(store.clone(), sender.clone(), limiter, policy);

        let user = store.create_user(NewUser::new("a@example.com", "h"), "user").unwrap();
        let reference = svc.send("a@example.com", "verify_email").await.unwrap();
        let code = sender.code_for("a@example.com", &reference).unwrap();

        let err = svc
            .verify(&request(&reference, &code, OtpPurpose::VerifyEmail, None))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "E2002");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!store.user_by_id(user.id).unwrap().unwrap().is_verified);
    }

    #[tokio::test]
    async fn verify_requires_matching_reference_and_purpose() {
        let h = harness();
        h.store.create_user(NewUser::new("a@example.com", "h"), "user").unwrap();
        let reference = h.svc.send("a@example.com", "reset_password").await.unwrap();
        let code = h.sender.code_for("a@example.com", &reference).unwrap();

        assert!(h
            .svc
            .verify(&request("other-ref", &code, OtpPurpose::ResetPassword, Some("newpass")))
            .await
            .is_err());
        assert!(h
            .svc
            .verify(&request(&reference, &code, OtpPurpose::VerifyEmail, None))
            .await
            .is_err());
        assert!(h
            .svc
            .verify(&request(&reference, &code, OtpPurpose::ResetPassword, Some("newpass")))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn five_wrong_codes_lock_the_otp() {
        let h = harness();
        h.store.create_user(NewUser::new("a@example.com", "h"), "user").unwrap();
        let reference = h.svc.send("a@example.com", "reset_password").await.unwrap();
        let code = h.sender.code_for("a@example.com", &reference).unwrap();

        for _ in 0..5 {
            let err = h
                .svc
                .verify(&request(&reference, &wrong_code(&code), OtpPurpose::ResetPassword, Some("newpass")))
                .await
                .unwrap_err();
            assert_eq!(err.error_code(), "E2002");
        }

        let err = h
            .svc
            .verify(&request(&reference, &code, OtpPurpose::ResetPassword, Some("newpass")))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "E2002");
    }

    #[tokio::test]
    async fn weak_new_password_does_not_burn_the_code() {
        let h = harness();
        h.store.create_user(NewUser::new("a@example.com", "h"), "user").unwrap();
        let reference = h.svc.send("a@example.com", "reset_password").await.unwrap();
        let code = h.sender.code_for("a@example.com", &reference).unwrap();

        for weak in [None, Some(""), Some("12345")] {
            let err = h
                .svc
                .verify(&request(&reference, &code, OtpPurpose::ResetPassword, weak))
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }

        h.svc
            .reset_password("a@example.com", &reference, &code, "brand-new")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reset_updates_hash_and_revokes_sessions() {
        let h = harness();
        let user = h
            .store
            .create_user(NewUser::new("a@example.com", hashing::hash_secret("old-pass").unwrap()), "user")
            .unwrap();
        h.store
            .create_session(crate::models::NewSession {
                id: Uuid::new_v4(),
                user_id: user.id,
                token_hash: "live".into(),
                user_agent: String::new(),
                ip_address: String::new(),
                expires_at: Utc::now() + Duration::hours(1),
            })
            .unwrap();

        let reference = h.svc.send("a@example.com", "reset_password").await.unwrap();
        let code = h.sender.code_for("a@example.com", &reference).unwrap();
        h.svc
            .reset_password("a@example.com", &reference, &code, "new-pass")
            .await
            .unwrap();

        let stored = h.store.user_by_id(user.id).unwrap().unwrap();
        assert!(hashing::verify_secret("new-pass", &stored.password_hash).unwrap());
        assert!(h.store.session_by_token("live").unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn sends_are_throttled_per_destination() {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(MemoryCodeSender::new(Duration::minutes(5)));
        let svc = OtpService::new(
            store,
            sender.clone(),
            Arc::new(MemoryRateLimiter::new(1, 60)),
            OtpPolicy::default(),
        );

        svc.send("a@example.com", "verify_email").await.unwrap();
        let err = svc.send("a@example.com", "verify_email").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(sender.sent_count("a@example.com"), 1);
        svc.send("b@example.com", "verify_email").await.unwrap();
    }
}
