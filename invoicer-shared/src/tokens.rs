//! Signed access/refresh token minting and validation.
//!
//! Both kinds are HS256 JWTs signed with the same secret and told apart by the
//! `token_type` claim. Every validation failure collapses to
//! [`TokenError::Invalid`] so callers cannot learn whether the signature, the
//! expiry or the kind was wrong.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::types::auth::{Claims, TokenKind, TokenPair};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid or expired token")]
    Invalid,

    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Access + refresh pair as minted, before it is shaped for the wire.
#[derive(Debug, Clone)]
pub struct IssuedPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

impl IssuedPair {
    pub fn into_token_pair(self) -> TokenPair {
        TokenPair {
            access_token: self.access.token,
            refresh_token: self.refresh.token,
            expires_at: self.access.expires_at,
        }
    }
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<Keys>,
}

impl TokenIssuer {
    pub fn new(settings: &TokenSettings) -> Self {
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
                decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
                issuer: settings.issuer.clone(),
                audience: settings.audience.clone(),
                access_ttl: Duration::seconds(settings.access_ttl_secs),
                refresh_ttl: Duration::seconds(settings.refresh_ttl_secs),
            }),
        }
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.keys.access_ttl,
            TokenKind::Refresh => self.keys.refresh_ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, role: &str, kind: TokenKind) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, role, kind, Utc::now())
    }

    pub fn issue_pair(&self, user_id: Uuid, role: &str) -> Result<IssuedPair, TokenError> {
        let now = Utc::now();
        Ok(IssuedPair {
            access: self.issue_at(user_id, role, TokenKind::Access, now)?,
            refresh: self.issue_at(user_id, role, TokenKind::Refresh, now)?,
        })
    }

    fn issue_at(
        &self,
        user_id: Uuid,
        role: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now + self.ttl(kind);
        let claims = Claims {
            sub: user_id,
            scope: role.to_string(),
            iss: self.keys.issuer.clone(),
            aud: self.keys.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4(),
            token_type: kind,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature, issuer, audience, time window and kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[self.keys.issuer.as_str()]);
        validation.set_audience(&[self.keys.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);

        let claims = decode::<Claims>(token, &self.keys.decoding, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                TokenError::Invalid
            })?
            .claims;

        if claims.token_type != expected {
            tracing::debug!(expected = %expected, got = %claims.token_type, "token kind mismatch");
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secret: &str) -> TokenSettings {
        TokenSettings {
            secret: secret.into(),
            issuer: "https://auth.invoicer.test".into(),
            audience: "https://api.invoicer.test".into(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 72 * 3600,
        }
    }

    #[test]
    fn access_token_roundtrip_carries_claims() {
        let issuer = TokenIssuer::new(&settings("secret"));
        let user_id = Uuid::new_v4();
        let issued = issuer.issue(user_id, "admin", TokenKind::Access).unwrap();

        let claims = issuer.verify(&issued.token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.scope, "admin");
        assert_eq!(claims.token_type, TokenKind::Access);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(claims.nbf, claims.iat);
    }

    #[test]
    fn kind_mismatch_is_rejected_both_ways() {
        let issuer = TokenIssuer::new(&settings("secret"));
        let pair = issuer.issue_pair(Uuid::new_v4(), "user").unwrap();

        assert!(matches!(
            issuer.verify(&pair.refresh.token, TokenKind::Access),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            issuer.verify(&pair.access.token, TokenKind::Refresh),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn pair_tokens_are_distinct() {
        let issuer = TokenIssuer::new(&settings("secret"));
        let pair = issuer.issue_pair(Uuid::new_v4(), "user").unwrap();
        assert_ne!(pair.access.token, pair.refresh.token);
        assert!(pair.refresh.expires_at > pair.access.expires_at);
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let ours = TokenIssuer::new(&settings("secret-a"));
        let theirs = TokenIssuer::new(&settings("secret-b"));
        let token = theirs.issue(Uuid::new_v4(), "user", TokenKind::Access).unwrap();
        assert!(ours.verify(&token.token, TokenKind::Access).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = TokenIssuer::new(&settings("secret"));
        let past = Utc::now() - Duration::hours(1);
        let token = issuer
            .issue_at(Uuid::new_v4(), "user", TokenKind::Access, past)
            .unwrap();
        assert!(matches!(
            issuer.verify(&token.token, TokenKind::Access),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let ours = TokenIssuer::new(&settings("secret"));
        let mut other = settings("secret");
        other.audience = "https://elsewhere.test".into();
        let token = TokenIssuer::new(&other)
            .issue(Uuid::new_v4(), "user", TokenKind::Access)
            .unwrap();
        assert!(ours.verify(&token.token, TokenKind::Access).is_err());
    }
}
