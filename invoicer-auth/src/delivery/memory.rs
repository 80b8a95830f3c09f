use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

use super::{CodeSender, DeliveryError};
use crate::services::hashing::generate_verification_code;

struct SentCode {
    code: String,
    reference: String,
    sent_at: DateTime<Utc>,
}

/// Logs codes instead of mailing them and remembers each one until its TTL
/// runs out. Used in development and by tests to read back what was "sent".
pub struct MemoryCodeSender {
    ttl: Duration,
    sent: Mutex<HashMap<String, Vec<SentCode>>>,
}

impl MemoryCodeSender {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sent: Mutex::new(HashMap::new()),
        }
    }

    /// Code sent to `destination` under `reference`, if still within its TTL.
    pub fn code_for(&self, destination: &str, reference: &str) -> Option<String> {
        let now = Utc::now();
        let sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        sent.get(destination)?
            .iter()
            .rev()
            .find(|s| s.reference == reference && now < s.sent_at + self.ttl)
            .map(|s| s.code.clone())
    }

    /// Codes still held for `destination`. Expired ones are dropped on the
    /// next send to any destination.
    pub fn sent_count(&self, destination: &str) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(destination)
            .map_or(0, Vec::len)
    }
}

#[async_trait::async_trait]
impl CodeSender for MemoryCodeSender {
    async fn send_code(&self, destination: &str, reference: &str) -> Result<String, DeliveryError> {
        let code = generate_verification_code();
        let now = Utc::now();

        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        let ttl = self.ttl;
        sent.retain(|_, codes| {
            codes.retain(|s| now < s.sent_at + ttl);
            !codes.is_empty()
        });
        sent.entry(destination.to_string()).or_default().push(SentCode {
            code: code.clone(),
            reference: reference.to_string(),
            sent_at: now,
        });

        tracing::info!(destination = %destination, reference = %reference, code = %code, "otp issued (console delivery)");
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn codes_are_readable_by_reference() {
        let sender = MemoryCodeSender::new(Duration::minutes(5));
        let first = sender.send_code("a@example.com", "r1").await.unwrap();
        let second = sender.send_code("a@example.com", "r2").await.unwrap();

        assert_eq!(first.len(), 6);
        assert!(first.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(sender.code_for("a@example.com", "r1"), Some(first));
        assert_eq!(sender.code_for("a@example.com", "r2"), Some(second));
        assert_eq!(sender.sent_count("a@example.com"), 2);
        assert_eq!(sender.code_for("b@example.com", "r1"), None);
    }

    #[tokio::test]
    async fn expired_codes_are_forgotten() {
        let sender = MemoryCodeSender::new(Duration::zero());
        sender.send_code("a@example.com", "r1").await.unwrap();

        assert_eq!(sender.code_for("a@example.com", "r1"), None);

        sender.send_code("b@example.com", "r2").await.unwrap();
        assert_eq!(sender.sent_count("a@example.com"), 0);
        assert_eq!(sender.sent_count("b@example.com"), 1);
    }

    #[tokio::test]
    async fn expired_destinations_do_not_accumulate() {
        let sender = MemoryCodeSender::new(Duration::zero());
        for i in 0..1000 {
            sender.send_code(&format!("user{i}@example.com"), "r").await.unwrap();
        }

        let retained: usize = (0..1000)
            .map(|i| sender.sent_count(&format!("user{i}@example.com")))
            .sum();
        assert_eq!(retained, 1);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }
}
