//! One-time code delivery.
//!
//! A [`CodeSender`] generates the code, delivers it to the destination and
//! hands it back so the caller can store a hash of it. The backend is picked
//! once at startup.

mod memory;
mod resend;
mod smtp;

pub use memory::MemoryCodeSender;
pub use resend::ResendCodeSender;
pub use smtp::SmtpCodeSender;

use invoicer_shared::clients::email::EmailError;
use invoicer_shared::clients::smtp::SmtpError;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("email API delivery failed: {0}")]
    Email(#[from] EmailError),

    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] SmtpError),

    #[error("delivery task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[async_trait::async_trait]
pub trait CodeSender: Send + Sync {
    /// Sends a fresh code tagged with `reference` and returns the code.
    async fn send_code(&self, destination: &str, reference: &str) -> Result<String, DeliveryError>;
}
