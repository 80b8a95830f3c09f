use std::sync::Arc;

use invoicer_shared::clients::smtp::SmtpMailer;

use super::{CodeSender, DeliveryError};
use crate::services::hashing::generate_verification_code;

pub struct SmtpCodeSender {
    mailer: Arc<SmtpMailer>,
}

impl SmtpCodeSender {
    pub fn new(mailer: SmtpMailer) -> Self {
        Self {
            mailer: Arc::new(mailer),
        }
    }
}

#[async_trait::async_trait]
impl CodeSender for SmtpCodeSender {
    async fn send_code(&self, destination: &str, reference: &str) -> Result<String, DeliveryError> {
        let code = generate_verification_code();
        let mailer = self.mailer.clone();
        let (to, sent_code, reference) = (destination.to_string(), code.clone(), reference.to_string());

        // lettre's SmtpTransport blocks.
        tokio::task::spawn_blocking(move || mailer.send_otp_code(&to, &sent_code, &reference)).await??;
        Ok(code)
    }
}
