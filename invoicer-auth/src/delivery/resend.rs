use invoicer_shared::clients::email::EmailClient;

use super::{CodeSender, DeliveryError};
use crate::services::hashing::generate_verification_code;

pub struct ResendCodeSender {
    client: EmailClient,
}

impl ResendCodeSender {
    pub fn new(client: EmailClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl CodeSender for ResendCodeSender {
    async fn send_code(&self, destination: &str, reference: &str) -> Result<String, DeliveryError> {
        let code = generate_verification_code();
        self.client.send_otp_code(destination, &code, reference).await?;
        tracing::debug!(reference = %reference, "otp sent via resend");
        Ok(code)
    }
}
