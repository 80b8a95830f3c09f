use reqwest::Client;
use serde::Serialize;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email API rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Client for the Resend HTTP email API.
#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_key: String,
    from_email: String,
    from_name: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

impl EmailClient {
    pub fn new(api_key: &str, from_email: &str, from_name: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        }
    }

    pub async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError> {
        let request = ResendRequest {
            from: format!("{} <{}>", self.from_name, self.from_email),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        };

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(subject = %subject, "email sent");
        Ok(())
    }

    pub async fn send_otp_code(&self, to: &str, code: &str, reference: &str) -> Result<(), EmailError> {
        self.send_email(to, "Your verification code", &otp_email_html(&self.from_name, code, reference))
            .await
    }
}

/// HTML body for a one-time code. `reference` lets the reader match the mail
/// to the screen that requested it.
pub fn otp_email_html(brand: &str, code: &str, reference: &str) -> String {
    format!(
        r#"<div style="font-family: 'Segoe UI', Arial, sans-serif; max-width: 600px; margin: 0 auto;">
        <h2 style="color: #af38ff;">{brand} - Verification code</h2>
        <p>Your one-time code is:</p>
        <div style="background: #f4f4f4; color: #af38ff; font-size: 32px; font-weight: bold; text-align: center; padding: 20px; border-radius: 8px; letter-spacing: 8px;">{code}</div>
        <p style="color: #666; margin-top: 20px;">Reference: <strong>{reference}</strong></p>
        <p style="color: #666;">This code expires in 5 minutes. If you did not request it, you can ignore this email.</p>
        </div>"#
    )
}
