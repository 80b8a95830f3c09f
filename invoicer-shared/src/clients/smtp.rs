//! SMTP mailer for deployments that relay through their own mail server.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::email::otp_email_html;

#[derive(Debug, thiserror::Error)]
pub enum SmtpError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("message build failed: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp transport failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

/// Blocking SMTP sender; run it on a blocking thread from async code.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from_email: String,
    from_name: String,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Result<Self, SmtpError> {
        let creds = Credentials::new(config.username, config.password);
        let transport = SmtpTransport::relay(&config.host)?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from_email: config.from_email,
            from_name: config.from_name,
        })
    }

    pub fn send_otp_code(&self, to: &str, code: &str, reference: &str) -> Result<(), SmtpError> {
        let message = Message::builder()
            .from(format!("{} <{}>", self.from_name, self.from_email).parse()?)
            .to(to.parse()?)
            .subject("Your verification code")
            .header(ContentType::TEXT_HTML)
            .body(otp_email_html(&self.from_name, code, reference))?;

        self.transport.send(&message)?;
        tracing::debug!("otp email relayed over smtp");
        Ok(())
    }
}
