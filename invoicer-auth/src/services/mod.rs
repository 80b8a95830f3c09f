pub mod auth_service;
pub mod hashing;
pub mod otp_service;

pub use auth_service::AuthService;
pub use otp_service::OtpService;
