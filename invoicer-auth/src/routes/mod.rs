pub mod check_email;
pub mod health;
pub mod login;
pub mod logout;
pub mod me;
pub mod oauth;
pub mod otp;
pub mod refresh;
pub mod register;
pub mod reset_password;
