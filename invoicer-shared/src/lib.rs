pub mod types;
pub mod errors;
pub mod middleware;
pub mod clients;
pub mod tokens;

pub use types::*;
pub use errors::{AppError, ErrorCode, AppResult};
pub use tokens::{TokenError, TokenIssuer, TokenSettings};
