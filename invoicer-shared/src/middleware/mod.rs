mod auth_extractor;
mod json;
mod tracing_layer;
mod metrics_layer;

pub use auth_extractor::*;
pub use json::*;
pub use tracing_layer::*;
pub use metrics_layer::*;
